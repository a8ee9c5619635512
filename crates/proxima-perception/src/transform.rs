//! Sensor-to-body Transform Engine.
//!
//! Every radar is bolted to the airframe at a fixed position and heading.
//! [`SensorTransform`] maps a point from a radar's local frame into the
//! vehicle body frame in three steps:
//!
//! 1. an [`AxisMap`] (signed axis permutation) for boards mounted rotated or
//!    upside down,
//! 2. a rotation about the vertical axis by the mounting yaw,
//! 3. a translation by the mounting offset.
//!
//! Both frames share the radar convention: `x` to the right, `y` forward
//! (boresight), `z` up.  Yaw is measured from `+y` towards `+x`, i.e.
//! clockwise when seen from above, and pitch is the elevation above the
//! horizontal plane.
//!
//! # Example
//!
//! ```rust
//! use proxima_perception::transform::{SensorTransform, Vec3, to_obstacle};
//! use proxima_types::SensorId;
//!
//! // A radar facing the right-hand side of the vehicle.
//! let tf = SensorTransform::for_sensor(SensorId::FrontRight);
//! let body = tf.apply(Vec3::new(0.0, 10.0, 0.0));
//!
//! let obstacle = to_obstacle(body);
//! assert!(obstacle.yaw_deg > 0.0 && obstacle.yaw_deg < 90.0);
//! ```

use proxima_types::{ObstacleRecord, RadarError, SensorId};

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    /// Euclidean length.
    pub fn norm(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Length of the projection onto the horizontal plane.
    pub fn horizontal_norm(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    fn component(self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

impl From<&proxima_types::Point> for Vec3 {
    fn from(p: &proxima_types::Point) -> Self {
        Self::new(p.x, p.y, p.z)
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation about the vertical axis by a clockwise heading in degrees.
    ///
    /// A clockwise heading is a negative right-handed rotation about `+z`.
    pub fn from_heading_deg(heading_deg: f32) -> Self {
        let half = -heading_deg.to_radians() * 0.5;
        Self::new(half.cos(), 0.0, 0.0, half.sin())
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform.
///
/// To convert a point expressed in the child frame into the parent frame,
/// rotate it by `rotation` then add `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    /// Create a transform from a translation and rotation.
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Map a point from the child frame into the parent frame.
    pub fn apply(&self, v: Vec3) -> Vec3 {
        self.rotation.rotate(v).add(self.translation)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Axis mapping
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// One body axis expressed as a (possibly negated) sensor axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedAxis {
    pub axis: Axis,
    pub negate: bool,
}

impl SignedAxis {
    pub const fn pos(axis: Axis) -> Self {
        Self { axis, negate: false }
    }

    pub const fn neg(axis: Axis) -> Self {
        Self { axis, negate: true }
    }
}

/// Signed permutation from the sensor's local axes to the body axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisMap {
    pub x: SignedAxis,
    pub y: SignedAxis,
    pub z: SignedAxis,
}

impl AxisMap {
    pub const IDENTITY: AxisMap = AxisMap {
        x: SignedAxis::pos(Axis::X),
        y: SignedAxis::pos(Axis::Y),
        z: SignedAxis::pos(Axis::Z),
    };

    /// Board mounted upside down, still looking forward.
    pub const INVERTED: AxisMap = AxisMap {
        x: SignedAxis::neg(Axis::X),
        y: SignedAxis::pos(Axis::Y),
        z: SignedAxis::neg(Axis::Z),
    };

    pub fn apply(&self, v: Vec3) -> Vec3 {
        let pick = |s: SignedAxis| {
            let value = v.component(s.axis);
            if s.negate { -value } else { value }
        };
        Vec3::new(pick(self.x), pick(self.y), pick(self.z))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Calibration table
// ────────────────────────────────────────────────────────────────────────────

/// Fixed mounting geometry of one radar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorMount {
    pub sensor: SensorId,
    /// Boresight heading relative to the vehicle's forward axis, clockwise.
    pub yaw_deg: f32,
    /// Radar origin in the body frame (metres).
    pub offset: [f32; 3],
    pub axes: AxisMap,
}

/// Compiled-in calibration for the four corner radars.
pub const SENSOR_MOUNTS: [SensorMount; 4] = [
    SensorMount {
        sensor: SensorId::FrontRight,
        yaw_deg: 45.0,
        offset: [0.18, 0.18, -0.05],
        axes: AxisMap::IDENTITY,
    },
    SensorMount {
        sensor: SensorId::RearLeft,
        yaw_deg: 225.0,
        offset: [-0.18, -0.18, -0.05],
        axes: AxisMap::IDENTITY,
    },
    SensorMount {
        sensor: SensorId::FrontLeft,
        yaw_deg: 315.0,
        offset: [-0.18, 0.18, -0.05],
        axes: AxisMap::IDENTITY,
    },
    SensorMount {
        sensor: SensorId::RearRight,
        yaw_deg: 135.0,
        offset: [0.18, -0.18, -0.05],
        axes: AxisMap::IDENTITY,
    },
];

/// Look up the calibration entry for `sensor`.
///
/// [`SensorId::Undefined`] has no entry.
pub fn mount_for(sensor: SensorId) -> Option<&'static SensorMount> {
    SENSOR_MOUNTS.iter().find(|m| m.sensor == sensor)
}

// ────────────────────────────────────────────────────────────────────────────
// SensorTransform
// ────────────────────────────────────────────────────────────────────────────

/// The complete sensor-local → body-frame mapping for one radar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorTransform {
    axes: AxisMap,
    transform: Transform3D,
}

impl SensorTransform {
    /// The identity mapping used when no calibration is known.
    pub fn identity() -> Self {
        Self {
            axes: AxisMap::IDENTITY,
            transform: Transform3D::identity(),
        }
    }

    /// Build the mapping from a calibration entry.
    pub fn from_mount(mount: &SensorMount) -> Self {
        let [ox, oy, oz] = mount.offset;
        Self {
            axes: mount.axes,
            transform: Transform3D::new(
                Vec3::new(ox, oy, oz),
                Quaternion::from_heading_deg(mount.yaw_deg),
            ),
        }
    }

    /// The mapping for a known mounting position.
    ///
    /// [`SensorId::Undefined`] yields the identity.
    pub fn for_sensor(sensor: SensorId) -> Self {
        match mount_for(sensor) {
            Some(mount) => Self::from_mount(mount),
            None => Self::identity(),
        }
    }

    /// The mapping for a raw identifier received from configuration or the
    /// wire.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::UnknownSensor`] for identifiers outside the
    /// enumerated mounting positions.
    pub fn from_raw_id(raw: u8) -> Result<Self, RadarError> {
        SensorId::try_from(raw).map(Self::for_sensor)
    }

    /// Map a sensor-local point into the body frame.
    pub fn apply(&self, v: Vec3) -> Vec3 {
        self.transform.apply(self.axes.apply(v))
    }
}

impl Default for SensorTransform {
    fn default() -> Self {
        Self::identity()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Angle conventions
// ────────────────────────────────────────────────────────────────────────────

/// Reduce an angle in degrees into `[0, 360)`.
pub fn wrap_360(angle_deg: f32) -> f32 {
    let mut res = angle_deg % 360.0;
    if res < 0.0 {
        res += 360.0;
    }
    // -1e-6 % 360 + 360 rounds to exactly 360.0 in f32.
    if res >= 360.0 { res - 360.0 } else { res }
}

/// Express a body-frame position as an obstacle bearing, elevation and range.
pub fn to_obstacle(v: Vec3) -> ObstacleRecord {
    let horizontal = v.horizontal_norm();
    ObstacleRecord {
        yaw_deg: wrap_360(v.x.atan2(v.y).to_degrees()),
        pitch_deg: v.z.atan2(horizontal).to_degrees(),
        distance_m: v.norm(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
