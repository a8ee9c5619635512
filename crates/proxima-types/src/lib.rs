//! `proxima-types` – shared data model for the Proxima workspace.
//!
//! Points, labels, obstacle records, sensor identifiers, bus envelopes and
//! the workspace-wide [`RadarError`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Largest number of points accepted in one radar frame.  Point indices and
/// cluster indices are carried as `u8`.
pub const MAX_FRAME_POINTS: usize = 255;

/// Mounting position of a radar on the airframe.
///
/// The discriminants are the on-wire values of the 3-bit `sensor_id` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SensorId {
    /// Single-radar installs without a calibration entry.
    #[default]
    Undefined = 0,
    FrontRight = 1,
    RearLeft = 2,
    FrontLeft = 3,
    RearRight = 4,
}

impl SensorId {
    /// Every mounting position, in wire-value order.
    pub const ALL: [SensorId; 5] = [
        SensorId::Undefined,
        SensorId::FrontRight,
        SensorId::RearLeft,
        SensorId::FrontLeft,
        SensorId::RearRight,
    ];

    /// The on-wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Resolve the mounting position burnt into a radar's hardware unique id.
    ///
    /// Only the two production boards carry a known id; anything else yields
    /// `None` and the caller must configure the position explicitly.
    pub fn from_hardware_uid(uid: u8) -> Option<Self> {
        match uid {
            0x17 => Some(SensorId::FrontRight),
            0x26 => Some(SensorId::FrontLeft),
            _ => None,
        }
    }
}

impl TryFrom<u8> for SensorId {
    type Error = RadarError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SensorId::ALL
            .get(value as usize)
            .copied()
            .ok_or(RadarError::UnknownSensor(value))
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorId::Undefined => write!(f, "undefined"),
            SensorId::FrontRight => write!(f, "front_right"),
            SensorId::RearLeft => write!(f, "rear_left"),
            SensorId::FrontLeft => write!(f, "front_left"),
            SensorId::RearRight => write!(f, "rear_right"),
        }
    }
}

impl FromStr for SensorId {
    type Err = RadarError;

    /// Accepts the snake_case name (`front_left`), its kebab-case spelling
    /// (`front-left`) or the numeric wire value (`3`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        if let Ok(raw) = normalized.parse::<u8>() {
            return SensorId::try_from(raw);
        }
        SensorId::ALL
            .into_iter()
            .find(|id| id.to_string() == normalized)
            .ok_or_else(|| RadarError::Config(format!("unknown sensor position '{s}'")))
    }
}

/// Classification state of a single radar return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointLabel {
    /// Not yet visited by the clustering engine.
    #[default]
    Unclassified,
    /// Not reachable from any core point.
    Noise,
    /// Member of the cluster with this zero-based index.
    Cluster(u8),
}

impl PointLabel {
    pub fn is_noise(self) -> bool {
        self == PointLabel::Noise
    }

    pub fn is_unclassified(self) -> bool {
        self == PointLabel::Unclassified
    }

    /// The cluster index, if the point belongs to one.
    pub fn cluster(self) -> Option<u8> {
        match self {
            PointLabel::Cluster(id) => Some(id),
            _ => None,
        }
    }
}

/// A radar return as delivered by the front-end for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Metres, sensor-local frame (right of boresight).
    pub x: f32,
    /// Metres, sensor-local frame (along boresight).
    pub y: f32,
    /// Metres, sensor-local frame (up).
    pub z: f32,
    /// Signal-to-noise ratio of the detection (dB).
    #[serde(default)]
    pub snr_db: f32,
    #[serde(default)]
    pub label: PointLabel,
}

impl Point {
    /// Create an unclassified point.
    pub fn new(x: f32, y: f32, z: f32, snr_db: f32) -> Self {
        Self {
            x,
            y,
            z,
            snr_db,
            label: PointLabel::Unclassified,
        }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance from the sensor origin.
    pub fn range(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// One obstacle as reported to the flight controller.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ObstacleRecord {
    /// Bearing from the vehicle's forward axis, clockwise, in `[0, 360)`.
    pub yaw_deg: f32,
    /// Elevation above (+) or below (−) the horizontal plane.
    pub pitch_deg: f32,
    pub distance_m: f32,
}

impl ObstacleRecord {
    pub fn new(yaw_deg: f32, pitch_deg: f32, distance_m: f32) -> Self {
        Self {
            yaw_deg,
            pitch_deg,
            distance_m,
        }
    }
}

/// Bus arbitration priority of a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferPriority {
    Highest,
    High,
    Medium,
    #[default]
    Low,
    Lowest,
}

impl TransferPriority {
    /// The 5-bit priority value placed in the CAN identifier.
    pub fn as_u8(self) -> u8 {
        match self {
            TransferPriority::Highest => 0,
            TransferPriority::High => 8,
            TransferPriority::Medium => 16,
            TransferPriority::Low => 24,
            TransferPriority::Lowest => 31,
        }
    }
}

/// An encoded message ready for the transport layer to frame and send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub data_type_id: u16,
    pub signature: u64,
    /// 5-bit rolling counter, one sequence per data type.
    pub transfer_id: u8,
    pub priority: TransferPriority,
    /// Used bytes of the encoded message.
    pub payload: Vec<u8>,
}

/// Envelope for everything routed over the in-process bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "proxima-runtime::pipeline"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// An encoded obstacle broadcast.
    Transfer(Transfer),
    /// A frame produced no output because processing failed.
    FrameDropped { frame: u64, reason: String },
}

/// Workspace-wide error type.  Every variant is scoped to one frame or one
/// message; none of them is fatal to the process.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RadarError {
    #[error("Unknown sensor identifier: {0}")]
    UnknownSensor(u8),

    #[error("Frame has {count} points, at most {max} are supported")]
    FrameTooLarge { count: usize, max: usize },

    #[error("Clustering Error: {0}")]
    Clustering(String),

    #[error("Codec Error: {0}")]
    Codec(String),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_id_from_wire_value() {
        assert_eq!(SensorId::try_from(0).unwrap(), SensorId::Undefined);
        assert_eq!(SensorId::try_from(2).unwrap(), SensorId::RearLeft);
        assert_eq!(SensorId::try_from(4).unwrap(), SensorId::RearRight);
        assert_eq!(SensorId::try_from(5), Err(RadarError::UnknownSensor(5)));
        assert_eq!(SensorId::try_from(7), Err(RadarError::UnknownSensor(7)));
    }

    #[test]
    fn sensor_id_wire_value_roundtrip() {
        for id in SensorId::ALL {
            assert_eq!(SensorId::try_from(id.as_u8()).unwrap(), id);
        }
    }

    #[test]
    fn sensor_id_parses_names_and_numbers() {
        assert_eq!("front_left".parse::<SensorId>().unwrap(), SensorId::FrontLeft);
        assert_eq!("Rear-Right".parse::<SensorId>().unwrap(), SensorId::RearRight);
        assert_eq!("1".parse::<SensorId>().unwrap(), SensorId::FrontRight);
        assert!("roof".parse::<SensorId>().is_err());
        assert_eq!("9".parse::<SensorId>(), Err(RadarError::UnknownSensor(9)));
    }

    #[test]
    fn sensor_id_from_hardware_uid() {
        assert_eq!(SensorId::from_hardware_uid(0x17), Some(SensorId::FrontRight));
        assert_eq!(SensorId::from_hardware_uid(0x26), Some(SensorId::FrontLeft));
        assert_eq!(SensorId::from_hardware_uid(0x00), None);
    }

    #[test]
    fn sensor_id_serializes_snake_case() {
        let json = serde_json::to_string(&SensorId::FrontRight).unwrap();
        assert_eq!(json, "\"front_right\"");
        let back: SensorId = serde_json::from_str("\"rear_left\"").unwrap();
        assert_eq!(back, SensorId::RearLeft);
    }

    #[test]
    fn point_label_helpers() {
        assert!(PointLabel::Noise.is_noise());
        assert!(PointLabel::default().is_unclassified());
        assert_eq!(PointLabel::Cluster(3).cluster(), Some(3));
        assert_eq!(PointLabel::Noise.cluster(), None);
    }

    #[test]
    fn point_geometry() {
        let a = Point::new(0.0, 3.0, 4.0, 10.0);
        let b = Point::new(0.0, 0.0, 0.0, 10.0);
        assert!((a.range() - 5.0).abs() < 1e-5);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-5);
        assert_eq!(a.label, PointLabel::Unclassified);
    }

    #[test]
    fn point_deserializes_without_label() {
        let p: Point = serde_json::from_str(r#"{"x":1.0,"y":2.0,"z":0.5,"snr_db":18.0}"#).unwrap();
        assert_eq!(p.label, PointLabel::Unclassified);
        assert!((p.snr_db - 18.0).abs() < f32::EPSILON);
    }

    #[test]
    fn transfer_priority_values() {
        assert_eq!(TransferPriority::Highest.as_u8(), 0);
        assert_eq!(TransferPriority::default().as_u8(), 24);
        assert_eq!(TransferPriority::Lowest.as_u8(), 31);
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "proxima-runtime::pipeline",
            EventPayload::Transfer(Transfer {
                data_type_id: 20802,
                signature: 0x41528FF10CD13209,
                transfer_id: 7,
                priority: TransferPriority::Low,
                payload: vec![0x40, 0x00],
            }),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        match back.payload {
            EventPayload::Transfer(t) => assert_eq!(t.transfer_id, 7),
            _ => panic!("unexpected variant"),
        }
    }

    #[test]
    fn radar_error_display() {
        let err = RadarError::UnknownSensor(6);
        assert!(err.to_string().contains("6"));

        let err2 = RadarError::FrameTooLarge { count: 300, max: 255 };
        assert!(err2.to_string().contains("300"));
    }
}
