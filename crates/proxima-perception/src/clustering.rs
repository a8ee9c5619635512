//! Density-based clustering of one radar frame.
//!
//! [`Dbscan`] labels every [`Point`] of a frame in place as noise or as a
//! member of a zero-based cluster.  Points whose own neighbourhood is too
//! sparse are normally discarded as noise, but a point is *protected* when
//! its SNR reaches [`ClusteringConfig::snr_override_db`] or its range from the
//! sensor is within [`ClusteringConfig::range_override_m`]; a protected point
//! that would otherwise be noise forms a cluster of its own.
//!
//! The member count of a neighbourhood includes the point itself, so with
//! `min_points = 3` a point needs two other points within ε to be a core
//! point.
//!
//! # Example
//!
//! ```rust
//! use proxima_perception::clustering::{ClusteringConfig, Dbscan, PointClusterer};
//! use proxima_types::{Point, PointLabel};
//!
//! let mut frame = vec![
//!     Point::new(0.0, 5.0, 0.0, 10.0),
//!     Point::new(0.3, 5.0, 0.0, 10.0),
//!     Point::new(0.0, 5.3, 0.0, 10.0),
//!     Point::new(20.0, 40.0, 0.0, 3.0),
//! ];
//!
//! let dbscan = Dbscan::new(ClusteringConfig::default().with_epsilon(1.0));
//! let summary = dbscan.cluster(&mut frame).unwrap();
//!
//! assert_eq!(summary.clusters, 1);
//! assert_eq!(frame[3].label, PointLabel::Noise);
//! ```

use std::collections::TryReserveError;

use proxima_types::{MAX_FRAME_POINTS, Point, PointLabel, RadarError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

fn default_enabled() -> bool {
    true
}

fn default_epsilon_m() -> f32 {
    0.5
}

fn default_min_points() -> u8 {
    3
}

fn default_snr_override_db() -> Option<f32> {
    Some(20.0)
}

/// Parameters of one clustering pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// When `false` every point stays unclassified.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Neighbourhood radius (metres).
    #[serde(default = "default_epsilon_m")]
    pub epsilon_m: f32,
    /// Minimum neighbourhood size, the point itself included.
    #[serde(default = "default_min_points")]
    pub min_points: u8,
    /// Points at or above this SNR (dB) are never forced to noise.
    #[serde(default = "default_snr_override_db")]
    pub snr_override_db: Option<f32>,
    /// Points at or below this range (metres) are never forced to noise.
    #[serde(default)]
    pub range_override_m: Option<f32>,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            epsilon_m: default_epsilon_m(),
            min_points: default_min_points(),
            snr_override_db: default_snr_override_db(),
            range_override_m: None,
        }
    }
}

impl ClusteringConfig {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_epsilon(mut self, epsilon_m: f32) -> Self {
        self.epsilon_m = epsilon_m;
        self
    }

    pub fn with_min_points(mut self, min_points: u8) -> Self {
        self.min_points = min_points;
        self
    }

    /// Set (or clear) the SNR override threshold.
    pub fn with_snr_override(mut self, snr_db: Option<f32>) -> Self {
        self.snr_override_db = snr_db;
        self
    }

    /// Set (or clear) the close-range override threshold.
    pub fn with_range_override(mut self, range_m: Option<f32>) -> Self {
        self.range_override_m = range_m;
        self
    }

    /// Whether `point` must never be labelled noise.
    pub fn is_protected(&self, point: &Point) -> bool {
        let strong = self.snr_override_db.is_some_and(|t| point.snr_db >= t);
        let close = self.range_override_m.is_some_and(|r| point.range() <= r);
        strong || close
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("out of memory building the neighbourhood of cluster {cluster}")]
    Allocation {
        cluster: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("frame has {count} points, at most {max} can be clustered")]
    TooManyPoints { count: usize, max: usize },
}

impl From<ClusterError> for RadarError {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::TooManyPoints { count, max } => RadarError::FrameTooLarge { count, max },
            other => RadarError::Clustering(other.to_string()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Clusterer seam
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of one clustering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterSummary {
    pub points: usize,
    pub clusters: usize,
    pub noise: usize,
    /// Singleton clusters created by the override policy.
    pub protected: usize,
}

/// A strategy that labels the points of one frame in place.
pub trait PointClusterer {
    /// Algorithm name for logging.
    fn name(&self) -> &'static str;

    /// Label every point of `points`.
    ///
    /// On error the frame must be discarded.  Clusters completed before the
    /// failure keep their labels; the rest of the frame may be partially
    /// labelled.
    fn cluster(&self, points: &mut [Point]) -> Result<ClusterSummary, ClusterError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Neighbourhood
// ────────────────────────────────────────────────────────────────────────────

/// Indices of all *other* points within ε of a centre point, in input order.
#[derive(Debug, Default)]
struct Neighborhood {
    members: Vec<usize>,
}

impl Neighborhood {
    fn query(
        points: &[Point],
        centre: usize,
        epsilon_m: f32,
        cluster: usize,
    ) -> Result<Self, ClusterError> {
        let mut members = Vec::new();
        // NaN and non-positive radii have no neighbours.
        if !(epsilon_m > 0.0) {
            return Ok(Self { members });
        }
        members
            .try_reserve(points.len().saturating_sub(1))
            .map_err(|source| ClusterError::Allocation { cluster, source })?;

        let origin = &points[centre];
        members.extend(
            points
                .iter()
                .enumerate()
                .filter(|&(i, p)| i != centre && origin.distance_to(p) <= epsilon_m)
                .map(|(i, _)| i),
        );
        Ok(Self { members })
    }

    /// Member count including the centre point.
    fn size(&self) -> usize {
        self.members.len() + 1
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DBSCAN
// ────────────────────────────────────────────────────────────────────────────

/// Breadth-first DBSCAN with the noise override policy.
#[derive(Debug, Clone, Default)]
pub struct Dbscan {
    config: ClusteringConfig,
    /// Neighbourhood queries left before allocation is made to fail.
    #[cfg(test)]
    allocation_budget: std::cell::Cell<Option<usize>>,
}

impl Dbscan {
    pub fn new(config: ClusteringConfig) -> Self {
        Self {
            config,
            #[cfg(test)]
            allocation_budget: std::cell::Cell::new(None),
        }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    fn is_core(&self, hood: &Neighborhood) -> bool {
        self.config.epsilon_m > 0.0 && hood.size() >= usize::from(self.config.min_points)
    }

    fn label_for(cluster: usize, count: usize) -> Result<PointLabel, ClusterError> {
        u8::try_from(cluster)
            .map(PointLabel::Cluster)
            .map_err(|_| ClusterError::TooManyPoints {
                count,
                max: MAX_FRAME_POINTS,
            })
    }

    fn neighborhood(
        &self,
        points: &[Point],
        centre: usize,
        cluster: usize,
    ) -> Result<Neighborhood, ClusterError> {
        #[cfg(test)]
        self.charge_allocation(cluster)?;
        Neighborhood::query(points, centre, self.config.epsilon_m, cluster)
    }

    #[cfg(test)]
    fn charge_allocation(&self, cluster: usize) -> Result<(), ClusterError> {
        match self.allocation_budget.get() {
            Some(0) => Err(ClusterError::Allocation {
                cluster,
                source: Vec::<usize>::new().try_reserve(usize::MAX).unwrap_err(),
            }),
            Some(left) => {
                self.allocation_budget.set(Some(left - 1));
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Grow cluster `cluster` from the core point `start`.
    ///
    /// The core point's own neighbourhood joins the cluster outright, taking
    /// border points away from earlier clusters.  Protected singletons keep
    /// their own cluster.  Later neighbourhoods only relabel unclassified
    /// and noise points.
    fn expand(
        &self,
        points: &mut [Point],
        start: usize,
        hood: Neighborhood,
        cluster: usize,
        singletons: &[bool],
        seeds: &mut Vec<usize>,
    ) -> Result<(), ClusterError> {
        let label = Self::label_for(cluster, points.len())?;
        points[start].label = label;

        seeds.clear();
        for &i in &hood.members {
            match points[i].label {
                PointLabel::Unclassified => {
                    points[i].label = label;
                    // Capacity was reserved for every point; never reallocates.
                    seeds.push(i);
                }
                PointLabel::Cluster(c) if singletons[usize::from(c)] => {}
                _ => points[i].label = label,
            }
        }
        drop(hood);

        let mut cursor = 0;
        while cursor < seeds.len() {
            let member = seeds[cursor];
            cursor += 1;

            let hood = self.neighborhood(points, member, cluster)?;
            if self.is_core(&hood) {
                Self::spread(points, &hood, label, seeds);
            }
        }
        Ok(())
    }

    /// Pull unclassified and noise points of `hood` into the cluster; newly
    /// reached points are queued for expansion.
    fn spread(points: &mut [Point], hood: &Neighborhood, label: PointLabel, seeds: &mut Vec<usize>) {
        for &i in &hood.members {
            match points[i].label {
                PointLabel::Unclassified => {
                    points[i].label = label;
                    seeds.push(i);
                }
                PointLabel::Noise => points[i].label = label,
                PointLabel::Cluster(_) => {}
            }
        }
    }
}

impl PointClusterer for Dbscan {
    fn name(&self) -> &'static str {
        "dbscan"
    }

    fn cluster(&self, points: &mut [Point]) -> Result<ClusterSummary, ClusterError> {
        let count = points.len();
        if count > MAX_FRAME_POINTS {
            return Err(ClusterError::TooManyPoints {
                count,
                max: MAX_FRAME_POINTS,
            });
        }

        for point in points.iter_mut() {
            point.label = PointLabel::Unclassified;
        }

        let mut summary = ClusterSummary {
            points: count,
            ..ClusterSummary::default()
        };
        if !self.config.enabled {
            debug!(points = count, "clustering disabled");
            return Ok(summary);
        }

        let mut seeds = Vec::new();
        seeds
            .try_reserve(count)
            .map_err(|source| ClusterError::Allocation { cluster: 0, source })?;
        // Indexed by cluster; a frame never has more clusters than points.
        let mut singletons = [false; MAX_FRAME_POINTS];

        let mut cluster = 0usize;
        for index in 0..count {
            if !points[index].label.is_unclassified() {
                continue;
            }

            let hood = self.neighborhood(points, index, cluster)?;
            if self.is_core(&hood) {
                self.expand(points, index, hood, cluster, &singletons, &mut seeds)?;
                cluster += 1;
            } else if self.config.is_protected(&points[index]) {
                points[index].label = Self::label_for(cluster, count)?;
                singletons[cluster] = true;
                summary.protected += 1;
                cluster += 1;
            } else {
                points[index].label = PointLabel::Noise;
            }
        }

        summary.clusters = cluster;
        summary.noise = points.iter().filter(|p| p.label.is_noise()).count();
        debug!(
            points = count,
            clusters = summary.clusters,
            noise = summary.noise,
            protected = summary.protected,
            "frame clustered"
        );
        Ok(summary)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
