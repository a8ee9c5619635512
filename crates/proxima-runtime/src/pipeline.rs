//! [`ObstaclePipeline`] – the per-frame orchestrator.
//!
//! Each call to [`ObstaclePipeline::process_frame`]:
//!
//! 1. **Cluster** – the [`PointClusterer`] labels every point as noise or as a
//!    cluster member.
//! 2. **Transform** – every non-noise point is mapped into the body frame
//!    with the radar's [`SensorTransform`] and converted to yaw, pitch and
//!    distance.
//! 3. **Reduce** – optionally keep only the nearest member of each cluster.
//! 4. **Cap** – records are ordered by cluster index and anything beyond
//!    [`MAX_OBSTACLES`] is dropped (and counted).
//! 5. **Encode** – the list becomes a `ProximitySensor` payload.
//! 6. **Hand off** – the payload is wrapped in a [`Transfer`] and given to
//!    the [`TransportAdapter`].
//!
//! A failing step drops the frame, records it in [`PipelineStats`] and
//! notifies the transport; the next frame starts from a clean slate.  Frames
//! without obstacles publish nothing.
//!
//! # Example
//!
//! ```rust
//! use proxima_middleware::{BusTransport, EventBus, Topic};
//! use proxima_runtime::pipeline::{FrameOutcome, ObstaclePipeline, PipelineConfig};
//! use proxima_types::Point;
//!
//! let bus = EventBus::default();
//! let mut obstacles = bus.subscribe_to(Topic::Obstacles);
//! let transport = BusTransport::new(bus, "proxima-runtime::pipeline");
//! let mut pipeline = ObstaclePipeline::new(PipelineConfig::default(), transport);
//!
//! let mut frame = vec![
//!     Point::new(0.0, 8.0, 0.0, 12.0),
//!     Point::new(0.2, 8.0, 0.0, 12.0),
//!     Point::new(0.0, 8.2, 0.0, 12.0),
//! ];
//! let outcome = pipeline.process_frame(&mut frame);
//!
//! assert!(matches!(outcome, FrameOutcome::Published(_)));
//! assert!(obstacles.try_recv().is_some());
//! ```

use proxima_codec::float16::quantize;
use proxima_codec::{BroadcastMessage, DsdlMessage, MAX_OBSTACLES, ProximitySensorMessage};
use proxima_middleware::TransportAdapter;
use proxima_perception::clustering::{ClusterSummary, ClusteringConfig, Dbscan, PointClusterer};
use proxima_perception::transform::{SensorTransform, Vec3, to_obstacle, wrap_360};
use proxima_types::{
    MAX_FRAME_POINTS, ObstacleRecord, Point, PointLabel, RadarError, SensorId, Transfer,
    TransferPriority,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::telemetry;

/// Transfer ids are 5 bits wide on the bus.
const TRANSFER_ID_MASK: u8 = 0x1F;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// How surviving points become obstacle records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleReduction {
    /// One record per non-noise point.
    #[default]
    PerPoint,
    /// One record per cluster: the member closest to the vehicle.
    /// Unclassified points each stand alone.
    NearestPerCluster,
}

fn default_tail_array() -> bool {
    true
}

/// Configuration bundle for [`ObstaclePipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Mounting position of the radar feeding this pipeline.
    #[serde(default)]
    pub sensor: SensorId,
    /// Encode without the obstacle count (tail-array optimisation).
    #[serde(default = "default_tail_array")]
    pub tail_array: bool,
    #[serde(default)]
    pub reduction: ObstacleReduction,
    #[serde(default)]
    pub priority: TransferPriority,
    #[serde(default)]
    pub clustering: ClusteringConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sensor: SensorId::default(),
            tail_array: default_tail_array(),
            reduction: ObstacleReduction::default(),
            priority: TransferPriority::default(),
            clustering: ClusteringConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Results and bookkeeping
// ─────────────────────────────────────────────────────────────────────────────

/// Running counters kept across frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub frames: u64,
    pub published: u64,
    /// Frames discarded because clustering, input validation or encoding
    /// failed.
    pub dropped: u64,
    /// Frames in which every point was noise (or that had no points).
    pub empty: u64,
    /// Records cut off by the array capacity.
    pub truncated_records: u64,
    pub transport_failures: u64,
}

/// Details of a frame that produced a transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub transfer: Transfer,
    /// Records carried by the transfer.
    pub records: usize,
    /// Records dropped to fit the array capacity.
    pub truncated: usize,
    /// `false` when the transport rejected the transfer.
    pub delivered: bool,
    pub summary: ClusterSummary,
}

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Published(FrameReport),
    /// No obstacle survived; nothing was sent.
    Empty { frame: u64, summary: ClusterSummary },
    Dropped { frame: u64, error: RadarError },
}

// ─────────────────────────────────────────────────────────────────────────────
// ObstaclePipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Owns every piece of per-radar state: the clusterer, the transform, the
/// transport, the transfer-id counter and the statistics.
pub struct ObstaclePipeline<C, T> {
    clusterer: C,
    transport: T,
    transform: SensorTransform,
    config: PipelineConfig,
    transfer_id: u8,
    frame: u64,
    stats: PipelineStats,
    buffer: [u8; ProximitySensorMessage::MAX_SIZE],
}

impl<T: TransportAdapter> ObstaclePipeline<Dbscan, T> {
    /// Build a pipeline that clusters with [`Dbscan`] using
    /// `config.clustering`.
    pub fn new(config: PipelineConfig, transport: T) -> Self {
        let clusterer = Dbscan::new(config.clustering.clone());
        Self::with_clusterer(config, clusterer, transport)
    }
}

impl<C: PointClusterer, T: TransportAdapter> ObstaclePipeline<C, T> {
    /// Build a pipeline around a custom clusterer.  `config.clustering` is
    /// ignored.
    pub fn with_clusterer(config: PipelineConfig, clusterer: C, transport: T) -> Self {
        Self {
            clusterer,
            transport,
            transform: SensorTransform::for_sensor(config.sensor),
            config,
            transfer_id: 0,
            frame: 0,
            stats: PipelineStats::default(),
            buffer: [0; ProximitySensorMessage::MAX_SIZE],
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one frame through the pipeline.  Never fails: errors are turned
    /// into [`FrameOutcome::Dropped`].
    pub fn process_frame(&mut self, points: &mut [Point]) -> FrameOutcome {
        self.frame += 1;
        self.stats.frames += 1;
        let frame = self.frame;
        let span = telemetry::frame_span(
            frame,
            self.config.sensor,
            points.len(),
            self.clusterer.name(),
            self.transport.name(),
        )
        .entered();

        let outcome = match self.run(frame, points) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.stats.dropped += 1;
                warn!(%error, points = points.len(), "frame dropped");
                if let Err(e) = self.transport.report_dropped(frame, &error.to_string()) {
                    debug!(error = %e, "drop notice not delivered");
                }
                FrameOutcome::Dropped { frame, error }
            }
        };
        telemetry::record_outcome(&span, &outcome);
        outcome
    }

    fn run(&mut self, frame: u64, points: &mut [Point]) -> Result<FrameOutcome, RadarError> {
        if points.len() > MAX_FRAME_POINTS {
            return Err(RadarError::FrameTooLarge {
                count: points.len(),
                max: MAX_FRAME_POINTS,
            });
        }

        let summary = self.clusterer.cluster(points)?;
        let candidates = self.collect_obstacles(points);
        if candidates.is_empty() {
            self.stats.empty += 1;
            debug!(noise = summary.noise, "no obstacles in frame");
            return Ok(FrameOutcome::Empty { frame, summary });
        }

        let (records, truncated) = cap_records(candidates);
        if truncated > 0 {
            self.stats.truncated_records += truncated as u64;
            debug!(dropped = truncated, kept = records.len(), "obstacle list truncated");
        }

        let message = ProximitySensorMessage::new(self.config.sensor, records);
        let len = message.encode(&mut self.buffer, self.config.tail_array)?;
        let transfer = Transfer {
            data_type_id: ProximitySensorMessage::DATA_TYPE_ID,
            signature: ProximitySensorMessage::SIGNATURE,
            transfer_id: self.next_transfer_id(),
            priority: self.config.priority,
            payload: self.buffer[..len].to_vec(),
        };

        let delivered = match self.transport.broadcast(transfer.clone()) {
            Ok(()) => {
                self.stats.published += 1;
                true
            }
            Err(error) => {
                self.stats.transport_failures += 1;
                warn!(%error, transfer_id = transfer.transfer_id, "transport rejected transfer");
                false
            }
        };

        debug!(
            records = message.obstacles.len(),
            bytes = len,
            transfer_id = transfer.transfer_id,
            "frame encoded"
        );
        Ok(FrameOutcome::Published(FrameReport {
            frame,
            transfer,
            records: message.obstacles.len(),
            truncated,
            delivered,
            summary,
        }))
    }

    /// Transform every non-noise point into a record tagged with its
    /// ordering key, applying the configured reduction.
    fn collect_obstacles(&self, points: &[Point]) -> Vec<(u16, ObstacleRecord)> {
        let mut candidates: Vec<(u16, ObstacleRecord)> = Vec::new();
        for point in points.iter().filter(|p| !p.label.is_noise()) {
            let key = order_key(point.label);
            let mut record = to_obstacle(self.transform.apply(Vec3::from(point)));
            record.yaw_deg = wire_yaw(record.yaw_deg);

            let same_cluster = match (self.config.reduction, point.label) {
                (ObstacleReduction::NearestPerCluster, PointLabel::Cluster(_)) => {
                    candidates.iter().position(|(k, _)| *k == key)
                }
                _ => None,
            };
            match same_cluster {
                Some(i) => {
                    if record.distance_m < candidates[i].1.distance_m {
                        candidates[i].1 = record;
                    }
                }
                None => candidates.push((key, record)),
            }
        }
        candidates
    }

    /// Return the current transfer id and advance the 5-bit counter.
    fn next_transfer_id(&mut self) -> u8 {
        let id = self.transfer_id;
        self.transfer_id = (self.transfer_id + 1) & TRANSFER_ID_MASK;
        id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Clusters sort by index; unclassified points after every cluster.
fn order_key(label: PointLabel) -> u16 {
    label.cluster().map_or(u16::MAX, u16::from)
}

/// Keep the lowest-indexed clusters, in input order within a cluster.
fn cap_records(mut candidates: Vec<(u16, ObstacleRecord)>) -> (Vec<ObstacleRecord>, usize) {
    candidates.sort_by_key(|(key, _)| *key);
    let truncated = candidates.len().saturating_sub(MAX_OBSTACLES);
    candidates.truncate(MAX_OBSTACLES);
    (candidates.into_iter().map(|(_, r)| r).collect(), truncated)
}

/// Yaw as it will arrive on the wire: binary16 rounding can turn 359.9 into
/// 360, which must read as 0.
fn wire_yaw(yaw_deg: f32) -> f32 {
    wrap_360(quantize(yaw_deg))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use proxima_middleware::{BusTransport, EventBus, Topic};
    use proxima_perception::clustering::ClusterError;
    use proxima_types::EventPayload;

    /// Records every transfer; optionally rejects them all.
    #[derive(Default)]
    struct CapturingTransport {
        sent: RefCell<Vec<Transfer>>,
        dropped: RefCell<Vec<(u64, String)>>,
        reject: Cell<bool>,
    }

    impl TransportAdapter for CapturingTransport {
        fn name(&self) -> &str {
            "capture"
        }

        fn broadcast(&self, transfer: Transfer) -> Result<(), RadarError> {
            if self.reject.get() {
                return Err(RadarError::Transport("bus off".to_string()));
            }
            self.sent.borrow_mut().push(transfer);
            Ok(())
        }

        fn report_dropped(&self, frame: u64, reason: &str) -> Result<(), RadarError> {
            self.dropped.borrow_mut().push((frame, reason.to_string()));
            Ok(())
        }
    }

    /// Fails the first `failures` frames as if memory ran out.
    struct FlakyClusterer {
        inner: Dbscan,
        failures: Cell<usize>,
    }

    impl PointClusterer for FlakyClusterer {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn cluster(&self, points: &mut [Point]) -> Result<ClusterSummary, ClusterError> {
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                let source = Vec::<u8>::new().try_reserve(usize::MAX).unwrap_err();
                return Err(ClusterError::Allocation { cluster: 0, source });
            }
            self.inner.cluster(points)
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            clustering: ClusteringConfig::default()
                .with_epsilon(1.0)
                .with_snr_override(None),
            ..PipelineConfig::default()
        }
    }

    fn pipeline(config: PipelineConfig) -> ObstaclePipeline<Dbscan, CapturingTransport> {
        ObstaclePipeline::new(config, CapturingTransport::default())
    }

    /// Three points within 1 m plus two isolated returns.
    fn five_point_frame() -> Vec<Point> {
        vec![
            Point::new(0.0, 10.0, 0.0, 12.0),
            Point::new(0.5, 10.0, 0.0, 12.0),
            Point::new(0.0, 10.5, 0.0, 12.0),
            Point::new(20.0, 30.0, 0.0, 5.0),
            Point::new(-20.0, 50.0, 0.0, 5.0),
        ]
    }

    /// `count` well separated points, each strong enough to be protected.
    fn protected_singletons(count: usize) -> Vec<Point> {
        (0..count)
            .map(|i| Point::new(i as f32 * 3.0, 5.0 + i as f32, 0.0, 30.0))
            .collect()
    }

    fn decode(transfer: &Transfer, tail_array: bool) -> ProximitySensorMessage {
        ProximitySensorMessage::decode(&transfer.payload, transfer.payload.len(), tail_array)
            .unwrap()
    }

    fn published(outcome: FrameOutcome) -> FrameReport {
        match outcome {
            FrameOutcome::Published(report) => report,
            other => panic!("expected a published frame, got {other:?}"),
        }
    }

    // ── Configuration ────────────────────────────────────────────────────────

    #[test]
    fn config_defaults_from_empty_document() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(config.tail_array);
        assert_eq!(config.sensor, SensorId::Undefined);
        assert_eq!(config.reduction, ObstacleReduction::PerPoint);
    }

    #[test]
    fn config_reads_reduction_and_sensor_names() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"sensor": "rear_left", "reduction": "nearest_per_cluster", "priority": "high"}"#,
        )
        .unwrap();
        assert_eq!(config.sensor, SensorId::RearLeft);
        assert_eq!(config.reduction, ObstacleReduction::NearestPerCluster);
        assert_eq!(config.priority, TransferPriority::High);
    }

    // ── Publishing ───────────────────────────────────────────────────────────

    #[test]
    fn clustered_points_are_published_and_noise_is_not() {
        let mut p = pipeline(test_config());
        let report = published(p.process_frame(&mut five_point_frame()));

        assert_eq!(report.frame, 1);
        assert_eq!(report.records, 3);
        assert_eq!(report.truncated, 0);
        assert!(report.delivered);
        assert_eq!(report.summary.clusters, 1);
        assert_eq!(report.summary.noise, 2);

        let sent = p.transport().sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], report.transfer);
        assert_eq!(sent[0].data_type_id, 20802);
        assert_eq!(sent[0].signature, 0x4152_8FF1_0CD1_3209);

        let msg = decode(&sent[0], true);
        assert_eq!(msg.sensor_id, SensorId::Undefined);
        assert_eq!(msg.obstacles.len(), 3);
        assert!((msg.obstacles[0].distance_m - 10.0).abs() < 1e-2);
        assert!(msg.obstacles[0].yaw_deg.abs() < 1e-5);
    }

    #[test]
    fn counted_wire_mode_is_honoured() {
        let config = PipelineConfig {
            tail_array: false,
            ..test_config()
        };
        let mut p = pipeline(config);
        let report = published(p.process_frame(&mut five_point_frame()));
        assert_eq!(report.transfer.payload[0] & 0x1F, 3, "count field");
        assert_eq!(decode(&report.transfer, false).obstacles.len(), 3);
    }

    #[test]
    fn sensor_transform_is_applied() {
        let config = PipelineConfig {
            sensor: SensorId::FrontRight,
            ..test_config()
        };
        let mut p = pipeline(config);
        let mut frame = vec![
            Point::new(0.0, 10.0, 0.0, 12.0),
            Point::new(0.0, 10.2, 0.0, 12.0),
            Point::new(0.0, 9.8, 0.0, 12.0),
        ];
        let report = published(p.process_frame(&mut frame));
        let msg = decode(&report.transfer, true);
        assert_eq!(msg.sensor_id, SensorId::FrontRight);
        for obstacle in &msg.obstacles {
            assert!((obstacle.yaw_deg - 45.0).abs() < 0.05, "yaw {}", obstacle.yaw_deg);
        }
    }

    #[test]
    fn yaw_just_below_360_is_sent_as_zero() {
        let mut p = pipeline(test_config());
        let angle = (-0.05_f32).to_radians();
        let mut frame: Vec<Point> = [9.8_f32, 10.0, 10.2]
            .iter()
            .map(|r| Point::new(r * angle.sin(), r * angle.cos(), 0.0, 12.0))
            .collect();
        let report = published(p.process_frame(&mut frame));
        for obstacle in decode(&report.transfer, true).obstacles {
            assert_eq!(obstacle.yaw_deg, 0.0);
        }
    }

    #[test]
    fn priority_is_carried_on_the_transfer() {
        let config = PipelineConfig {
            priority: TransferPriority::Highest,
            ..test_config()
        };
        let report = published(pipeline(config).process_frame(&mut five_point_frame()));
        assert_eq!(report.transfer.priority, TransferPriority::Highest);
    }

    // ── Empty frames ─────────────────────────────────────────────────────────

    #[test]
    fn all_noise_publishes_nothing() {
        let mut p = pipeline(test_config());
        let mut frame = vec![
            Point::new(0.0, 10.0, 0.0, 1.0),
            Point::new(30.0, 10.0, 0.0, 1.0),
        ];
        let outcome = p.process_frame(&mut frame);
        assert!(matches!(outcome, FrameOutcome::Empty { frame: 1, .. }));
        assert!(p.transport().sent.borrow().is_empty());
        assert_eq!(p.stats().empty, 1);
        assert_eq!(p.stats().published, 0);
    }

    #[test]
    fn zero_point_frame_is_empty() {
        let mut p = pipeline(test_config());
        assert!(matches!(p.process_frame(&mut []), FrameOutcome::Empty { .. }));
    }

    // ── Truncation ───────────────────────────────────────────────────────────

    #[test]
    fn excess_records_are_truncated_lowest_index_first() {
        let config = PipelineConfig {
            clustering: ClusteringConfig::default().with_snr_override(Some(20.0)),
            ..test_config()
        };
        let mut p = pipeline(config);
        let mut frame = protected_singletons(40);
        let report = published(p.process_frame(&mut frame));

        assert_eq!(report.records, MAX_OBSTACLES);
        assert_eq!(report.truncated, 9);
        assert_eq!(p.stats().truncated_records, 9);

        let msg = decode(&report.transfer, true);
        assert_eq!(msg.obstacles.len(), MAX_OBSTACLES);
        for (i, obstacle) in msg.obstacles.iter().enumerate() {
            let expected = quantize(frame[i].range());
            assert_eq!(obstacle.distance_m, expected, "record {i} is not cluster {i}");
        }
    }

    #[test]
    fn unclassified_points_sort_after_clusters() {
        let candidates = vec![
            (u16::MAX, ObstacleRecord::new(1.0, 0.0, 1.0)),
            (2, ObstacleRecord::new(2.0, 0.0, 2.0)),
            (0, ObstacleRecord::new(3.0, 0.0, 3.0)),
            (2, ObstacleRecord::new(4.0, 0.0, 4.0)),
        ];
        let (records, truncated) = cap_records(candidates);
        assert_eq!(truncated, 0);
        let yaws: Vec<f32> = records.iter().map(|r| r.yaw_deg).collect();
        assert_eq!(yaws, vec![3.0, 2.0, 4.0, 1.0]);
    }

    // ── Reduction and disabled clustering ────────────────────────────────────

    #[test]
    fn nearest_per_cluster_keeps_closest_member() {
        let config = PipelineConfig {
            reduction: ObstacleReduction::NearestPerCluster,
            clustering: ClusteringConfig::default()
                .with_epsilon(1.0)
                .with_snr_override(Some(20.0)),
            ..test_config()
        };
        let mut p = pipeline(config);
        let mut frame = five_point_frame();
        frame.push(Point::new(40.0, 40.0, 0.0, 25.0));
        let report = published(p.process_frame(&mut frame));

        assert_eq!(report.records, 2);
        let msg = decode(&report.transfer, true);
        assert!((msg.obstacles[0].distance_m - 10.0).abs() < 1e-2);
        assert!((msg.obstacles[1].distance_m - 40.0 * 2.0_f32.sqrt()).abs() < 0.1);
    }

    #[test]
    fn disabled_clustering_publishes_every_point() {
        let config = PipelineConfig {
            clustering: ClusteringConfig::default().with_enabled(false),
            reduction: ObstacleReduction::NearestPerCluster,
            ..test_config()
        };
        let mut p = pipeline(config);
        let mut frame = five_point_frame();
        let report = published(p.process_frame(&mut frame));
        assert_eq!(report.records, 5);
        assert!(frame.iter().all(|pt| pt.label.is_unclassified()));
    }

    // ── Failures ─────────────────────────────────────────────────────────────

    #[test]
    fn clustering_failure_drops_only_that_frame() {
        let clusterer = FlakyClusterer {
            inner: Dbscan::new(test_config().clustering),
            failures: Cell::new(1),
        };
        let mut p = ObstaclePipeline::with_clusterer(
            test_config(),
            clusterer,
            CapturingTransport::default(),
        );

        let first = p.process_frame(&mut five_point_frame());
        match first {
            FrameOutcome::Dropped { frame, error } => {
                assert_eq!(frame, 1);
                assert!(matches!(error, RadarError::Clustering(_)), "{error:?}");
            }
            other => panic!("expected a dropped frame, got {other:?}"),
        }
        assert_eq!(p.transport().dropped.borrow().len(), 1);
        assert!(p.transport().sent.borrow().is_empty());

        let second = published(p.process_frame(&mut five_point_frame()));
        assert_eq!(second.frame, 2);
        assert_eq!(second.transfer.transfer_id, 0, "dropped frames consume no id");
        assert_eq!(p.stats().dropped, 1);
        assert_eq!(p.stats().published, 1);
    }

    #[test]
    fn oversized_frame_is_dropped() {
        let mut p = pipeline(test_config());
        let mut frame = protected_singletons(MAX_FRAME_POINTS + 1);
        let outcome = p.process_frame(&mut frame);
        assert_eq!(
            outcome,
            FrameOutcome::Dropped {
                frame: 1,
                error: RadarError::FrameTooLarge {
                    count: 256,
                    max: 255
                }
            }
        );
        assert_eq!(p.stats().dropped, 1);
    }

    #[test]
    fn transport_failure_is_counted_not_fatal() {
        let mut p = pipeline(test_config());
        p.transport().reject.set(true);
        let report = published(p.process_frame(&mut five_point_frame()));
        assert!(!report.delivered);
        assert_eq!(p.stats().transport_failures, 1);
        assert_eq!(p.stats().published, 0);

        p.transport().reject.set(false);
        let report = published(p.process_frame(&mut five_point_frame()));
        assert!(report.delivered);
        assert_eq!(report.transfer.transfer_id, 1);
    }

    // ── Bookkeeping ──────────────────────────────────────────────────────────

    #[test]
    fn transfer_id_wraps_after_31() {
        let mut p = pipeline(test_config());
        let ids: Vec<u8> = (0..34)
            .map(|_| published(p.process_frame(&mut five_point_frame())).transfer.transfer_id)
            .collect();
        assert_eq!(ids[0], 0);
        assert_eq!(ids[31], 31);
        assert_eq!(ids[32], 0);
        assert_eq!(ids[33], 1);
    }

    #[test]
    fn stats_accumulate_across_frames() {
        let mut p = pipeline(test_config());
        p.process_frame(&mut five_point_frame());
        p.process_frame(&mut []);
        p.process_frame(&mut protected_singletons(300));
        assert_eq!(
            p.stats(),
            PipelineStats {
                frames: 3,
                published: 1,
                dropped: 1,
                empty: 1,
                truncated_records: 0,
                transport_failures: 0,
            }
        );
    }

    #[test]
    fn bus_transport_end_to_end() {
        let bus = EventBus::default();
        let mut obstacles = bus.subscribe_to(Topic::Obstacles);
        let mut diagnostics = bus.subscribe_to(Topic::Diagnostics);
        let transport = BusTransport::new(bus, "proxima-runtime::pipeline");
        let mut p = ObstaclePipeline::new(test_config(), transport);

        p.process_frame(&mut five_point_frame());
        p.process_frame(&mut protected_singletons(MAX_FRAME_POINTS + 1));

        let event = obstacles.try_recv().expect("transfer on the bus");
        match event.payload {
            EventPayload::Transfer(t) => assert_eq!(decode(&t, true).obstacles.len(), 3),
            other => panic!("unexpected payload {other:?}"),
        }
        let notice = diagnostics.try_recv().expect("drop notice on the bus");
        assert!(matches!(notice.payload, EventPayload::FrameDropped { frame: 2, .. }));
    }

    #[test]
    fn wire_yaw_wraps_rounded_values() {
        assert_eq!(wire_yaw(359.95), 0.0);
        assert_eq!(wire_yaw(90.0), 90.0);
        assert_eq!(order_key(PointLabel::Cluster(4)), 4);
        assert_eq!(order_key(PointLabel::Unclassified), u16::MAX);
    }
}
