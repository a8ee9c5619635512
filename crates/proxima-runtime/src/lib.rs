//! `proxima-runtime` – runs radar frames through the obstacle pipeline.
//!
//! # Modules
//!
//! - [`pipeline`] – [`ObstaclePipeline`][pipeline::ObstaclePipeline]: the
//!   per-frame orchestrator that clusters, transforms, caps, encodes and
//!   hands each frame's obstacles to a
//!   [`TransportAdapter`][proxima_middleware::TransportAdapter], keeping the
//!   transfer-id counter and [`PipelineStats`][pipeline::PipelineStats].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber for one radar node, tagging
//!   exported spans with the sensor and CAN identity from
//!   [`TelemetryConfig`][telemetry::TelemetryConfig].  Also defines the
//!   field schema of the per-frame span.  Set `OTEL_EXPORTER_OTLP_ENDPOINT`
//!   to export the spans to any OTLP-compatible collector.

pub mod pipeline;
pub mod telemetry;

pub use pipeline::{
    FrameOutcome, FrameReport, ObstaclePipeline, ObstacleReduction, PipelineConfig, PipelineStats,
};
pub use telemetry::{LogFormat, TelemetryConfig, TracerProviderGuard, init_tracing};
