//! Tracing setup and the per-frame span schema.
//!
//! [`init_tracing`] installs the global subscriber for one radar node.  The
//! node's identity ([`TelemetryConfig`]) travels as OpenTelemetry resource
//! attributes, so spans from several radars on one vehicle can be told apart
//! in a collector.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector base URL (e.g. `http://localhost:4318`). When set the OTLP HTTP exporter is activated. |
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `PROXIMA_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |
//!
//! # Resource attributes
//!
//! | Key | Value |
//! |---|---|
//! | `service.name` | [`TelemetryConfig::service`] |
//! | `proxima.sensor.id` | wire value of the sensor id (0–4) |
//! | `proxima.sensor.name` | sensor id in snake case |
//! | `proxima.can.hardware_uid` | hardware uid, when configured |
//! | `proxima.can.data_type_id` | data type id of the broadcast message |
//! | `proxima.can.message` | full DSDL name of the broadcast message |
//!
//! # Frame span
//!
//! Every frame runs inside one [`FRAME_SPAN`] span created by
//! [`frame_span`].  Identity fields are set on entry; result fields start
//! empty and are filled by [`record_outcome`]:
//!
//! | Field | Set | Meaning |
//! |---|---|---|
//! | `frame` | entry | 1-based frame counter of the pipeline |
//! | `sensor` | entry | sensor the frame came from |
//! | `points` | entry | raw points in the frame |
//! | `clusterer` | entry | clustering algorithm |
//! | `transport` | entry | transport adapter |
//! | `outcome` | exit | `published`, `empty` or `dropped` |
//! | `clusters` | exit | clusters found (not for dropped frames) |
//! | `noise` | exit | points discarded as noise (not for dropped frames) |
//! | `records` | exit | obstacle records broadcast |
//! | `truncated` | exit | records cut to fit the array |
//! | `transfer_id` | exit | 5-bit transfer id used |
//! | `delivered` | exit | whether the transport accepted the transfer |
//!
//! # Example
//!
//! ```rust,no_run
//! use proxima_runtime::telemetry::{TelemetryConfig, init_tracing};
//! use proxima_types::SensorId;
//!
//! // Hold the guard for the entire lifetime of the process.
//! let _guard = init_tracing(&TelemetryConfig::new("proxima").with_sensor(SensorId::FrontRight));
//! ```

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use proxima_codec::{BroadcastMessage, ProximitySensorMessage};
use proxima_types::SensorId;
use tracing::{Span, field, info_span};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::pipeline::FrameOutcome;

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "PROXIMA_LOG_FORMAT";

/// Name of the per-frame span.
pub const FRAME_SPAN: &str = "frame";

/// Fields of the per-frame span, in declaration order.
pub const FRAME_FIELDS: [&str; 12] = [
    "frame",
    "sensor",
    "points",
    "clusterer",
    "transport",
    "outcome",
    "clusters",
    "noise",
    "records",
    "truncated",
    "transfer_id",
    "delivered",
];

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Console log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// Parse the value of [`LOG_FORMAT_ENV`]; anything but `json` is compact.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }

    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }
}

/// Identity of the radar node emitting telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service: String,
    pub sensor: SensorId,
    pub hardware_uid: Option<u8>,
    pub format: LogFormat,
}

impl TelemetryConfig {
    /// Node with an undefined sensor; the log format comes from the
    /// environment.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            sensor: SensorId::Undefined,
            hardware_uid: None,
            format: LogFormat::from_env(),
        }
    }

    pub fn with_sensor(mut self, sensor: SensorId) -> Self {
        self.sensor = sensor;
        self
    }

    pub fn with_hardware_uid(mut self, hardware_uid: Option<u8>) -> Self {
        self.hardware_uid = hardware_uid;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Resource attributes describing this node, `service.name` excluded.
    pub fn resource_attributes(&self) -> Vec<KeyValue> {
        let mut attributes = vec![
            KeyValue::new("proxima.sensor.id", i64::from(self.sensor.as_u8())),
            KeyValue::new("proxima.sensor.name", self.sensor.to_string()),
            KeyValue::new(
                "proxima.can.data_type_id",
                i64::from(ProximitySensorMessage::DATA_TYPE_ID),
            ),
            KeyValue::new("proxima.can.message", ProximitySensorMessage::NAME),
        ];
        if let Some(uid) = self.hardware_uid {
            attributes.push(KeyValue::new("proxima.can.hardware_uid", i64::from(uid)));
        }
        attributes
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscriber
// ─────────────────────────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber for one radar node.
///
/// When `OTEL_EXPORTER_OTLP_ENDPOINT` is set, frame spans are also exported
/// over OTLP/HTTP with the node's resource attributes.  A second call, or a
/// subscriber already installed by a test harness, is reported and ignored.
///
/// The returned [`TracerProviderGuard`] **must** be held for the lifetime of
/// the process; dropping it flushes all pending spans.
pub fn init_tracing(config: &TelemetryConfig) -> TracerProviderGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let provider = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .and_then(|endpoint| build_provider(&endpoint, config));

    let console = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
    };
    let otel = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("proxima")));

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(otel)
        .try_init()
    {
        eprintln!("[proxima] tracing subscriber already installed: {e}");
    }

    TracerProviderGuard(provider)
}

/// RAII guard that shuts down the OTel [`SdkTracerProvider`] on drop.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// Whether spans are being exported.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[proxima] OpenTelemetry provider shutdown error: {e}");
        }
    }
}

fn build_resource(config: &TelemetryConfig) -> Resource {
    Resource::builder()
        .with_service_name(config.service.clone())
        .with_attributes(config.resource_attributes())
        .build()
}

/// Returns `None` when the exporter cannot be built; the caller falls back
/// to console output only.
fn build_provider(endpoint: &str, config: &TelemetryConfig) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[proxima] OTLP exporter init failed: {e}"))
        .ok()?;

    Some(
        SdkTracerProvider::builder()
            .with_resource(build_resource(config))
            // Frames are processed synchronously; there is no runtime for a
            // batch exporter.
            .with_simple_exporter(exporter)
            .build(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame span
// ─────────────────────────────────────────────────────────────────────────────

/// Open the span for one frame with every field of [`FRAME_FIELDS`]
/// declared.
pub fn frame_span(
    frame: u64,
    sensor: SensorId,
    points: usize,
    clusterer: &'static str,
    transport: &str,
) -> Span {
    info_span!(
        "frame",
        frame,
        sensor = %sensor,
        points,
        clusterer,
        transport,
        outcome = field::Empty,
        clusters = field::Empty,
        noise = field::Empty,
        records = field::Empty,
        truncated = field::Empty,
        transfer_id = field::Empty,
        delivered = field::Empty,
    )
}

/// Fill the result fields of a frame span.
pub fn record_outcome(span: &Span, outcome: &FrameOutcome) {
    match outcome {
        FrameOutcome::Published(report) => {
            span.record("outcome", "published");
            span.record("clusters", report.summary.clusters);
            span.record("noise", report.summary.noise);
            span.record("records", report.records);
            span.record("truncated", report.truncated);
            span.record("transfer_id", report.transfer.transfer_id);
            span.record("delivered", report.delivered);
        }
        FrameOutcome::Empty { summary, .. } => {
            span.record("outcome", "empty");
            span.record("clusters", summary.clusters);
            span.record("noise", summary.noise);
            span.record("records", 0u64);
        }
        FrameOutcome::Dropped { .. } => {
            span.record("outcome", "dropped");
            span.record("records", 0u64);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
