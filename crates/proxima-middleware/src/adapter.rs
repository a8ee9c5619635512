//! The transport seam.
//!
//! The pipeline never speaks to the CAN driver.  It hands each encoded
//! [`Transfer`] to a [`TransportAdapter`]; the adapter turns it into whatever
//! the outside world needs (CAN frames, a log file, an in-process bus).
//!
//! - [`TransportAdapter`] – the trait every transport must implement.
//! - [`BusTransport`] – publishes onto the in-process [`EventBus`].

use proxima_types::{Event, EventPayload, RadarError, Transfer};
use tracing::trace;

use crate::bus::{EventBus, Topic};

/// Every outbound transport must implement this trait.
///
/// # Contract
///
/// * `broadcast` – must not block; a failure concerns this transfer only and
///   the caller carries on with the next frame.
/// * `report_dropped` – optional notice that a frame was discarded.
pub trait TransportAdapter {
    /// Transport name for logging.
    fn name(&self) -> &str;

    /// Hand one encoded message to the transport.
    fn broadcast(&self, transfer: Transfer) -> Result<(), RadarError>;

    /// Announce that `frame` produced no output.
    fn report_dropped(&self, _frame: u64, _reason: &str) -> Result<(), RadarError> {
        Ok(())
    }
}

/// Publishes transfers on [`Topic::Obstacles`] and dropped-frame notices on
/// [`Topic::Diagnostics`].
#[derive(Debug, Clone)]
pub struct BusTransport {
    bus: EventBus,
    source: String,
}

impl BusTransport {
    pub fn new(bus: EventBus, source: impl Into<String>) -> Self {
        Self {
            bus,
            source: source.into(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

impl TransportAdapter for BusTransport {
    fn name(&self) -> &str {
        "event-bus"
    }

    fn broadcast(&self, transfer: Transfer) -> Result<(), RadarError> {
        let transfer_id = transfer.transfer_id;
        let event = Event::new(self.source.clone(), EventPayload::Transfer(transfer));
        let receivers = self.bus.publish_to(Topic::Obstacles, event)?;
        trace!(transfer_id, receivers, "transfer published");
        Ok(())
    }

    fn report_dropped(&self, frame: u64, reason: &str) -> Result<(), RadarError> {
        let event = Event::new(
            self.source.clone(),
            EventPayload::FrameDropped {
                frame,
                reason: reason.to_string(),
            },
        );
        self.bus.publish_to(Topic::Diagnostics, event).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxima_types::TransferPriority;

    fn transfer(transfer_id: u8) -> Transfer {
        Transfer {
            data_type_id: 20802,
            signature: 0x4152_8FF1_0CD1_3209,
            transfer_id,
            priority: TransferPriority::Medium,
            payload: vec![0x54, 0x0A, 0xA0],
        }
    }

    #[test]
    fn broadcast_publishes_on_obstacles_topic() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Obstacles);
        let transport = BusTransport::new(bus, "proxima-runtime::pipeline");

        transport.broadcast(transfer(7)).unwrap();

        let event = rx.try_recv().expect("event must be buffered");
        assert_eq!(event.source, "proxima-runtime::pipeline");
        match event.payload {
            EventPayload::Transfer(t) => assert_eq!(t, transfer(7)),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn broadcast_without_listener_is_a_transport_error() {
        let transport = BusTransport::new(EventBus::default(), "test");
        let err = transport.broadcast(transfer(0)).unwrap_err();
        assert!(matches!(err, RadarError::Transport(_)));
    }

    #[test]
    fn dropped_frames_go_to_diagnostics() {
        let bus = EventBus::default();
        let mut diagnostics = bus.subscribe_to(Topic::Diagnostics);
        let transport = BusTransport::new(bus.clone(), "test");

        transport.report_dropped(12, "allocation failed").unwrap();

        let event = diagnostics.try_recv().expect("notice must be buffered");
        match event.payload {
            EventPayload::FrameDropped { frame, reason } => {
                assert_eq!(frame, 12);
                assert_eq!(reason, "allocation failed");
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(transport.name(), "event-bus");
    }
}
