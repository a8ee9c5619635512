//! `proxima-middleware` – hand-off between the pipeline and the vehicle bus.
//!
//! The pipeline never frames CAN traffic itself.  It hands encoded
//! [`Transfer`][proxima_types::Transfer]s to a [`TransportAdapter`], which
//! owns whatever lies beyond: framing, CRC, arbitration.
//!
//! # Modules
//!
//! - [`bus`] – topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.
//! - [`adapter`] – the [`TransportAdapter`] seam and [`BusTransport`], which
//!   publishes transfers onto the [`EventBus`].

pub mod adapter;
pub mod bus;

pub use adapter::{BusTransport, TransportAdapter};
pub use bus::{EventBus, Topic, TopicReceiver};
