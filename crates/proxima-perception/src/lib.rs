//! `proxima-perception` – from raw radar returns to located obstacles.
//!
//! # Modules
//!
//! - [`clustering`] – [`Dbscan`][clustering::Dbscan]: density-based
//!   clustering that separates obstacles from sparse noise, with an override
//!   policy that keeps strong or close returns.
//! - [`transform`] – [`SensorTransform`][transform::SensorTransform]: maps
//!   points from a radar's local frame into the vehicle body frame using the
//!   compiled-in mounting calibration, and converts body-frame positions to
//!   yaw/pitch/distance.

pub mod clustering;
pub mod transform;
