//! `proxima-codec` – DroneCAN wire format for obstacle reports.
//!
//! Messages are serialised field by field into an unaligned bit stream
//! (see [`bits`]), with real numbers carried as IEEE-754 binary16
//! (see [`float16`]).
//!
//! | Message | Kind | Signature | Max payload |
//! |---|---|---|---|
//! | [`ProximitySensorMessage`] | broadcast, id 20802 | `0x41528FF10CD13209` | 187 bytes |
//! | [`ObstacleRecord`][proxima_types::ObstacleRecord] | nested | `0x95DF056B49533A25` | 6 bytes |
//!
//! # Tail-array optimisation
//!
//! When the last field of a message is a dynamic array, the transport may
//! drop its length prefix; the decoder then infers the element count from
//! the payload length.  Every encode/decode call takes a `tail_array` flag
//! selecting this mode.
//!
//! # Example
//!
//! ```rust
//! use proxima_codec::{DsdlMessage, ProximitySensorMessage};
//! use proxima_types::{ObstacleRecord, SensorId};
//!
//! let msg = ProximitySensorMessage::new(
//!     SensorId::RearLeft,
//!     vec![ObstacleRecord::new(90.0, 0.0, 5.0)],
//! );
//!
//! let mut buf = [0u8; ProximitySensorMessage::MAX_SIZE];
//! let len = msg.encode(&mut buf, true).unwrap();
//! assert_eq!(len, 7);
//!
//! let back = ProximitySensorMessage::decode(&buf, len, true).unwrap();
//! assert_eq!(back, msg);
//! ```

pub mod bits;
pub mod float16;
pub mod obstacle;
pub mod proximity;

pub use bits::{BitReader, BitWriter};
pub use proximity::{MAX_OBSTACLES, ProximitySensorMessage};

use proxima_types::RadarError;
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer holds {available} bytes, {needed} required")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("{count} elements exceed the array capacity of {max}")]
    TooManyElements { count: usize, max: usize },

    #[error("payload ends before a {wanted}-bit field at bit {bit_offset}")]
    Truncated { bit_offset: usize, wanted: usize },

    #[error("declared payload length {declared} but {consumed} bytes were decoded")]
    LengthMismatch { declared: usize, consumed: usize },

    #[error("payload length {payload_len} exceeds the {buffer_len}-byte buffer")]
    PayloadExceedsBuffer { payload_len: usize, buffer_len: usize },

    #[error("unknown sensor identifier {0}")]
    UnknownSensor(u8),
}

impl From<CodecError> for RadarError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnknownSensor(id) => RadarError::UnknownSensor(id),
            other => RadarError::Codec(other.to_string()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Message traits
// ────────────────────────────────────────────────────────────────────────────

/// A DSDL-described data structure with a fixed maximum encoded size.
pub trait DsdlMessage: Sized {
    /// Largest possible encoded payload in bytes.
    const MAX_SIZE: usize;
    /// Data type signature used to seed the transfer CRC.
    const SIGNATURE: u64;

    /// Append this value's fields to `writer`.
    fn encode_fields(&self, writer: &mut BitWriter<'_>, tail_array: bool) -> Result<(), CodecError>;

    /// Read one value from `reader`.
    fn decode_fields(reader: &mut BitReader<'_>, tail_array: bool) -> Result<Self, CodecError>;

    /// Serialise into `buffer`, which must hold at least
    /// [`MAX_SIZE`][Self::MAX_SIZE] bytes.  The whole buffer is zeroed first;
    /// returns the number of bytes used.
    fn encode(&self, buffer: &mut [u8], tail_array: bool) -> Result<usize, CodecError> {
        if buffer.len() < Self::MAX_SIZE {
            return Err(CodecError::BufferTooSmall {
                needed: Self::MAX_SIZE,
                available: buffer.len(),
            });
        }
        buffer.fill(0);
        let mut writer = BitWriter::new(buffer);
        self.encode_fields(&mut writer, tail_array)?;
        Ok(writer.byte_len())
    }

    /// Deserialise the first `payload_len` bytes of `buffer`.
    ///
    /// The byte length implied by the bits actually consumed must equal
    /// `payload_len`; otherwise the message is rejected as a whole.  Trailing
    /// padding, such as a CAN FD frame rounded up to its next length code, is
    /// rejected too.
    fn decode(buffer: &[u8], payload_len: usize, tail_array: bool) -> Result<Self, CodecError> {
        let payload = buffer
            .get(..payload_len)
            .ok_or(CodecError::PayloadExceedsBuffer {
                payload_len,
                buffer_len: buffer.len(),
            })?;

        let mut reader = BitReader::new(payload);
        let message = Self::decode_fields(&mut reader, tail_array)?;

        let consumed = reader.bit_offset().div_ceil(8);
        if consumed != payload_len {
            return Err(CodecError::LengthMismatch {
                declared: payload_len,
                consumed,
            });
        }
        Ok(message)
    }
}

/// A message that can be broadcast on its own.
pub trait BroadcastMessage: DsdlMessage {
    const DATA_TYPE_ID: u16;
    /// Full DSDL name.
    const NAME: &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_errors_convert_to_radar_errors() {
        assert_eq!(
            RadarError::from(CodecError::UnknownSensor(6)),
            RadarError::UnknownSensor(6)
        );
        let err = RadarError::from(CodecError::LengthMismatch {
            declared: 14,
            consumed: 13,
        });
        assert_eq!(
            err.to_string(),
            "Codec Error: declared payload length 14 but 13 bytes were decoded"
        );
    }
}
