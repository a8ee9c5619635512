//! The nested `Obstacle` record: three binary16 fields.

use proxima_types::ObstacleRecord;

use crate::float16::{from_f16_bits, to_f16_bits};
use crate::{BitReader, BitWriter, CodecError, DsdlMessage};

/// Encoded size of one record in bits.
pub const OBSTACLE_BITS: usize = 48;

impl DsdlMessage for ObstacleRecord {
    const MAX_SIZE: usize = 6;
    const SIGNATURE: u64 = 0x95DF_056B_4953_3A25;

    fn encode_fields(&self, writer: &mut BitWriter<'_>, _tail_array: bool) -> Result<(), CodecError> {
        writer.write(u64::from(to_f16_bits(self.yaw_deg)), 16)?;
        writer.write(u64::from(to_f16_bits(self.pitch_deg)), 16)?;
        writer.write(u64::from(to_f16_bits(self.distance_m)), 16)
    }

    fn decode_fields(reader: &mut BitReader<'_>, _tail_array: bool) -> Result<Self, CodecError> {
        let mut field = || reader.read(16).map(|bits| from_f16_bits(bits as u16));
        Ok(ObstacleRecord {
            yaw_deg: field()?,
            pitch_deg: field()?,
            distance_m: field()?,
        })
    }
}
