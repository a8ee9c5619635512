//! The `ProximitySensor` broadcast: one radar's obstacle list.
//!
//! ```text
//! uint3       sensor_id
//! uint5       obstacle count      (omitted with tail-array optimisation)
//! Obstacle[<=31] obstacles
//! ```

use proxima_types::{ObstacleRecord, SensorId};
use tracing::trace;

use crate::obstacle::OBSTACLE_BITS;
use crate::{BitReader, BitWriter, BroadcastMessage, CodecError, DsdlMessage};

/// Capacity of the obstacle array.
pub const MAX_OBSTACLES: usize = 31;

const SENSOR_ID_BITS: usize = 3;
const COUNT_BITS: usize = 5;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProximitySensorMessage {
    pub sensor_id: SensorId,
    pub obstacles: Vec<ObstacleRecord>,
}

impl ProximitySensorMessage {
    pub fn new(sensor_id: SensorId, obstacles: Vec<ObstacleRecord>) -> Self {
        Self {
            sensor_id,
            obstacles,
        }
    }

    /// Exact encoded size in bytes for `count` obstacles.
    ///
    /// The count field and the sensor id share the first byte, so both wire
    /// modes use the same number of bytes.
    pub fn encoded_len(count: usize, tail_array: bool) -> usize {
        let header = if tail_array {
            SENSOR_ID_BITS
        } else {
            SENSOR_ID_BITS + COUNT_BITS
        };
        (header + count * OBSTACLE_BITS).div_ceil(8)
    }
}

impl DsdlMessage for ProximitySensorMessage {
    const MAX_SIZE: usize = 187;
    const SIGNATURE: u64 = 0x4152_8FF1_0CD1_3209;

    fn encode_fields(&self, writer: &mut BitWriter<'_>, tail_array: bool) -> Result<(), CodecError> {
        let count = self.obstacles.len();
        if count > MAX_OBSTACLES {
            return Err(CodecError::TooManyElements {
                count,
                max: MAX_OBSTACLES,
            });
        }

        writer.write(u64::from(self.sensor_id.as_u8()), SENSOR_ID_BITS)?;
        if !tail_array {
            writer.write(count as u64, COUNT_BITS)?;
        }
        for obstacle in &self.obstacles {
            obstacle.encode_fields(writer, false)?;
        }
        Ok(())
    }

    fn decode_fields(reader: &mut BitReader<'_>, tail_array: bool) -> Result<Self, CodecError> {
        let raw = reader.read(SENSOR_ID_BITS)? as u8;
        let sensor_id = SensorId::try_from(raw).map_err(|_| CodecError::UnknownSensor(raw))?;

        let mut obstacles = Vec::new();
        if tail_array {
            // Whole records only; leftover padding bits are never read.
            while reader.remaining() >= OBSTACLE_BITS {
                if obstacles.len() == MAX_OBSTACLES {
                    return Err(CodecError::TooManyElements {
                        count: MAX_OBSTACLES + 1,
                        max: MAX_OBSTACLES,
                    });
                }
                obstacles.push(ObstacleRecord::decode_fields(reader, false)?);
            }
        } else {
            let count = reader.read(COUNT_BITS)? as usize;
            obstacles.reserve(count);
            for _ in 0..count {
                obstacles.push(ObstacleRecord::decode_fields(reader, false)?);
            }
        }

        trace!(sensor = %sensor_id, records = obstacles.len(), tail_array, "decoded proximity message");
        Ok(Self {
            sensor_id,
            obstacles,
        })
    }
}

impl BroadcastMessage for ProximitySensorMessage {
    const DATA_TYPE_ID: u16 = 20802;
    const NAME: &'static str = "com.aeronavics.ProximitySensor";
}
