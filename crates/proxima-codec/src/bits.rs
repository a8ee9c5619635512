//! Unaligned bit streams with DroneCAN scalar packing.
//!
//! A scalar of `n` bits is laid out the way libcanard does it: the value's
//! bytes are taken in little-endian order, a trailing partial byte is
//! left-aligned, and the resulting bit string is copied MSB-first into the
//! stream at the current offset.  Fields are therefore not byte aligned.

use crate::CodecError;

fn bit_at(bytes: &[u8], pos: usize) -> bool {
    bytes[pos / 8] & (0x80 >> (pos % 8)) != 0
}

fn set_bit(bytes: &mut [u8], pos: usize, value: bool) {
    let mask = 0x80 >> (pos % 8);
    if value {
        bytes[pos / 8] |= mask;
    } else {
        bytes[pos / 8] &= !mask;
    }
}

fn mask(bit_len: usize) -> u64 {
    if bit_len >= 64 {
        u64::MAX
    } else {
        (1u64 << bit_len) - 1
    }
}

// ────────────────────────────────────────────────────────────────────────────
// BitWriter
// ────────────────────────────────────────────────────────────────────────────

/// Writes scalars into a caller-provided buffer.
#[derive(Debug)]
pub struct BitWriter<'a> {
    buf: &'a mut [u8],
    bit_ofs: usize,
}

impl<'a> BitWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, bit_ofs: 0 }
    }

    /// Append the low `bit_len` bits of `value` (1..=64).
    pub fn write(&mut self, value: u64, bit_len: usize) -> Result<(), CodecError> {
        debug_assert!((1..=64).contains(&bit_len));
        let end = self.bit_ofs + bit_len;
        if end > self.buf.len() * 8 {
            return Err(CodecError::BufferTooSmall {
                needed: end.div_ceil(8),
                available: self.buf.len(),
            });
        }

        let mut storage = (value & mask(bit_len)).to_le_bytes();
        let rem = bit_len % 8;
        if rem != 0 {
            storage[bit_len / 8] <<= 8 - rem;
        }
        for i in 0..bit_len {
            set_bit(self.buf, self.bit_ofs + i, bit_at(&storage, i));
        }
        self.bit_ofs = end;
        Ok(())
    }

    pub fn bit_offset(&self) -> usize {
        self.bit_ofs
    }

    /// Bytes touched so far.
    pub fn byte_len(&self) -> usize {
        self.bit_ofs.div_ceil(8)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// BitReader
// ────────────────────────────────────────────────────────────────────────────

/// Reads scalars from a payload, never past its end.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    buf: &'a [u8],
    bit_ofs: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, bit_ofs: 0 }
    }

    /// Read the next `bit_len` bits (1..=64) as an unsigned value.
    pub fn read(&mut self, bit_len: usize) -> Result<u64, CodecError> {
        debug_assert!((1..=64).contains(&bit_len));
        if bit_len > self.remaining() {
            return Err(CodecError::Truncated {
                bit_offset: self.bit_ofs,
                wanted: bit_len,
            });
        }

        let mut storage = [0u8; 8];
        for i in 0..bit_len {
            set_bit(&mut storage, i, bit_at(self.buf, self.bit_ofs + i));
        }
        let rem = bit_len % 8;
        if rem != 0 {
            storage[bit_len / 8] >>= 8 - rem;
        }
        self.bit_ofs += bit_len;
        Ok(u64::from_le_bytes(storage))
    }

    pub fn bit_offset(&self) -> usize {
        self.bit_ofs
    }

    /// Unread bits left in the payload.
    pub fn remaining(&self) -> usize {
        self.buf.len() * 8 - self.bit_ofs
    }
}
