//! IEEE-754 binary16 conversion.
//!
//! Encoding rounds to nearest, ties to even.  Anything whose magnitude would
//! round beyond the largest finite half (65504), infinities included,
//! saturates to ±65504; NaN becomes the canonical quiet NaN `0x7E00`.

/// Largest finite binary16 value.
pub const F16_MAX: f32 = 65504.0;

const F16_MAX_BITS: u16 = 0x7BFF;
const F16_NAN_BITS: u16 = 0x7E00;

/// 2^-24, the weight of one subnormal binary16 step.
const SUBNORMAL_STEP: f32 = 5.960_464_5e-8;

/// Convert to binary16 bits.
pub fn to_f16_bits(value: f32) -> u16 {
    if value.is_nan() {
        return F16_NAN_BITS;
    }

    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let abs = bits & 0x7FFF_FFFF;
    if abs == 0 {
        return sign;
    }

    let exp = (abs >> 23) as i32 - 127;
    let man = abs & 0x007F_FFFF;

    if exp > 15 {
        return sign | F16_MAX_BITS;
    }

    if exp >= -14 {
        let mut half = (((exp + 15) as u32) << 10) | (man >> 13);
        let round = man & 0x1FFF;
        if round > 0x1000 || (round == 0x1000 && half & 1 == 1) {
            // A carry out of the mantissa bumps the exponent, which is the
            // correctly rounded result.
            half += 1;
        }
        return sign | (half.min(u32::from(F16_MAX_BITS)) as u16);
    }

    if exp >= -25 {
        let full = man | 0x0080_0000;
        let shift = (-(exp + 1)) as u32;
        let mut half = full >> shift;
        let rem = full & ((1 << shift) - 1);
        let halfway = 1 << (shift - 1);
        if rem > halfway || (rem == halfway && half & 1 == 1) {
            half += 1;
        }
        return sign | half as u16;
    }

    sign
}

/// Convert binary16 bits to `f32`.  Exact for every input.
pub fn from_f16_bits(bits: u16) -> f32 {
    let negative = bits & 0x8000 != 0;
    let exp = u32::from((bits >> 10) & 0x1F);
    let man = u32::from(bits & 0x03FF);

    let magnitude = match exp {
        0 => man as f32 * SUBNORMAL_STEP,
        0x1F if man == 0 => f32::INFINITY,
        0x1F => f32::NAN,
        _ => f32::from_bits(((exp + 112) << 23) | (man << 13)),
    };
    if negative { -magnitude } else { magnitude }
}

/// Round a value to the nearest representable binary16.
pub fn quantize(value: f32) -> f32 {
    from_f16_bits(to_f16_bits(value))
}
