//! Bit sequences and the three value encodings used by bit-packed records.
//!
//! Widths are never self-describing: every encode/decode takes the width explicitly and
//! the record engine ([`crate::codec`]) is responsible for carrying it.

use crate::error::MovieError;
use serde::{Deserialize, Serialize};

/// Scale of a 16.16 fixed-point value.
pub const FIXED_ONE: f64 = 65536.0;

/// Up to 64 bits, most significant bit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bits {
    value: u64,
    len: u32,
}

fn mask(len: u32) -> u64 {
    if len >= 64 {
        u64::MAX
    } else {
        (1u64 << len) - 1
    }
}

impl Bits {
    pub const EMPTY: Bits = Bits { value: 0, len: 0 };

    /// Keep the low `len` bits of `value`.
    pub fn new(value: u64, len: u32) -> Self {
        debug_assert!(len <= 64);
        Bits { value: value & mask(len), len }
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn raw(&self) -> u64 {
        self.value
    }

    /// Bit `i` counted from the most significant end.
    pub fn bit(&self, i: u32) -> bool {
        i < self.len && (self.value >> (self.len - 1 - i)) & 1 == 1
    }

    /// Leading bit; false for the empty sequence.
    pub fn sign(&self) -> bool {
        self.bit(0)
    }
}

/// Value encodings over an explicit-width bit sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueCodec {
    /// Plain big-endian binary.
    Unsigned,
    /// Two's complement, sign bit first.
    Signed,
    /// Signed two's complement of `value * 65536`.
    Fixed,
}

fn signed_width(v: i64) -> u32 {
    match v {
        0 => 0,
        v if v > 0 => 65 - (v as u64).leading_zeros(),
        v => 65 - ((!v) as u64).leading_zeros(),
    }
}

impl ValueCodec {
    /// Smallest width able to hold `raw`; 0 needs no bits at all.
    pub fn natural_width(self, raw: i64) -> Result<u32, MovieError> {
        match self {
            ValueCodec::Unsigned => {
                if raw < 0 {
                    return Err(MovieError::NegativeValue(raw));
                }
                Ok(64 - (raw as u64).leading_zeros())
            }
            ValueCodec::Signed | ValueCodec::Fixed => Ok(signed_width(raw)),
        }
    }

    /// Encode `raw` at exactly `width` bits.
    pub fn encode(self, raw: i64, width: u32) -> Result<Bits, MovieError> {
        let natural = self.natural_width(raw)?;
        self.align(Bits::new(raw as u64, natural), width)
    }

    /// Pad on the left to `width`: zeros for unsigned, sign replication otherwise.
    pub fn align(self, bits: Bits, width: u32) -> Result<Bits, MovieError> {
        if width < bits.len() || width > 64 {
            return Err(MovieError::Align { natural: bits.len(), width });
        }
        let value = match self {
            ValueCodec::Unsigned => bits.raw(),
            ValueCodec::Signed | ValueCodec::Fixed => {
                if bits.sign() {
                    bits.raw() | (mask(width) & !mask(bits.len()))
                } else {
                    bits.raw()
                }
            }
        };
        Ok(Bits::new(value, width))
    }

    pub fn decode(self, bits: Bits) -> i64 {
        match self {
            ValueCodec::Unsigned => bits.raw() as i64,
            ValueCodec::Signed | ValueCodec::Fixed => {
                if bits.sign() {
                    (bits.raw() | !mask(bits.len())) as i64
                } else {
                    bits.raw() as i64
                }
            }
        }
    }

    pub fn encode_fixed(f: f64, width: u32) -> Result<Bits, MovieError> {
        ValueCodec::Fixed.encode(fixed_to_raw(f), width)
    }

    pub fn decode_fixed(bits: Bits) -> f64 {
        raw_to_fixed(ValueCodec::Fixed.decode(bits))
    }
}

pub fn fixed_to_raw(f: f64) -> i64 {
    (f * FIXED_ONE).round() as i64
}

pub fn raw_to_fixed(raw: i64) -> f64 {
    raw as f64 / FIXED_ONE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_widths() {
        assert_eq!(ValueCodec::Unsigned.natural_width(0).unwrap(), 0);
        assert_eq!(ValueCodec::Unsigned.natural_width(5).unwrap(), 3);
        assert_eq!(ValueCodec::Signed.natural_width(0).unwrap(), 0);
        assert_eq!(ValueCodec::Signed.natural_width(1).unwrap(), 2);
        assert_eq!(ValueCodec::Signed.natural_width(-1).unwrap(), 1);
        assert_eq!(ValueCodec::Signed.natural_width(-2).unwrap(), 2);
        assert_eq!(ValueCodec::Signed.natural_width(-3).unwrap(), 3);
    }

    #[test]
    fn signed_align_replicates_sign() {
        let b = ValueCodec::Signed.encode(-2, 6).unwrap();
        assert_eq!(b.raw(), 0b111110);
        assert_eq!(ValueCodec::Signed.decode(b), -2);
        let b = ValueCodec::Signed.encode(3, 6).unwrap();
        assert_eq!(b.raw(), 0b000011);
    }

    #[test]
    fn align_too_narrow_fails() {
        let err = ValueCodec::Unsigned.encode(8, 3).unwrap_err();
        assert!(matches!(err, MovieError::Align { natural: 4, width: 3 }));
    }

    #[test]
    fn negative_unsigned_fails() {
        let err = ValueCodec::Unsigned.encode(-1, 8).unwrap_err();
        assert!(matches!(err, MovieError::NegativeValue(-1)));
    }

    #[test]
    fn fixed_point_half() {
        let b = ValueCodec::encode_fixed(-0.5, 18).unwrap();
        assert_eq!(ValueCodec::decode_fixed(b), -0.5);
    }

    #[test]
    fn empty_decodes_to_zero() {
        assert_eq!(ValueCodec::Signed.decode(Bits::EMPTY), 0);
        assert_eq!(ValueCodec::Unsigned.decode(Bits::EMPTY), 0);
    }
}
