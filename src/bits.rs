//! Positional bit/byte cursor over a byte buffer, and the matching writer.
//!
//! Bits are consumed most-significant first within each byte. Byte reads always
//! re-align to the next byte boundary first; bit reads continue from the current bit.

use crate::error::MovieError;
use crate::value::Bits;
use byteorder::{ByteOrder, LittleEndian};

#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitCursor { data, bit_pos: 0 }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Current position in bits from the start of the buffer.
    pub fn bit_position(&self) -> usize {
        self.bit_pos
    }

    /// Current byte, rounded up when mid-byte.
    pub fn position(&self) -> usize {
        (self.bit_pos + 7) / 8
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position())
    }

    pub fn is_aligned(&self) -> bool {
        self.bit_pos % 8 == 0
    }

    pub fn align_to_byte(&mut self) {
        self.bit_pos = (self.bit_pos + 7) & !7;
    }

    pub fn seek(&mut self, byte_offset: usize) {
        self.bit_pos = byte_offset * 8;
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], MovieError> {
        self.align_to_byte();
        let start = self.bit_pos / 8;
        let end = start + n;
        if end > self.data.len() {
            return Err(MovieError::Underrun {
                needed: n * 8,
                available: self.data.len().saturating_sub(start) * 8,
            });
        }
        self.bit_pos = end * 8;
        Ok(&self.data[start..end])
    }

    pub fn read_bits(&mut self, n: u32) -> Result<Bits, MovieError> {
        if n == 0 {
            return Ok(Bits::EMPTY);
        }
        if n > 64 {
            return Err(MovieError::Format(format!("bit read of {} exceeds 64", n)));
        }
        let total = self.data.len() * 8;
        if self.bit_pos + n as usize > total {
            return Err(MovieError::Underrun {
                needed: n as usize,
                available: total.saturating_sub(self.bit_pos),
            });
        }
        let mut out = 0u64;
        for _ in 0..n {
            let byte = self.data[self.bit_pos / 8];
            let bit = (byte >> (7 - (self.bit_pos % 8))) & 1;
            out = (out << 1) | bit as u64;
            self.bit_pos += 1;
        }
        Ok(Bits::new(out, n))
    }

    pub fn read_u8(&mut self) -> Result<u8, MovieError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, MovieError> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, MovieError> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    /// Null-terminated byte string; the terminator is consumed but not returned.
    pub fn read_cstring_bytes(&mut self) -> Result<&'a [u8], MovieError> {
        self.align_to_byte();
        let start = self.bit_pos / 8;
        let rest = self.data.get(start..).unwrap_or(&[]);
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(MovieError::UnterminatedString { offset: start })?;
        self.bit_pos = (start + nul + 1) * 8;
        Ok(&rest[..nul])
    }

    /// As [`read_cstring_bytes`](Self::read_cstring_bytes), decoded lossily as UTF-8.
    pub fn read_cstring(&mut self) -> Result<String, MovieError> {
        Ok(String::from_utf8_lossy(self.read_cstring_bytes()?).into_owned())
    }
}

/// Bit-level writer: MSB-first packing, zero padding on alignment.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    out: Vec<u8>,
    cur: u8,
    used: u8, // bits filled in `cur`, 0..8
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_aligned(&self) -> bool {
        self.used == 0
    }

    pub fn write_bits(&mut self, bits: Bits) {
        for i in 0..bits.len() {
            if bits.bit(i) {
                self.cur |= 1 << (7 - self.used);
            }
            self.used += 1;
            if self.used == 8 {
                self.out.push(self.cur);
                self.cur = 0;
                self.used = 0;
            }
        }
    }

    pub fn align_to_byte(&mut self) {
        if self.used != 0 {
            self.out.push(self.cur);
            self.cur = 0;
            self.used = 0;
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.align_to_byte();
        self.out.extend_from_slice(bytes);
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_then_bytes_realign() {
        let data = [0b1010_0000, 0x34, 0x12];
        let mut c = BitCursor::new(&data);
        assert_eq!(c.read_bits(3).unwrap().raw(), 0b101);
        assert_eq!(c.bit_position(), 3);
        assert_eq!(c.read_u16().unwrap(), 0x1234);
        assert_eq!(c.position(), 3);
    }

    #[test]
    fn zero_bit_read_consumes_nothing() {
        let data = [0xff];
        let mut c = BitCursor::new(&data);
        assert!(c.read_bits(0).unwrap().is_empty());
        assert_eq!(c.bit_position(), 0);
    }

    #[test]
    fn underrun_on_short_buffer() {
        let data = [0xff];
        let mut c = BitCursor::new(&data);
        assert!(matches!(c.read_bits(9), Err(MovieError::Underrun { .. })));
        assert!(matches!(c.read_bytes(2), Err(MovieError::Underrun { .. })));
    }

    #[test]
    fn cstring_requires_terminator() {
        let mut c = BitCursor::new(b"abc\0def");
        assert_eq!(c.read_cstring().unwrap(), "abc");
        assert!(matches!(c.read_cstring(), Err(MovieError::UnterminatedString { offset: 4 })));
    }

    #[test]
    fn writer_packs_msb_first() {
        let mut w = BitWriter::new();
        w.write_bits(Bits::new(0b101, 3));
        w.write_bits(Bits::new(0b11, 2));
        assert!(!w.is_aligned());
        assert_eq!(w.into_bytes(), vec![0b1011_1000]);
    }
}
