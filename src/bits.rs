//! Bit-level cursors over byte buffers.
//!
//! Fax and TIFF LZW data is packed most significant bit first, GIF LZW data
//! least significant bit first. Both directions share one reader and one
//! writer, selected at construction.

use crate::error::{ImageResult, StreamError};

/// Order in which bits are taken from (or put into) each byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitOrder {
    /// Bit 7 first; multi-bit codes are read big end first.
    Msb,
    /// Bit 0 first; multi-bit codes are assembled little end first.
    Lsb,
}

#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_offset: usize,
    order: BitOrder,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8], order: BitOrder) -> Self {
        Self {
            data,
            bit_offset: 0,
            order,
        }
    }

    #[inline(always)]
    pub fn read_bit(&mut self) -> ImageResult<u32> {
        let byte = *self
            .data
            .get(self.byte_position())
            .ok_or(StreamError::UnexpectedEof)? as u32;
        let shift = match self.order {
            BitOrder::Msb => 7 - self.bit_position(),
            BitOrder::Lsb => self.bit_position(),
        };
        self.bit_offset += 1;
        Ok((byte >> shift) & 1)
    }

    /// Read a code of `num_bits` bits, at most 32.
    #[inline]
    pub fn read_bits(&mut self, num_bits: u32) -> ImageResult<u32> {
        debug_assert!(num_bits <= 32);
        if self.remaining_bits() < num_bits as usize {
            // Leave the cursor at the end so that callers see a consistent state.
            self.bit_offset = self.data.len() * 8;
            return Err(StreamError::UnexpectedEof.into());
        }

        let mut result = 0u32;
        match self.order {
            BitOrder::Msb => {
                for _ in 0..num_bits {
                    result = (result << 1) | self.read_bit()?;
                }
            }
            BitOrder::Lsb => {
                for i in 0..num_bits {
                    result |= self.read_bit()? << i;
                }
            }
        }
        Ok(result)
    }

    /// Look at the next `num_bits` bits without consuming them.
    #[inline]
    pub fn peek_bits(&self, num_bits: u32) -> ImageResult<u32> {
        self.clone().read_bits(num_bits)
    }

    /// Skip forward to the next byte boundary.
    #[inline]
    pub fn align_to_byte(&mut self) {
        let bit_pos = self.bit_position();
        if bit_pos != 0 {
            self.bit_offset += 8 - bit_pos;
        }
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.byte_position() >= self.data.len()
    }

    #[inline]
    pub fn remaining_bits(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.bit_offset)
    }

    /// Index of the byte holding the next bit.
    #[inline]
    pub fn byte_position(&self) -> usize {
        self.bit_offset >> 3
    }

    #[inline(always)]
    fn bit_position(&self) -> usize {
        self.bit_offset & 7
    }
}

#[derive(Debug, Clone)]
pub struct BitWriter {
    data: Vec<u8>,
    // Bits already used in the last byte of `data`, 0 when it is complete.
    used: u32,
    order: BitOrder,
}

impl BitWriter {
    pub fn new(order: BitOrder) -> Self {
        Self {
            data: Vec::new(),
            used: 0,
            order,
        }
    }

    /// Append the low `width` bits of `value`.
    ///
    /// In MSB order the most significant of those bits is written first, in
    /// LSB order the least significant one.
    pub fn put_code(&mut self, value: u32, width: u32) {
        debug_assert!(width <= 32);
        match self.order {
            BitOrder::Msb => {
                for i in (0..width).rev() {
                    self.put_bit((value >> i) & 1);
                }
            }
            BitOrder::Lsb => {
                for i in 0..width {
                    self.put_bit((value >> i) & 1);
                }
            }
        }
    }

    /// Append `count` copies of `bit`.
    pub fn put_bits_repeated(&mut self, bit: u32, count: usize) {
        for _ in 0..count {
            self.put_bit(bit);
        }
    }

    #[inline]
    pub fn put_bit(&mut self, bit: u32) {
        if self.used == 0 {
            self.data.push(0);
        }
        if bit & 1 != 0 {
            let shift = match self.order {
                BitOrder::Msb => 7 - self.used,
                BitOrder::Lsb => self.used,
            };
            if let Some(last) = self.data.last_mut() {
                *last |= 1 << shift;
            }
        }
        self.used = (self.used + 1) & 7;
    }

    /// Zero fill up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        self.used = 0;
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        if self.used == 0 {
            self.data.len() * 8
        } else {
            (self.data.len() - 1) * 8 + self.used as usize
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msb_reader_reads_codes_big_end_first() {
        let data = [0b1011_0011, 0b0100_0000];
        let mut reader = BitReader::new(&data, BitOrder::Msb);
        assert_eq!(reader.read_bit().unwrap(), 1);
        assert_eq!(reader.read_bits(3).unwrap(), 0b011);
        assert_eq!(reader.read_bits(6).unwrap(), 0b0011_01);
        assert_eq!(reader.byte_position(), 1);
        reader.align_to_byte();
        assert!(reader.is_at_end());
        assert!(reader.read_bit().is_err());
    }

    #[test]
    fn lsb_reader_assembles_little_end_first() {
        // 9-bit codes 0x100 and 0x101 as packed by GIF.
        let data = [0x00, 0x03, 0x02];
        let mut reader = BitReader::new(&data, BitOrder::Lsb);
        assert_eq!(reader.read_bits(9).unwrap(), 0x100);
        assert_eq!(reader.read_bits(9).unwrap(), 0x101);
    }

    #[test]
    fn reading_past_the_end_is_an_error() {
        let data = [0xFF];
        let mut reader = BitReader::new(&data, BitOrder::Msb);
        assert_eq!(reader.peek_bits(8).unwrap(), 0xFF);
        assert!(reader.read_bits(9).is_err());
        assert!(reader.is_at_end());
    }

    #[test]
    fn writer_pads_partial_bytes_with_zero() {
        let mut writer = BitWriter::new(BitOrder::Msb);
        writer.put_code(0b101, 3);
        assert_eq!(writer.bit_len(), 3);
        writer.align_to_byte();
        writer.put_code(0x1, 12);
        assert_eq!(writer.into_bytes(), vec![0b1010_0000, 0x00, 0x10]);
    }

    #[test]
    fn writer_and_reader_agree_in_both_orders() {
        for order in [BitOrder::Msb, BitOrder::Lsb] {
            let mut writer = BitWriter::new(order);
            let codes = [(5u32, 3u32), (300, 9), (4095, 12), (1, 1), (0, 7)];
            for &(value, width) in &codes {
                writer.put_code(value, width);
            }
            let bytes = writer.into_bytes();
            let mut reader = BitReader::new(&bytes, order);
            for &(value, width) in &codes {
                assert_eq!(reader.read_bits(width).unwrap(), value);
            }
        }
    }
}
