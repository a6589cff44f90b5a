//! LZW decompression for TIFF strips and GIF image data.
//!
//! Both formats share the dictionary algorithm and differ in bit order, the
//! initial code width and the point at which the code width grows. TIFF
//! switches one code early (at 511, 1023 and 2047 entries), GIF when the
//! next free entry no longer fits the current width.

use crate::bits::{BitOrder, BitReader};
use crate::error::{ImageResult, StreamError};

const MAX_CODE_WIDTH: u32 = 12;
const MAX_ENTRIES: usize = 1 << MAX_CODE_WIDTH;

#[derive(Clone, Copy, Debug)]
struct Entry {
    /// The entry this one extends, `None` for roots and control codes.
    prefix: Option<u16>,
    suffix: u8,
    length: u16,
}

/// The code dictionary, reset to its roots on every clear code.
#[derive(Debug)]
struct LzwTable {
    entries: Vec<Entry>,
    roots: u16,
}

impl LzwTable {
    fn new(roots: u16) -> LzwTable {
        let mut table = LzwTable {
            entries: Vec::with_capacity(MAX_ENTRIES),
            roots,
        };
        table.reset();
        table
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.entries.extend((0..self.roots).map(|i| Entry {
            prefix: None,
            suffix: i as u8,
            length: 1,
        }));
        // Clear and end codes never expand.
        let control = Entry {
            prefix: None,
            suffix: 0,
            length: 0,
        };
        self.entries.push(control);
        self.entries.push(control);
    }

    fn next_code(&self) -> u16 {
        self.entries.len() as u16
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= MAX_ENTRIES
    }

    fn push(&mut self, prefix: u16, suffix: u8) {
        if self.is_full() {
            return;
        }
        let length = self.entries[usize::from(prefix)].length.saturating_add(1);
        self.entries.push(Entry {
            prefix: Some(prefix),
            suffix,
            length,
        });
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flavor {
    Tiff,
    Gif,
}

/// A per-call LZW decoder.
#[derive(Debug)]
pub struct LzwDecoder {
    flavor: Flavor,
    order: BitOrder,
    min_width: u32,
    clear_code: u16,
    end_code: u16,
    table: LzwTable,
    stack: Vec<u8>,
}

impl LzwDecoder {
    /// The TIFF variant: MSB first, 9 bit codes to start, early change.
    pub fn tiff() -> LzwDecoder {
        Self::with_roots(Flavor::Tiff, BitOrder::Msb, 8)
    }

    /// The GIF variant for a stream whose minimum code size is `min_code_size`.
    ///
    /// The size is clamped to `2..=11`.
    pub fn gif(min_code_size: u8) -> LzwDecoder {
        let min = u32::from(min_code_size).clamp(2, MAX_CODE_WIDTH - 1);
        Self::with_roots(Flavor::Gif, BitOrder::Lsb, min)
    }

    fn with_roots(flavor: Flavor, order: BitOrder, min_code_size: u32) -> LzwDecoder {
        let clear_code = 1u16 << min_code_size;
        LzwDecoder {
            flavor,
            order,
            min_width: min_code_size + 1,
            clear_code,
            end_code: clear_code + 1,
            table: LzwTable::new(clear_code),
            stack: Vec::with_capacity(MAX_ENTRIES),
        }
    }

    /// Decompress `input`, producing at most `limit` bytes.
    ///
    /// Output beyond the limit is discarded. Running out of input before the
    /// end code ends the stream without error.
    pub fn decode(&mut self, input: &[u8], limit: usize) -> ImageResult<Vec<u8>> {
        let mut reader = BitReader::new(input, self.order);
        let mut out = Vec::with_capacity(limit.min(input.len().saturating_mul(4)));
        let mut width = self.min_width;
        let mut prev: Option<u16> = None;

        self.table.reset();

        while out.len() < limit {
            let code = match reader.read_bits(width) {
                Ok(code) => code as u16,
                Err(_) => {
                    log::trace!("LZW stream ended without end code");
                    break;
                }
            };

            if code == self.clear_code {
                self.table.reset();
                width = self.min_width;
                prev = None;
                continue;
            }
            if code == self.end_code {
                break;
            }

            let next = self.table.next_code();
            match prev {
                None => {
                    if code >= self.clear_code {
                        return Err(StreamError::LzwInvalidCode(code, next).into());
                    }
                    self.expand(code, &mut out)?;
                }
                Some(prev) if code < next => {
                    let first = self.expand(code, &mut out)?;
                    self.table.push(prev, first);
                }
                Some(prev) if code == next && !self.table.is_full() => {
                    let first = self.expand(prev, &mut out)?;
                    out.push(first);
                    self.table.push(prev, first);
                }
                Some(_) => return Err(StreamError::LzwInvalidCode(code, next).into()),
            }
            prev = Some(code);

            let next = u32::from(self.table.next_code());
            let switch = match self.flavor {
                Flavor::Tiff => next + 1 >= 1 << width,
                Flavor::Gif => next >= 1 << width,
            };
            if switch && width < MAX_CODE_WIDTH {
                width += 1;
            }
        }

        out.truncate(limit);
        Ok(out)
    }

    /// Append the string of `code` to `out` and return its first byte.
    fn expand(&mut self, code: u16, out: &mut Vec<u8>) -> ImageResult<u8> {
        self.stack.clear();
        let mut current = Some(code);
        while let Some(c) = current {
            let entry = self
                .table
                .entries
                .get(usize::from(c))
                .ok_or(StreamError::LzwInvalidCode(c, self.table.next_code()))?;
            if self.stack.len() >= MAX_ENTRIES {
                return Err(StreamError::LzwInvalidCode(code, self.table.next_code()).into());
            }
            self.stack.push(entry.suffix);
            current = entry.prefix;
        }
        let first = *self.stack.last().ok_or(StreamError::InvalidCode)?;
        out.extend(self.stack.iter().rev());
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitWriter;
    use crate::error::ImageError;

    const TEST_DATA: &[u8] = b"This is a string for checking various compression algorithms.";

    // TEST_DATA as written by a TIFF LZW encoder.
    const COMPRESSED_DATA: [u8; 63] = [
        0x80, 0x15, 0x0D, 0x06, 0x93, 0x98, 0x82, 0x08, 0x20, 0x30, 0x88, 0x0E, 0x67, 0x43, 0x91,
        0xA4, 0xDC, 0x67, 0x10, 0x19, 0x8D, 0xE7, 0x21, 0x01, 0x8C, 0xD0, 0x65, 0x31, 0x9A, 0xE1,
        0xD1, 0x03, 0xB1, 0x86, 0x1A, 0x6F, 0x3A, 0xC1, 0x4C, 0x66, 0xF3, 0x69, 0xC0, 0xE4, 0x65,
        0x39, 0x9C, 0xCD, 0x26, 0xF3, 0x74, 0x20, 0xD8, 0x67, 0x89, 0x9A, 0x4E, 0x86, 0x83, 0x69,
        0xCC, 0x5D, 0x01,
    ];

    fn tiff_codes(codes: &[u32]) -> Vec<u8> {
        let mut writer = BitWriter::new(BitOrder::Msb);
        for &code in codes {
            writer.put_code(code, 9);
        }
        writer.into_bytes()
    }

    #[test]
    fn decodes_known_tiff_stream() {
        let decoded = LzwDecoder::tiff().decode(&COMPRESSED_DATA, 1000).unwrap();
        assert_eq!(decoded, TEST_DATA);
    }

    #[test]
    fn single_row_of_one_value() {
        // 0, then three KwKwK codes: 1 + 2 + 3 + 4 samples.
        let data = tiff_codes(&[256, 0, 258, 259, 260, 257]);
        let decoded = LzwDecoder::tiff().decode(&data, 10).unwrap();
        assert_eq!(decoded, vec![0; 10]);
    }

    #[test]
    fn output_is_capped_at_limit() {
        let data = tiff_codes(&[256, 0, 258, 259, 260, 257]);
        let decoded = LzwDecoder::tiff().decode(&data, 4).unwrap();
        assert_eq!(decoded, vec![0; 4]);
    }

    #[test]
    fn rejects_code_beyond_dictionary() {
        let data = tiff_codes(&[256, 65, 300, 257]);
        let err = LzwDecoder::tiff().decode(&data, 100).unwrap_err();
        assert!(matches!(
            err,
            ImageError::CorruptEntropyStream(StreamError::LzwInvalidCode(300, 258))
        ));
    }

    #[test]
    fn gif_stream_with_small_code_size() {
        // Minimum code size 2: clear 4, end 5, codes start at 3 bits and
        // widen once entry 7 fills the 3 bit range.
        let mut writer = BitWriter::new(BitOrder::Lsb);
        for (code, width) in [(4, 3), (1, 3), (6, 3), (6, 3), (2, 4), (5, 4)] {
            writer.put_code(code, width);
        }
        let decoded = LzwDecoder::gif(2).decode(&writer.into_bytes(), 100).unwrap();
        assert_eq!(decoded, vec![1, 1, 1, 1, 1, 2]);
    }

    #[cfg(feature = "lzw")]
    #[test]
    fn agrees_with_weezl() {
        let data: Vec<u8> = (0..20_000u32)
            .map(|i| ((i / 7) ^ (i % 13) * 3) as u8)
            .collect();

        let tiff = weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
            .encode(&data)
            .unwrap();
        assert_eq!(LzwDecoder::tiff().decode(&tiff, data.len()).unwrap(), data);

        let gif = weezl::encode::Encoder::new(weezl::BitOrder::Lsb, 8)
            .encode(&data)
            .unwrap();
        assert_eq!(LzwDecoder::gif(8).decode(&gif, data.len()).unwrap(), data);
    }
}
