//! Byte run-length packing and the printable transport form of pixel buffers.
//!
//! The packed stream is a sequence of runs, each introduced by a header byte:
//! `0..=127` is followed by that many plus one literal bytes, `129..=255` by
//! a single byte repeated `257 - header` times, and `128` ends the stream.
//! The packed stream is padded with zeros to a multiple of three bytes so that
//! it maps onto whole groups of four printable characters.

use crate::error::{ImageError, ImageResult, StreamError};
use crate::pixel::PixelBuffer;

const END_OF_DATA: u8 = 0x80;
const MAX_RUN: usize = 128;
const PRINTABLE_BASE: u8 = b'?';

/// Run-length encode `raw`.
pub fn encode(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + raw.len() / MAX_RUN + 4);
    pack_runs(raw, &mut out);
    out.push(END_OF_DATA);
    while out.len() % 3 != 0 {
        out.push(0);
    }
    out
}

/// Append the literal and repeat runs of `raw` to `out`, without terminator.
///
/// This is the PackBits code used by TIFF strips.
pub fn pack_runs(raw: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;

    while i < raw.len() {
        if i + 1 < raw.len() && raw[i] == raw[i + 1] {
            let byte = raw[i];
            let run = raw[i..]
                .iter()
                .take(MAX_RUN)
                .take_while(|&&b| b == byte)
                .count();
            out.push((257 - run) as u8);
            out.push(byte);
            i += run;
        } else {
            let start = i;
            i += 1;
            // A literal stops in front of the next pair of equal bytes.
            while i < raw.len() && i - start < MAX_RUN {
                if i + 1 < raw.len() && raw[i] == raw[i + 1] {
                    break;
                }
                i += 1;
            }
            out.push((i - start - 1) as u8);
            out.extend_from_slice(&raw[start..i]);
        }
    }
}

/// Reverse [`encode`], producing at most `limit` bytes.
pub fn decode(packed: &[u8], limit: usize) -> ImageResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0;

    loop {
        let header = *packed.get(pos).ok_or(StreamError::MissingTerminator)?;
        pos += 1;

        let count = match header {
            END_OF_DATA => return Ok(out),
            0..=127 => usize::from(header) + 1,
            _ => 257 - usize::from(header),
        };
        if out.len() + count > limit {
            return Err(ImageError::BufferTooSmall(out.len() + count, limit));
        }

        if header < END_OF_DATA {
            let literal = packed
                .get(pos..pos + count)
                .ok_or(StreamError::UnexpectedEof)?;
            out.extend_from_slice(literal);
            pos += count;
        } else {
            let byte = *packed.get(pos).ok_or(StreamError::UnexpectedEof)?;
            out.resize(out.len() + count, byte);
            pos += 1;
        }
    }
}

/// Map bytes onto printable characters, four characters per three bytes.
///
/// Each group of three bytes is read as a little-endian 24 bit value and
/// split into four 6 bit digits, lowest first, each offset by `'?'`. A tail
/// of one or two bytes yields two or three characters.
pub fn to_printable(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for group in bytes.chunks(3) {
        let mut value = 0u32;
        for (i, &b) in group.iter().enumerate() {
            value |= u32::from(b) << (8 * i);
        }
        for i in 0..=group.len() {
            let digit = ((value >> (6 * i)) & 0x3F) as u8;
            out.push(char::from(PRINTABLE_BASE + digit));
        }
    }
    out
}

/// Reverse [`to_printable`].
pub fn from_printable(text: &str) -> ImageResult<Vec<u8>> {
    let digits = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .map(|b| match b {
            b'?'..=b'~' => Ok(b - PRINTABLE_BASE),
            _ => Err(StreamError::InvalidCode),
        })
        .collect::<Result<Vec<u8>, _>>()?;

    let mut out = Vec::with_capacity(digits.len() / 4 * 3 + 2);
    for group in digits.chunks(4) {
        if group.len() == 1 {
            return Err(StreamError::UnexpectedEof.into());
        }
        let mut value = 0u32;
        for (i, &d) in group.iter().enumerate() {
            value |= u32::from(d) << (6 * i);
        }
        for i in 0..group.len() - 1 {
            out.push((value >> (8 * i)) as u8);
        }
    }
    Ok(out)
}

/// Serialize the pixels of `buffer` to printable text.
///
/// Rows are packed without their stride padding. The dimensions, depth and
/// palette travel separately.
pub fn encode_image(buffer: &PixelBuffer) -> String {
    let row_bytes = buffer.depth().packed_row_bytes(buffer.width());
    let mut raw = Vec::with_capacity(row_bytes * buffer.height() as usize);
    for y in 0..buffer.height() {
        raw.extend_from_slice(&buffer.row(y)[..row_bytes]);
    }
    to_printable(&encode(&raw))
}

/// Fill the pre-sized `buffer` from text produced by [`encode_image`].
pub fn decode_image(text: &str, buffer: &mut PixelBuffer) -> ImageResult<()> {
    let row_bytes = buffer.depth().packed_row_bytes(buffer.width());
    let expected = row_bytes * buffer.height() as usize;
    let raw = decode(&from_printable(text)?, expected)?;
    if raw.len() < expected {
        return Err(StreamError::UnexpectedEof.into());
    }
    if row_bytes == 0 {
        return Ok(());
    }
    for (y, row) in raw.chunks_exact(row_bytes).enumerate() {
        buffer.row_mut(y as u32)[..row_bytes].copy_from_slice(row);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::BitDepth;

    fn round_trip(raw: &[u8]) {
        let packed = encode(raw);
        assert_eq!(packed.len() % 3, 0);
        assert_eq!(decode(&packed, raw.len()).unwrap(), raw);
    }

    #[test]
    fn runs_and_literals() {
        assert_eq!(encode(&[7, 7, 7]), vec![254, 7, 0x80]);
        assert_eq!(encode(&[1, 2, 3, 3]), vec![1, 1, 2, 255, 3, 0x80]);
        round_trip(&[]);
        round_trip(&[0; 1000]);
        round_trip(&(0..=255u8).collect::<Vec<_>>());
        round_trip(&[5; 129]);
        round_trip(&[1, 2, 2, 3, 3, 3, 4, 5, 6, 6]);
    }

    #[test]
    fn long_runs_split_at_128() {
        let packed = encode(&[9; 130]);
        assert_eq!(&packed[..4], &[129, 9, 255, 9]);
    }

    #[test]
    fn decode_respects_limit() {
        let packed = encode(&[1; 50]);
        assert!(matches!(
            decode(&packed, 10),
            Err(ImageError::BufferTooSmall(50, 10))
        ));
    }

    #[test]
    fn decode_rejects_truncation() {
        assert!(matches!(
            decode(&[4, 1, 2], 100),
            Err(ImageError::CorruptEntropyStream(StreamError::UnexpectedEof))
        ));
        assert!(matches!(
            decode(&[0, 1], 100),
            Err(ImageError::CorruptEntropyStream(
                StreamError::MissingTerminator
            ))
        ));
    }

    #[test]
    fn printable_mapping() {
        assert_eq!(to_printable(&[0, 0, 0]), "????");
        assert_eq!(to_printable(&[0xFF, 0xFF, 0xFF]), "~~~~");
        // Low six bits of the first byte come first.
        assert_eq!(to_printable(&[0x01]), "@?");
        for len in 0..8 {
            let bytes: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
            let text = to_printable(&bytes);
            assert!(text.bytes().all(|c| (b'?'..=b'~').contains(&c)));
            assert_eq!(from_printable(&text).unwrap(), bytes);
        }
        assert!(from_printable("ab!d").is_err());
    }

    #[test]
    fn image_transport_round_trip() {
        let mut image = PixelBuffer::new(13, 4, BitDepth::Four).unwrap();
        for y in 0..4 {
            for x in 0..13 {
                image.set_pixel(x, y, (x * y) % 16);
            }
        }
        let text = encode_image(&image);
        let mut decoded = PixelBuffer::new(13, 4, BitDepth::Four).unwrap();
        decode_image(&text, &mut decoded).unwrap();
        assert_eq!(decoded, image);
    }
}
