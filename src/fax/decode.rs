use std::mem;

use super::tables::{
    Mode, ModeState, ModeStep, Node, BLACK_TREE, INVALID, MAX_CODE_BITS, VALUE_FLAG, VALUE_MASK,
    WHITE_TREE,
};
use super::{ChangingElements, FaxOptions, FaxScheme};
use crate::bits::{BitOrder, BitReader};
use crate::error::{ImageError, ImageResult, StreamError};

/// Zero bits of an end of line code before its final one bit.
const EOL_ZEROS: u32 = 11;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RowEnd {
    Complete,
    EndOfBlock,
}

/// Decoder for the fax strips of one image.
///
/// Every strip starts against an imaginary white reference row.
#[derive(Debug)]
pub struct FaxDecoder {
    options: FaxOptions,
    reference: ChangingElements,
    current: ChangingElements,
}

impl FaxDecoder {
    pub fn new(options: FaxOptions) -> FaxDecoder {
        FaxDecoder {
            options,
            reference: ChangingElements::new(),
            current: ChangingElements::new(),
        }
    }

    pub fn row_bytes(&self) -> usize {
        self.options.width.div_ceil(8) as usize
    }

    /// Decode one strip into `out`, which holds a whole number of rows.
    ///
    /// Returns the number of rows decoded. Decoding stops early at the end of
    /// the data or at an end of block. When a row fails, the rows before it
    /// are already in `out`.
    pub fn decode_strip(&mut self, data: &[u8], out: &mut [u8]) -> ImageResult<usize> {
        let width = self.options.width;
        let row_bytes = self.row_bytes();
        if width == 0 || row_bytes == 0 {
            return Ok(0);
        }

        self.reference.clear();
        self.current.clear();
        let mut reader = BitReader::new(data, BitOrder::Msb);
        let mut decoded = 0;

        for row in out.chunks_exact_mut(row_bytes) {
            match self.options.scheme {
                FaxScheme::Rle => {
                    if reader.is_at_end() {
                        break;
                    }
                    decode_1d_row(&mut reader, &mut self.current, width, false)?;
                    reader.align_to_byte();
                }
                FaxScheme::Group3_1D => {
                    let eols = skip_eols(&mut reader);
                    if reader.is_at_end() || eols > 1 {
                        break;
                    }
                    decode_1d_row(&mut reader, &mut self.current, width, false)?;
                }
                FaxScheme::Group3_2D => {
                    let eols = skip_eols(&mut reader);
                    if reader.is_at_end() || eols > 1 {
                        break;
                    }
                    let one_dimensional = if eols == 1 {
                        let tag = reader.read_bit()?;
                        if skip_eols(&mut reader.clone()) > 0 {
                            // Return to control.
                            break;
                        }
                        tag == 1
                    } else {
                        decoded == 0
                    };
                    if one_dimensional {
                        decode_1d_row(&mut reader, &mut self.current, width, false)?;
                    } else if self.decode_2d_row(&mut reader)? == RowEnd::EndOfBlock {
                        break;
                    }
                }
                FaxScheme::Group4 => {
                    if reader.is_at_end() {
                        break;
                    }
                    if self.decode_2d_row(&mut reader)? == RowEnd::EndOfBlock {
                        break;
                    }
                }
            }

            self.current.render(row, width);
            mem::swap(&mut self.reference, &mut self.current);
            self.current.clear();
            decoded += 1;
        }

        log::trace!(
            "fax strip: {} rows from {} of {} bytes",
            decoded,
            reader.byte_position().min(data.len()),
            data.len()
        );
        Ok(decoded)
    }

    fn decode_2d_row(&mut self, reader: &mut BitReader<'_>) -> ImageResult<RowEnd> {
        let width = self.options.width;
        let clamp = self.options.scheme == FaxScheme::Group4;
        let mut a0: Option<u32> = None;
        let mut white = true;

        while a0.map_or(true, |a0| a0 < width) {
            match decode_mode(reader)? {
                Mode::Pass => {
                    let (_, b2) = self.reference.b1_b2(a0, white, width);
                    a0 = Some(b2);
                }
                Mode::Horizontal => {
                    let bound = if clamp { None } else { Some(width) };
                    let mut a1 = decode_run(reader, white, a0.unwrap_or(0), bound)?;
                    let mut a2 = decode_run(reader, !white, a1, bound)?;
                    if a2 > width {
                        if !clamp {
                            return Err(StreamError::RowOverflow(a2, width).into());
                        }
                        a1 = a1.min(width);
                        a2 = width;
                    }
                    for pos in [a1, a2] {
                        if pos < width {
                            self.current.push(pos);
                        }
                    }
                    a0 = Some(a2);
                }
                Mode::Vertical(delta) => {
                    let (b1, _) = self.reference.b1_b2(a0, white, width);
                    let a1 = i64::from(b1) + i64::from(delta);
                    if a1 < i64::from(a0.unwrap_or(0)) || a1 > i64::from(width) {
                        return Err(StreamError::InvalidCode.into());
                    }
                    let a1 = a1 as u32;
                    if a1 < width {
                        self.current.push(a1);
                    }
                    white = !white;
                    a0 = Some(a1);
                }
                Mode::Eol => {
                    finish_eol(reader, 7)?;
                    if a0.is_none() {
                        return Ok(RowEnd::EndOfBlock);
                    }
                    return Err(StreamError::InvalidCode.into());
                }
                Mode::Uncompressed => {
                    if !self.options.uncompressed {
                        return Err(ImageError::UnsupportedVariant(
                            "uncompressed mode in a fax stream that does not enable it".into(),
                        ));
                    }
                    let (pos, next_white) =
                        decode_uncompressed(reader, &mut self.current, a0, white, width)?;
                    a0 = Some(pos);
                    white = next_white;
                }
                Mode::Error => return Err(StreamError::ModeError.into()),
            }
        }

        Ok(RowEnd::Complete)
    }
}

fn decode_mode(reader: &mut BitReader<'_>) -> ImageResult<Mode> {
    let mut state = ModeState::Start;
    loop {
        match state.step(reader.read_bit()?) {
            ModeStep::Next(next) => state = next,
            ModeStep::Finish(mode) => return Ok(mode),
        }
    }
}

/// Decode one run from `start`, accumulating makeup codes up to the
/// terminating code, and return where it ends.
///
/// With a `bound`, a run reaching past it is a row overflow as soon as a code
/// takes it there. Without one the end saturates.
fn decode_run(
    reader: &mut BitReader<'_>,
    white: bool,
    start: u32,
    bound: Option<u32>,
) -> ImageResult<u32> {
    let tree: &[Node] = if white { &WHITE_TREE } else { &BLACK_TREE };
    let mut end = start;
    let mut node = 0usize;
    let mut bits = 0u8;

    loop {
        let bit = reader.read_bit()?;
        bits += 1;
        if bits > MAX_CODE_BITS {
            return Err(StreamError::InvalidCode.into());
        }

        let transition = if bit == 0 {
            tree[node].on_0
        } else {
            tree[node].on_1
        };
        if transition == INVALID {
            return Err(StreamError::InvalidCode.into());
        } else if transition & VALUE_FLAG != 0 {
            let run = u32::from(transition & VALUE_MASK);
            end = end.saturating_add(run);
            if let Some(width) = bound.filter(|&width| end > width) {
                return Err(StreamError::RowOverflow(end, width).into());
            }
            if run < 64 {
                return Ok(end);
            }
            node = 0;
            bits = 0;
        } else {
            node = usize::from(transition);
        }
    }
}

/// Decode a row of alternating white and black runs.
fn decode_1d_row(
    reader: &mut BitReader<'_>,
    current: &mut ChangingElements,
    width: u32,
    clamp: bool,
) -> ImageResult<()> {
    let mut pos = 0u32;
    let mut white = true;
    while pos < width {
        let bound = if clamp { None } else { Some(width) };
        let end = decode_run(reader, white, pos, bound)?.min(width);
        if end < width {
            current.push(end);
        }
        pos = end;
        white = !white;
    }
    Ok(())
}

/// Consume the rest of an end of line code of which `zeros` zero bits were read.
fn finish_eol(reader: &mut BitReader<'_>, mut zeros: u32) -> ImageResult<()> {
    while reader.read_bit()? == 0 {
        zeros += 1;
    }
    if zeros < EOL_ZEROS {
        return Err(StreamError::InvalidCode.into());
    }
    Ok(())
}

/// Skip end of line codes and their fill bits, returning how many were found.
///
/// Zero bits that run to the end of the data are consumed as fill.
fn skip_eols(reader: &mut BitReader<'_>) -> usize {
    let mut count = 0;
    loop {
        let mut probe = reader.clone();
        let mut zeros = 0;
        let found_one = loop {
            match probe.read_bit() {
                Ok(0) => zeros += 1,
                Ok(_) => break true,
                Err(_) => break false,
            }
        };
        if !found_one {
            if zeros > 0 {
                *reader = probe;
            }
            return count;
        }
        if zeros < EOL_ZEROS {
            return count;
        }
        *reader = probe;
        count += 1;
    }
}

/// Decode uncompressed mode from position `a0` until its exit code.
///
/// Returns the position reached and whether the next run is white.
fn decode_uncompressed(
    reader: &mut BitReader<'_>,
    current: &mut ChangingElements,
    a0: Option<u32>,
    mut white: bool,
    width: u32,
) -> ImageResult<(u32, bool)> {
    let mut pos = a0.unwrap_or(0);

    loop {
        let mut zeros = 0;
        while reader.read_bit()? == 0 {
            zeros += 1;
            if zeros > 10 {
                return Err(StreamError::InvalidCode.into());
            }
        }
        match zeros {
            0..=4 => {
                emit(current, width, true, zeros, &mut pos, &mut white)?;
                emit(current, width, false, 1, &mut pos, &mut white)?;
            }
            5 => emit(current, width, true, 5, &mut pos, &mut white)?,
            _ => {
                emit(current, width, true, zeros - 6, &mut pos, &mut white)?;
                let next_white = reader.read_bit()? == 0;
                if next_white != white {
                    if pos < width {
                        current.push(pos);
                    }
                    white = next_white;
                }
                return Ok((pos, white));
            }
        }
    }
}

/// Append `count` pixels of one colour in uncompressed mode.
fn emit(
    current: &mut ChangingElements,
    width: u32,
    pixel_white: bool,
    count: u32,
    pos: &mut u32,
    white: &mut bool,
) -> ImageResult<()> {
    if count == 0 {
        return Ok(());
    }
    if pixel_white != *white {
        if *pos < width {
            current.push(*pos);
        }
        *white = pixel_white;
    }
    *pos = pos.saturating_add(count);
    if *pos > width {
        return Err(StreamError::RowOverflow(*pos, width).into());
    }
    Ok(())
}
