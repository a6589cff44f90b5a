//! GIF decoding.
//!
//! Only the first image of a file is decoded. Its indices are written as
//! they are into 4 and 8 bit buffers (quantized when the colour table does
//! not fit), resolved through the table for 24 bit buffers, and reduced to
//! "nonzero is white" for bilevel buffers.

use std::io::{self, Read};

use crate::convert::{gray_ramp, RowConverter, SourceFormat, SourceRow};
use crate::decoder::stream::{ByteOrder, EndianReader, SmartReader};
use crate::decoder::Limits;
use crate::error::{DirectoryError, ImageError, ImageResult, StreamError};
use crate::lzw::LzwDecoder;
use crate::pixel::{BitDepth, ColorTable, PixelBuffer, Rgb};

const IMAGE_DESCRIPTOR: u8 = 0x2C;
const EXTENSION: u8 = 0x21;
const TRAILER: u8 = 0x3B;

const TABLE_FLAG: u8 = 0x80;
const INTERLACE_FLAG: u8 = 0x40;

/// Start row and row step of the four interlace passes.
const INTERLACE_PASSES: [(u32, u32); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

#[derive(Clone, Debug)]
struct ImageDescriptor {
    left: u16,
    top: u16,
    width: u16,
    height: u16,
    flags: u8,
    table: Option<ColorTable>,
    /// Offset of the minimum code size byte.
    data: u64,
}

/// Decoder over a complete GIF file.
#[derive(Debug)]
pub struct GifDecoder<'a> {
    data: &'a [u8],
    screen_width: u16,
    screen_height: u16,
    flags: u8,
    global_table: Option<ColorTable>,
    image: ImageDescriptor,
    limits: Limits,
}

fn truncated(_: io::Error) -> ImageError {
    DirectoryError::TruncatedHeader.into()
}

fn unexpected_eof(_: io::Error) -> ImageError {
    StreamError::UnexpectedEof.into()
}

/// Read a colour table if `flags` announce one.
fn read_table<R: Read>(reader: &mut R, flags: u8) -> io::Result<Option<ColorTable>> {
    if flags & TABLE_FLAG == 0 {
        return Ok(None);
    }
    let entries = 1usize << ((flags & 7) + 1);
    let mut raw = vec![0u8; entries * 3];
    reader.read_exact(&mut raw)?;
    let colors = raw
        .chunks_exact(3)
        .map(|c| Rgb::new(c[0], c[1], c[2]))
        .collect();
    Ok(Some(ColorTable::new(colors)))
}

/// Feed each length prefixed sub-block to `sink` up to the empty block.
fn read_sub_blocks<R: Read>(reader: &mut R, mut sink: impl FnMut(&[u8])) -> io::Result<()> {
    let mut block = [0u8; 255];
    loop {
        let mut len = [0u8];
        reader.read_exact(&mut len)?;
        if len[0] == 0 {
            return Ok(());
        }
        let block = &mut block[..usize::from(len[0])];
        reader.read_exact(block)?;
        sink(block);
    }
}

/// Destination rows in the order the image data delivers them.
fn row_order(height: u32, interlaced: bool) -> Vec<u32> {
    if interlaced {
        INTERLACE_PASSES
            .iter()
            .flat_map(|&(start, step)| (start..height).step_by(step as usize))
            .collect()
    } else {
        (0..height).collect()
    }
}

impl<'a> GifDecoder<'a> {
    /// Parse the screen descriptor and locate the first image.
    pub fn new(data: &'a [u8]) -> ImageResult<GifDecoder<'a>> {
        if !data.starts_with(b"GIF") {
            return Err(ImageError::UnsupportedFormat);
        }
        let mut reader = SmartReader::over(data, ByteOrder::LittleEndian);
        let mut signature = [0u8; 6];
        reader.read_exact(&mut signature).map_err(truncated)?;
        let screen_width = reader.read_u16().map_err(truncated)?;
        let screen_height = reader.read_u16().map_err(truncated)?;
        let flags = reader.read_u8().map_err(truncated)?;
        // background colour index, pixel aspect ratio
        let mut unused = [0u8; 2];
        reader.read_exact(&mut unused).map_err(truncated)?;
        let global_table = read_table(&mut reader, flags).map_err(truncated)?;

        let image = loop {
            match reader.read_u8().map_err(truncated)? {
                IMAGE_DESCRIPTOR => {
                    let left = reader.read_u16().map_err(truncated)?;
                    let top = reader.read_u16().map_err(truncated)?;
                    let width = reader.read_u16().map_err(truncated)?;
                    let height = reader.read_u16().map_err(truncated)?;
                    let flags = reader.read_u8().map_err(truncated)?;
                    let table = read_table(&mut reader, flags).map_err(truncated)?;
                    break ImageDescriptor {
                        left,
                        top,
                        width,
                        height,
                        flags,
                        table,
                        data: reader.position(),
                    };
                }
                EXTENSION => {
                    let label = reader.read_u8().map_err(truncated)?;
                    log::trace!("skipping extension {:#04x}", label);
                    read_sub_blocks(&mut reader, |_| {}).map_err(truncated)?;
                }
                TRAILER => return Err(DirectoryError::NoImage.into()),
                other => return Err(DirectoryError::UnknownBlock(other).into()),
            }
        };

        log::debug!(
            "GIF screen {}x{}, first image {}x{} at ({}, {})",
            screen_width,
            screen_height,
            image.width,
            image.height,
            image.left,
            image.top
        );

        Ok(GifDecoder {
            data,
            screen_width,
            screen_height,
            flags,
            global_table,
            image,
            limits: Limits::default(),
        })
    }

    pub fn with_limits(mut self, limits: Limits) -> GifDecoder<'a> {
        self.limits = limits;
        self
    }

    /// Size of the first image.
    pub fn dimensions(&self) -> (u32, u32) {
        (u32::from(self.image.width), u32::from(self.image.height))
    }

    /// Size of the logical screen the images are placed on.
    pub fn screen_dimensions(&self) -> (u32, u32) {
        (u32::from(self.screen_width), u32::from(self.screen_height))
    }

    /// Colour resolution announced by the screen descriptor.
    pub fn bits_per_pixel(&self) -> u32 {
        u32::from(self.flags & 7) + 1
    }

    pub fn is_interlaced(&self) -> bool {
        self.image.flags & INTERLACE_FLAG != 0
    }

    /// The local table of the first image, else the global one.
    pub fn color_table(&self) -> Option<&ColorTable> {
        self.image.table.as_ref().or(self.global_table.as_ref())
    }

    /// Decode the first image into a buffer of `depth` bits per pixel.
    pub fn decode(&self, depth: BitDepth) -> ImageResult<PixelBuffer> {
        let (width, height) = self.dimensions();
        // Both the index stream and the output buffer must fit the limit.
        let size = depth
            .stride(width)
            .checked_mul(height as usize)
            .ok_or(ImageError::LimitsExceeded)?;
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or(ImageError::LimitsExceeded)?;
        if size.max(expected) > self.limits.decoding_buffer_size {
            return Err(ImageError::LimitsExceeded);
        }
        let mut buffer = PixelBuffer::new(width, height, depth)?;
        let width = width as usize;

        let mut reader = SmartReader::over(self.data, ByteOrder::LittleEndian);
        reader.goto_offset(self.image.data).map_err(unexpected_eof)?;
        let min_code_size = reader.read_u8().map_err(unexpected_eof)?;
        let mut compressed = Vec::new();
        read_sub_blocks(&mut reader, |block| compressed.extend_from_slice(block))
            .map_err(unexpected_eof)?;

        let indices = LzwDecoder::gif(min_code_size).decode(&compressed, expected)?;
        if indices.len() < expected {
            log::debug!("GIF data holds {} of {} pixels", indices.len(), expected);
            return Err(StreamError::UnexpectedEof.into());
        }

        let source = match depth {
            BitDepth::One => SourceFormat::Bilevel,
            _ => SourceFormat::Indexed {
                bits: 8,
                table: self
                    .color_table()
                    .cloned()
                    .unwrap_or_else(|| gray_ramp(8, false)),
                gray: false,
            },
        };
        let mut converter = RowConverter::new(&source, width as u32, depth);
        let mut bits = vec![0u8; width.div_ceil(8)];

        let rows = row_order(height, self.is_interlaced());
        for (samples, &y) in indices.chunks_exact(width.max(1)).zip(rows.iter()) {
            let row = match source {
                SourceFormat::Bilevel => {
                    bits.fill(0);
                    for (x, &index) in samples.iter().enumerate() {
                        if index != 0 {
                            bits[x / 8] |= 0x80 >> (x % 8);
                        }
                    }
                    SourceRow::Bilevel(&bits)
                }
                _ => SourceRow::Indexed { samples, bits: 8 },
            };
            converter.convert_row(row, buffer.row_mut(y));
        }

        if let Some(palette) = converter.palette() {
            buffer.set_palette(palette.clone());
        }
        Ok(buffer)
    }
}
