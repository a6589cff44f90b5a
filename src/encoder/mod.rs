//! TIFF encoding of pixel buffers.

use std::collections::BTreeMap;
use std::io::{Seek, Write};
use std::mem;

use crate::decoder::predictor::hpredict;
use crate::error::{ImageError, ImageResult};
use crate::pixel::{BitDepth, PixelBuffer};
use crate::tags::{
    PhotometricInterpretation, Predictor, ResolutionUnit, Tag, T4_OPTION_2D,
};
use crate::{CompressionScheme, Polarity, Resolution};

pub mod compression;
mod tiff_value;
mod writer;

use self::compression::{CompressionAlgorithm, Compressor};
pub use self::tiff_value::{Rational, TiffValue};
use self::writer::TiffWriter;

/// Rows of a fax strip add up to at most this many bytes.
const FAX_STRIP_BYTES: usize = 65536;

/// Per-image encoding configuration.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    /// Overrides the default scheme of the buffer depth.
    pub compression: Option<CompressionScheme>,
    /// Target size of one uncompressed strip in bytes.
    pub strip_size: usize,
    /// Written in inches; absent means a bare 1:1 ratio.
    pub resolution: Option<Resolution>,
    pub polarity: Polarity,
    /// Every `k_factor`-th row of a Group 3 2-D image is coded 1-D.
    pub k_factor: u32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            compression: None,
            strip_size: 8 * 1024,
            resolution: None,
            polarity: Polarity::Standard,
            k_factor: 4,
        }
    }
}

impl EncodeOptions {
    /// The scheme used for a buffer of `depth` bits per pixel.
    pub fn scheme_for(&self, depth: BitDepth) -> CompressionScheme {
        self.compression.unwrap_or(match depth {
            BitDepth::One => CompressionScheme::CcittGroup4,
            _ => CompressionScheme::None,
        })
    }
}

/// Tiff encoder.
///
/// Every written image appends one directory to the chain.
///
/// # Examples
/// ```
/// use pixcodec::encoder::TiffEncoder;
/// use pixcodec::{BitDepth, PixelBuffer};
/// use std::io::Cursor;
///
/// let page = PixelBuffer::new(100, 100, BitDepth::One).unwrap();
/// let mut file = Cursor::new(Vec::new());
/// let mut tiff = TiffEncoder::new(&mut file).unwrap();
/// tiff.write_image(&page).unwrap();
/// ```
#[derive(Debug)]
pub struct TiffEncoder<W> {
    writer: TiffWriter<W>,
}

impl<W: Write + Seek> TiffEncoder<W> {
    pub fn new(writer: W) -> ImageResult<TiffEncoder<W>> {
        let mut encoder = TiffEncoder {
            writer: TiffWriter::new(writer),
        };

        encoder.writer.write_header()?;
        // blank the IFD offset location
        encoder.writer.write_u32(0)?;

        Ok(encoder)
    }

    /// Write `buffer` with the default options of its depth.
    pub fn write_image(&mut self, buffer: &PixelBuffer) -> ImageResult<()> {
        self.write_image_with(buffer, &EncodeOptions::default())
    }

    pub fn write_image_with(
        &mut self,
        buffer: &PixelBuffer,
        options: &EncodeOptions,
    ) -> ImageResult<()> {
        let (width, height) = buffer.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageError::UnsupportedVariant("empty image".into()));
        }
        let depth = buffer.depth();
        let scheme = options.scheme_for(depth);
        let predicted = scheme
            == CompressionScheme::Lzw {
                predictor: Predictor::Horizontal,
            };
        let byte_samples = matches!(depth, BitDepth::Eight | BitDepth::TwentyFour);
        if (scheme.fax_scheme().is_some() && depth != BitDepth::One)
            || (predicted && !byte_samples)
        {
            return Err(ImageError::UnsupportedVariant(format!(
                "{:?} for {} bits per pixel",
                scheme,
                depth.bits()
            )));
        }

        let mut ctx = EncodeContext::new(buffer, scheme, options)?;
        let mut encoder = DirectoryEncoder::new(&mut self.writer)?;

        let mut y = 0;
        while y < height {
            let rows = ctx.rows_per_strip.min(height - y);
            ctx.fill_strip(buffer, y, rows);
            encoder.write_strip(&mut ctx)?;
            y += rows;
        }

        encoder.write_tag(Tag::ImageWidth, width);
        encoder.write_tag(Tag::ImageLength, height);
        encoder.write_tag(Tag::Compression, scheme.compression_method().to_u16());
        match depth {
            BitDepth::TwentyFour => {
                encoder.write_tag(Tag::BitsPerSample, &[8u16, 8, 8][..]);
                encoder.write_tag(Tag::SamplesPerPixel, 3u16);
                encoder.write_tag(
                    Tag::PhotometricInterpretation,
                    PhotometricInterpretation::RGB.to_u16(),
                );
            }
            BitDepth::One => {
                encoder.write_tag(Tag::BitsPerSample, 1u16);
                encoder.write_tag(Tag::SamplesPerPixel, 1u16);
                encoder.write_tag(
                    Tag::PhotometricInterpretation,
                    PhotometricInterpretation::WhiteIsZero.to_u16(),
                );
            }
            BitDepth::Four | BitDepth::Eight => {
                encoder.write_tag(Tag::BitsPerSample, depth.bits() as u16);
                encoder.write_tag(Tag::SamplesPerPixel, 1u16);
                encoder.write_tag(
                    Tag::PhotometricInterpretation,
                    PhotometricInterpretation::RGBPalette.to_u16(),
                );
                encoder.write_tag(Tag::ColorMap, &color_map(buffer)[..]);
            }
        }
        match scheme {
            CompressionScheme::CcittGroup3_1D => encoder.write_tag(Tag::T4Options, 0u32),
            CompressionScheme::CcittGroup3_2D => encoder.write_tag(Tag::T4Options, T4_OPTION_2D),
            CompressionScheme::CcittGroup4 => encoder.write_tag(Tag::T6Options, 0u32),
            CompressionScheme::Lzw {
                predictor: Predictor::Horizontal,
            } => encoder.write_tag(Tag::Predictor, Predictor::Horizontal.to_u16()),
            _ => {}
        }
        encoder.write_tag(Tag::RowsPerStrip, ctx.rows_per_strip);
        encoder.write_tag(Tag::StripOffsets, &ctx.strip_offsets[..]);
        encoder.write_tag(Tag::StripByteCounts, &ctx.strip_byte_counts[..]);

        match options.resolution {
            Some(resolution) => {
                encoder.write_tag(Tag::XResolution, Rational { n: resolution.x, d: 1 });
                encoder.write_tag(Tag::YResolution, Rational { n: resolution.y, d: 1 });
                encoder.write_tag(Tag::ResolutionUnit, ResolutionUnit::Inch.to_u16());
            }
            None => {
                encoder.write_tag(Tag::XResolution, Rational { n: 1, d: 1 });
                encoder.write_tag(Tag::YResolution, Rational { n: 1, d: 1 });
                encoder.write_tag(Tag::ResolutionUnit, ResolutionUnit::None.to_u16());
            }
        }

        log::debug!(
            "wrote {}x{} image, {:?}, {} strips",
            width,
            height,
            scheme,
            ctx.strip_offsets.len()
        );
        encoder.finish()
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

/// Palette entries widened to 16 bits, padded to the full table of the depth.
fn color_map(buffer: &PixelBuffer) -> Vec<u16> {
    let size = buffer.depth().palette_size();
    let mut map = vec![0u16; size * 3];
    if let Some(table) = buffer.palette() {
        for (i, color) in table.entries().iter().take(size).enumerate() {
            map[i] = u16::from(color.r) * 257;
            map[size + i] = u16::from(color.g) * 257;
            map[2 * size + i] = u16::from(color.b) * 257;
        }
    }
    map
}

/// Working state of one `write_image_with` call.
#[derive(Debug)]
pub struct EncodeContext {
    compressor: Compressor,
    predict: bool,
    invert: bool,
    samples: usize,
    row_bytes: usize,
    rows_per_strip: u32,
    strip: Vec<u8>,
    strip_offsets: Vec<u32>,
    strip_byte_counts: Vec<u32>,
}

impl EncodeContext {
    fn new(
        buffer: &PixelBuffer,
        scheme: CompressionScheme,
        options: &EncodeOptions,
    ) -> ImageResult<EncodeContext> {
        let depth = buffer.depth();
        let row_bytes = depth.packed_row_bytes(buffer.width());
        let target = if scheme.fax_scheme().is_some() {
            FAX_STRIP_BYTES
        } else {
            options.strip_size
        };
        let rows_per_strip = (target / row_bytes.max(1)).clamp(1, buffer.height() as usize) as u32;

        Ok(EncodeContext {
            compressor: Compressor::new(scheme, buffer.width(), options.k_factor)?,
            predict: scheme
                == CompressionScheme::Lzw {
                    predictor: Predictor::Horizontal,
                },
            // Bilevel buffers hold 1 as white, min-is-white samples 1 as black.
            invert: depth == BitDepth::One && options.polarity == Polarity::Standard,
            samples: if depth == BitDepth::TwentyFour { 3 } else { 1 },
            row_bytes,
            rows_per_strip,
            strip: Vec::with_capacity(row_bytes * rows_per_strip as usize),
            strip_offsets: Vec::new(),
            strip_byte_counts: Vec::new(),
        })
    }

    /// Gather `rows` rows starting at `y` without their padding.
    fn fill_strip(&mut self, buffer: &PixelBuffer, y: u32, rows: u32) {
        self.strip.clear();
        for row in y..y + rows {
            let data = &buffer.row(row)[..self.row_bytes];
            if self.invert {
                self.strip.extend(data.iter().map(|b| !b));
            } else {
                self.strip.extend_from_slice(data);
            }
        }
        if self.predict {
            hpredict(&mut self.strip, self.row_bytes, self.samples);
        }
    }
}

/// Low level interface to encode ifd directories.
///
/// You should call `finish` on this when you are finished with it.
/// Encoding can silently fail while this is dropping.
#[derive(Debug)]
pub struct DirectoryEncoder<'a, W: 'a + Write + Seek> {
    writer: &'a mut TiffWriter<W>,
    dropped: bool,
    // We use BTreeMap to make sure tags are written in correct order
    ifd_pointer_pos: u64,
    ifd: BTreeMap<u16, (u16, u32, Vec<u8>)>,
}

impl<'a, W: 'a + Write + Seek> DirectoryEncoder<'a, W> {
    fn new(writer: &'a mut TiffWriter<W>) -> ImageResult<DirectoryEncoder<'a, W>> {
        // the previous word is the IFD offset position
        let ifd_pointer_pos = writer.offset() - mem::size_of::<u32>() as u64;
        writer.pad_word_boundary()?;
        Ok(DirectoryEncoder {
            writer,
            dropped: false,
            ifd_pointer_pos,
            ifd: BTreeMap::new(),
        })
    }

    /// Write a single ifd tag.
    pub fn write_tag<T: TiffValue>(&mut self, tag: Tag, value: T) {
        let mut bytes = Vec::with_capacity(value.bytes() as usize);
        {
            let mut writer = TiffWriter::new(&mut bytes);
            // Writing into a vector cannot fail.
            let _ = value.write(&mut writer);
        }

        self.ifd
            .insert(tag.to_u16(), (<T>::FIELD_TYPE.to_u16(), value.count(), bytes));
    }

    /// Compress the strip held by `ctx` and record its offset and size.
    fn write_strip(&mut self, ctx: &mut EncodeContext) -> ImageResult<()> {
        let offset = file_offset(self.writer.offset())?;
        let count = ctx.compressor.write_to(self.writer, &ctx.strip)?;
        ctx.strip_offsets.push(offset);
        ctx.strip_byte_counts
            .push(u32::try_from(count).map_err(|_| ImageError::LimitsExceeded)?);
        Ok(())
    }

    fn write_directory(&mut self) -> ImageResult<u64> {
        // Start by writing out all values
        for (_, _, bytes) in self.ifd.values_mut() {
            if bytes.len() > 4 {
                let offset = file_offset(self.writer.offset())?;
                self.writer.write_bytes(bytes)?;
                *bytes = offset.to_le_bytes().to_vec();
            } else {
                bytes.resize(4, 0);
            }
        }

        self.writer.pad_word_boundary()?;
        let offset = self.writer.offset();

        self.writer.write_u16(self.ifd.len() as u16)?;
        for (tag, (field_type, count, offset)) in self.ifd.iter() {
            self.writer.write_u16(*tag)?;
            self.writer.write_u16(*field_type)?;
            self.writer.write_u32(*count)?;
            self.writer.write_bytes(offset)?;
        }

        Ok(offset)
    }

    fn finish_internal(&mut self) -> ImageResult<()> {
        let ifd_pointer = file_offset(self.write_directory()?)?;
        let curr_pos = self.writer.offset();

        self.writer.goto_offset(self.ifd_pointer_pos)?;
        self.writer.write_u32(ifd_pointer)?;
        self.writer.goto_offset(curr_pos)?;
        self.writer.write_u32(0)?;

        self.dropped = true;

        Ok(())
    }

    /// Write out the ifd directory.
    pub fn finish(mut self) -> ImageResult<()> {
        self.finish_internal()
    }
}

impl<'a, W: Write + Seek> Drop for DirectoryEncoder<'a, W> {
    fn drop(&mut self) {
        if !self.dropped {
            let _ = self.finish_internal();
        }
    }
}

fn file_offset(offset: u64) -> ImageResult<u32> {
    u32::try_from(offset).map_err(|_| ImageError::LimitsExceeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use std::io::Cursor;

    fn encode(buffer: &PixelBuffer, options: &EncodeOptions) -> Vec<u8> {
        let mut file = Cursor::new(Vec::new());
        TiffEncoder::new(&mut file)
            .unwrap()
            .write_image_with(buffer, options)
            .unwrap();
        file.into_inner()
    }

    #[test]
    fn header_and_directory_layout() {
        let buffer = PixelBuffer::new(16, 4, BitDepth::Eight).unwrap();
        let data = encode(&buffer, &EncodeOptions::default());
        assert_eq!(&data[..4], b"II*\0");
        let ifd = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        assert_eq!(ifd % 4, 0);
        // Directory ends with a zero next pointer.
        let entries = u16::from_le_bytes([data[ifd], data[ifd + 1]]) as usize;
        let next = ifd + 2 + 12 * entries;
        assert_eq!(&data[next..next + 4], &[0, 0, 0, 0]);
        assert_eq!(data.len(), next + 4);
    }

    #[test]
    fn strips_follow_the_target_size() {
        let buffer = PixelBuffer::new(100, 50, BitDepth::TwentyFour).unwrap();
        let mut options = EncodeOptions::default();
        options.strip_size = 1000;
        let data = encode(&buffer, &options);
        let decoder = Decoder::new(&data).unwrap();
        // 300 bytes per row: three rows per strip.
        assert_eq!(decoder.get_tag_u32(Tag::RowsPerStrip).unwrap(), 3);
        assert_eq!(decoder.strip_count(), 17);
    }

    #[test]
    fn fax_needs_a_bilevel_buffer() {
        let buffer = PixelBuffer::new(8, 8, BitDepth::Eight).unwrap();
        let mut options = EncodeOptions::default();
        options.compression = Some(CompressionScheme::CcittGroup4);
        let mut file = Cursor::new(Vec::new());
        let err = TiffEncoder::new(&mut file)
            .unwrap()
            .write_image_with(&buffer, &options)
            .unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedVariant(_)));
    }

    #[test]
    fn bilevel_defaults_to_group4() {
        let mut buffer = PixelBuffer::new(40, 3, BitDepth::One).unwrap();
        buffer.set_pixel(3, 1, 1);
        let data = encode(&buffer, &EncodeOptions::default());
        let mut decoder = Decoder::new(&data).unwrap();
        assert_eq!(decoder.compression(), CompressionScheme::CcittGroup4);
        assert_eq!(
            decoder.photometric_interpretation(),
            PhotometricInterpretation::WhiteIsZero
        );
        assert_eq!(decoder.read_image(BitDepth::One).unwrap(), buffer);
    }
}
