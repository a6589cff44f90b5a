//! TIFF decoding from an in-memory file.
//!
//! ```no_run
//! use pixcodec::decoder::Decoder;
//! use pixcodec::BitDepth;
//!
//! # fn main() -> pixcodec::ImageResult<()> {
//! let data = std::fs::read("page.tif")?;
//! let mut decoder = Decoder::new(&data)?;
//! for index in 0..decoder.image_count()? {
//!     decoder.seek_to_image(index)?;
//!     let page = decoder.read_image(BitDepth::One)?;
//!     println!("{:?}", page.dimensions());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::io::{Cursor, Read};

use crate::convert::color_map_to_table;
use crate::error::{DirectoryError, ImageError, ImageResult};
use crate::pixel::{BitDepth, PixelBuffer};
use crate::tags::{
    CompressionMethod, FillOrder, PhotometricInterpretation, ResolutionUnit, Tag, Type,
};
use crate::{CompressionScheme, Polarity, Resolution};

use self::ifd::{Directory, Entry, Value};
use self::image::{decode_strips, DecodeContext, ImageLayout};
use self::stream::{ByteOrder, EndianReader, SmartReader};

pub mod ifd;
mod image;
pub mod predictor;
pub mod stream;

/// Decoding limits
#[derive(Clone, Debug)]
pub struct Limits {
    /// The maximum size of a decoded image or of one decompressed strip in
    /// bytes, the default is 256MiB.
    pub decoding_buffer_size: usize,
    /// The maximum size of any ifd value in bytes, the default is
    /// 1MiB.
    pub ifd_value_size: usize,
    /// The maximum number of strips of one image, the default is 65536.
    pub max_strips: usize,
    /// The maximum image height, the default is 1048576 rows.
    pub max_rows: u32,
    /// The maximum length of the directory chain, the default is 4096.
    pub max_images: usize,
    /// Propagate errors inside fax strips instead of keeping the rows
    /// decoded before them.
    pub strict_fax: bool,
    /// The purpose of this is to prevent all the fields of the struct from
    /// being public, as this would make adding new fields a major version
    /// bump.
    _non_exhaustive: (),
}

impl Limits {
    /// A configuration that does not impose any limits.
    ///
    /// This is a good start if the caller only wants to impose selective limits, contrary to the
    /// default limits which allows selectively disabling limits.
    ///
    /// Note that this configuration is likely to crash on excessively large images since,
    /// naturally, the machine running the program does not have infinite memory.
    pub fn unlimited() -> Limits {
        Limits {
            decoding_buffer_size: usize::MAX,
            ifd_value_size: usize::MAX,
            max_strips: usize::MAX,
            max_rows: u32::MAX,
            max_images: usize::MAX,
            strict_fax: false,
            _non_exhaustive: (),
        }
    }
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            decoding_buffer_size: 256 * 1024 * 1024,
            ifd_value_size: 1024 * 1024,
            max_strips: 65536,
            max_rows: 1 << 20,
            max_images: 4096,
            strict_fax: false,
            _non_exhaustive: (),
        }
    }
}

/// Per-call decoding configuration.
#[derive(Clone, Debug, Default)]
pub struct DecodeOptions {
    pub limits: Limits,
    pub polarity: Polarity,
    /// The image selected on creation.
    pub image_index: usize,
}

/// The representation of a TIFF decoder
///
/// The whole file is held in memory. One image of the directory chain is
/// current at any time.
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    reader: SmartReader<Cursor<&'a [u8]>>,
    byte_order: ByteOrder,
    options: DecodeOptions,
    first_ifd: Option<u32>,
    current: usize,
    ifd: Directory,
    image: ImageLayout,
}

impl<'a> Decoder<'a> {
    /// Create a new decoder positioned at the first image of `data`
    pub fn new(data: &'a [u8]) -> ImageResult<Decoder<'a>> {
        Decoder::with_options(data, DecodeOptions::default())
    }

    pub fn with_options(data: &'a [u8], options: DecodeOptions) -> ImageResult<Decoder<'a>> {
        let mut decoder = Decoder {
            data,
            reader: SmartReader::over(data, ByteOrder::LittleEndian),
            byte_order: ByteOrder::LittleEndian,
            options,
            first_ifd: None,
            current: 0,
            ifd: Directory::empty(),
            image: ImageLayout {
                width: 0,
                height: 0,
                bits_per_sample: 1,
                samples: 1,
                compression: CompressionScheme::None,
                photometric_interpretation: PhotometricInterpretation::WhiteIsZero,
                fill_order: FillOrder::MsbFirst,
                rows_per_strip: u32::MAX,
                strip_offsets: Vec::new(),
                strip_byte_counts: None,
                fax_options: 0,
                color_map: None,
                resolution: None,
            },
        };
        decoder.read_header()?;
        decoder.seek_to_image(decoder.options.image_index)?;
        Ok(decoder)
    }

    pub fn with_limits(mut self, limits: Limits) -> Decoder<'a> {
        self.options.limits = limits;
        self
    }

    fn read_header(&mut self) -> ImageResult<()> {
        let mut endianess = Vec::with_capacity(2);
        self.reader
            .by_ref()
            .take(2)
            .read_to_end(&mut endianess)?;
        self.byte_order = match &*endianess {
            b"II" => ByteOrder::LittleEndian,
            b"MM" => ByteOrder::BigEndian,
            [_, _] => return Err(DirectoryError::InvalidByteOrder.into()),
            _ => return Err(DirectoryError::TruncatedHeader.into()),
        };
        self.reader.byte_order = self.byte_order;

        let version = self
            .reader
            .read_u16()
            .map_err(|_| DirectoryError::TruncatedHeader)?;
        match version {
            42 => {}
            43 => return Err(ImageError::UnsupportedVariant("BigTIFF".into())),
            _ => return Err(DirectoryError::InvalidVersion(version).into()),
        }
        self.first_ifd = match self
            .reader
            .read_u32()
            .map_err(|_| DirectoryError::TruncatedHeader)?
        {
            0 => None,
            n => Some(n),
        };
        Ok(())
    }

    /// Returns the byte_order
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Index of the current image in the directory chain.
    pub fn current_image(&self) -> usize {
        self.current
    }

    /// Number of images in the directory chain.
    pub fn image_count(&mut self) -> ImageResult<usize> {
        Ok(self.ifd_offsets(None)?.len())
    }

    /// Make image `index` current.
    pub fn seek_to_image(&mut self, index: usize) -> ImageResult<()> {
        let offsets = self.ifd_offsets(Some(index + 1))?;
        let offset = *offsets
            .get(index)
            .ok_or(DirectoryError::ImageIndexOutOfRange(index))?;
        self.ifd = self.read_ifd(offset)?;
        self.image = self.read_layout()?;
        self.current = index;
        log::debug!(
            "image {}: {}x{}, {} bpp, {:?}, {} strips",
            index,
            self.image.width,
            self.image.height,
            self.image.bits_per_pixel(),
            self.image.compression,
            self.image.strip_count()
        );
        Ok(())
    }

    /// Walk the directory chain, stopping after `wanted` directories.
    fn ifd_offsets(&mut self, wanted: Option<usize>) -> ImageResult<Vec<u32>> {
        let mut seen = HashSet::new();
        let mut offsets = Vec::new();
        let mut next = self.first_ifd;

        while let Some(offset) = next {
            if wanted == Some(offsets.len()) {
                break;
            }
            if offsets.len() >= self.options.limits.max_images {
                return Err(ImageError::LimitsExceeded);
            }
            if !seen.insert(offset) {
                return Err(DirectoryError::CycleInOffsets.into());
            }
            offsets.push(offset);

            self.goto_offset(offset)?;
            let num_tags = self.read_short()?;
            self.goto_offset(u64::from(offset) + 2 + 12 * u64::from(num_tags))?;
            next = match self.read_long()? {
                0 => None,
                n => Some(n),
            };
        }

        if offsets.is_empty() {
            return Err(DirectoryError::NoImage.into());
        }
        Ok(offsets)
    }

    fn goto_offset<O: Into<u64>>(&mut self, offset: O) -> ImageResult<()> {
        let offset = offset.into();
        if offset > self.data.len() as u64 {
            return Err(DirectoryError::OffsetOutOfBounds(offset).into());
        }
        self.reader.goto_offset(offset)?;
        Ok(())
    }

    fn read_short(&mut self) -> ImageResult<u16> {
        let position = self.reader.position();
        self.reader
            .read_u16()
            .map_err(|_| DirectoryError::OffsetOutOfBounds(position).into())
    }

    fn read_long(&mut self) -> ImageResult<u32> {
        let position = self.reader.position();
        self.reader
            .read_u32()
            .map_err(|_| DirectoryError::OffsetOutOfBounds(position).into())
    }

    fn read_offset(&mut self) -> ImageResult<[u8; 4]> {
        let position = self.reader.position();
        let mut val = [0; 4];
        self.reader
            .read_exact(&mut val)
            .map_err(|_| DirectoryError::OffsetOutOfBounds(position))?;
        Ok(val)
    }

    //
    // Tag   2 bytes
    // Type  2 bytes
    // Count 4 bytes
    // Value 4 bytes either a pointer the value itself
    fn read_entry(&mut self) -> ImageResult<Option<(Tag, Entry)>> {
        let tag = Tag::from_u16_exhaustive(self.read_short()?);
        let type_ = match Type::from_u16(self.read_short()?) {
            Some(t) => t,
            None => {
                // Unknown type. Readers skip such entries.
                self.read_long()?;
                self.read_long()?;
                return Ok(None);
            }
        };
        let entry = Entry::new(type_, self.read_long()?, self.read_offset()?);
        Ok(Some((tag, entry)))
    }

    fn read_ifd(&mut self, offset: u32) -> ImageResult<Directory> {
        let mut dir = Directory::empty();
        self.goto_offset(offset)?;
        let num_tags = self.read_short()?;
        for _ in 0..num_tags {
            match self.read_entry()? {
                Some((tag, entry)) => dir.insert(tag, entry),
                None => log::warn!("skipping a directory entry of unknown type"),
            }
        }
        dir.next_ifd = match self.read_long()? {
            0 => None,
            n => Some(n),
        };
        Ok(dir)
    }

    fn read_layout(&self) -> ImageResult<ImageLayout> {
        let limits = &self.options.limits;
        let width = self.get_tag_u32(Tag::ImageWidth)?;
        let height = self.get_tag_u32(Tag::ImageLength)?;
        if width == 0 {
            return Err(DirectoryError::InvalidValue(Tag::ImageWidth).into());
        }
        if height == 0 {
            return Err(DirectoryError::InvalidValue(Tag::ImageLength).into());
        }
        if height > limits.max_rows {
            return Err(ImageError::LimitsExceeded);
        }

        if self.ifd.contains(Tag::TileWidth) {
            return Err(ImageError::UnsupportedVariant("tiled image".into()));
        }
        let samples = self.find_tag_u16(Tag::SamplesPerPixel)?.unwrap_or(1);
        if samples > 1 && self.find_tag_u16(Tag::PlanarConfiguration)? == Some(2) {
            return Err(ImageError::UnsupportedVariant("planar configuration".into()));
        }
        let bits_per_sample = match self.find_tag(Tag::BitsPerSample)? {
            Some(value) => value
                .into_u16_vec()
                .and_then(|bits| bits.first().copied())
                .ok_or(DirectoryError::UnexpectedType(Tag::BitsPerSample))?,
            None => 1,
        };

        let method = self.find_tag_u16(Tag::Compression)?.unwrap_or(1);
        let fax_options = match CompressionMethod::from_u16_exhaustive(method) {
            CompressionMethod::Fax3 => self.find_tag_u32(Tag::T4Options)?.unwrap_or(0),
            CompressionMethod::Fax4 => self.find_tag_u32(Tag::T6Options)?.unwrap_or(0),
            _ => 0,
        };
        let predictor = self.find_tag_u16(Tag::Predictor)?.unwrap_or(1);
        let compression = CompressionScheme::from_tags(method, fax_options, predictor)?;

        let photometric_interpretation = self
            .find_tag_u16(Tag::PhotometricInterpretation)?
            .map(PhotometricInterpretation::from_u16_exhaustive)
            .unwrap_or(PhotometricInterpretation::WhiteIsZero);
        let fill_order = match self.find_tag_u16(Tag::FillOrder)? {
            None => FillOrder::MsbFirst,
            Some(value) => FillOrder::from_u16(value).unwrap_or_else(|| {
                log::warn!("ignoring fill order {}", value);
                FillOrder::MsbFirst
            }),
        };
        let rows_per_strip = match self.find_tag_u32(Tag::RowsPerStrip)? {
            Some(0) | None => height,
            Some(rows) => rows.min(height),
        };

        let strip_entries = self
            .ifd
            .get(Tag::StripOffsets)
            .ok_or(ImageError::MissingRequiredTag(Tag::StripOffsets))?;
        if strip_entries.count() as usize > limits.max_strips {
            return Err(ImageError::LimitsExceeded);
        }
        let strip_offsets = self.get_tag_u32_vec(Tag::StripOffsets)?;
        let strip_byte_counts = match self.find_tag(Tag::StripByteCounts)? {
            Some(value) => {
                let counts = value
                    .into_u32_vec()
                    .ok_or(DirectoryError::UnexpectedType(Tag::StripByteCounts))?;
                if counts.len() != strip_offsets.len() {
                    return Err(DirectoryError::InconsistentStrips(
                        strip_offsets.len(),
                        counts.len(),
                    )
                    .into());
                }
                Some(counts)
            }
            None if strip_offsets.len() == 1 => None,
            None => return Err(ImageError::MissingRequiredTag(Tag::StripByteCounts)),
        };

        let color_map = match self.find_tag(Tag::ColorMap)? {
            Some(value) => Some(color_map_to_table(
                &value
                    .into_u16_vec()
                    .ok_or(DirectoryError::UnexpectedType(Tag::ColorMap))?,
            )),
            None => None,
        };

        Ok(ImageLayout {
            width,
            height,
            bits_per_sample,
            samples,
            compression,
            photometric_interpretation,
            fill_order,
            rows_per_strip,
            strip_offsets,
            strip_byte_counts,
            fax_options,
            color_map,
            resolution: self.read_resolution()?,
        })
    }

    fn read_resolution(&self) -> ImageResult<Option<Resolution>> {
        let density = |tag| -> ImageResult<u32> {
            Ok(match self.find_tag(tag)?.and_then(Value::into_rational) {
                Some((n, d)) if d != 0 => n / d,
                _ => 0,
            })
        };
        let x = density(Tag::XResolution)?;
        let y = density(Tag::YResolution)?;
        let unit = self
            .find_tag_u16(Tag::ResolutionUnit)?
            .and_then(ResolutionUnit::from_u16);
        Ok(Resolution::from_density(
            x,
            y,
            unit == Some(ResolutionUnit::Centimeter),
        ))
    }

    /// The directory of the current image.
    pub fn directory(&self) -> &Directory {
        &self.ifd
    }

    /// Tries to retrieve a tag.
    /// Return `Ok(None)` if the tag is not present.
    pub fn find_tag(&self, tag: Tag) -> ImageResult<Option<Value>> {
        match self.ifd.get(tag) {
            None => Ok(None),
            Some(entry) => Ok(Some(entry.val(
                &self.options.limits,
                self.data,
                self.byte_order,
            )?)),
        }
    }

    pub fn find_tag_u16(&self, tag: Tag) -> ImageResult<Option<u16>> {
        self.find_tag(tag)?
            .map(|v| v.into_u16().ok_or(DirectoryError::UnexpectedType(tag).into()))
            .transpose()
    }

    pub fn find_tag_u32(&self, tag: Tag) -> ImageResult<Option<u32>> {
        self.find_tag(tag)?
            .map(|v| v.into_u32().ok_or(DirectoryError::UnexpectedType(tag).into()))
            .transpose()
    }

    /// Tries to retrieve a tag.
    /// Returns an error if the tag is not present
    pub fn get_tag(&self, tag: Tag) -> ImageResult<Value> {
        self.find_tag(tag)?
            .ok_or(ImageError::MissingRequiredTag(tag))
    }

    pub fn get_tag_u32(&self, tag: Tag) -> ImageResult<u32> {
        self.find_tag_u32(tag)?
            .ok_or(ImageError::MissingRequiredTag(tag))
    }

    pub fn get_tag_u32_vec(&self, tag: Tag) -> ImageResult<Vec<u32>> {
        self.get_tag(tag)?
            .into_u32_vec()
            .ok_or(DirectoryError::UnexpectedType(tag).into())
    }

    pub fn get_tag_ascii_string(&self, tag: Tag) -> ImageResult<String> {
        self.get_tag(tag)?
            .into_string()
            .ok_or(DirectoryError::UnexpectedType(tag).into())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width, self.image.height)
    }

    /// Bits per sample times samples per pixel.
    pub fn bits_per_pixel(&self) -> u32 {
        self.image.bits_per_pixel()
    }

    pub fn compression(&self) -> CompressionScheme {
        self.image.compression
    }

    pub fn photometric_interpretation(&self) -> PhotometricInterpretation {
        self.image.photometric_interpretation
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.image.resolution
    }

    pub fn strip_count(&self) -> usize {
        self.image.strip_count()
    }

    /// Decode the current image into a new buffer of `depth` bits per pixel.
    pub fn read_image(&mut self, depth: BitDepth) -> ImageResult<PixelBuffer> {
        let (width, height) = self.dimensions();
        let size = depth
            .stride(width)
            .checked_mul(height as usize)
            .ok_or(ImageError::LimitsExceeded)?;
        if size > self.options.limits.decoding_buffer_size {
            return Err(ImageError::LimitsExceeded);
        }
        let mut buffer = PixelBuffer::new(width, height, depth)?;
        self.decode_into(&mut buffer)?;
        Ok(buffer)
    }

    /// Decode the current image into `buffer`, converting to its depth.
    ///
    /// The buffer must be at least as large as the image. Rows of empty
    /// strips keep their previous contents.
    pub fn decode_into(&mut self, buffer: &mut PixelBuffer) -> ImageResult<()> {
        let (width, height) = self.dimensions();
        if buffer.width() < width || buffer.height() < height {
            let needed = buffer.depth().stride(width) * height as usize;
            return Err(ImageError::BufferTooSmall(needed, buffer.data().len()));
        }

        let mut ctx = DecodeContext::new(&self.image, buffer, self.options.polarity)?;
        if let Some(palette) = ctx.palette() {
            buffer.set_palette(palette.clone());
        }
        decode_strips(&self.image, self.data, &self.options.limits, &mut ctx, buffer)
    }
}
