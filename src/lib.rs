//! Raster image codecs decoding into fixed-depth pixel buffers
//!
//! TIFF (strips in none, PackBits, LZW and CCITT fax compression), GIF and
//! JPEG images are decoded into a [`PixelBuffer`] of 1, 4, 8 or 24 bits per
//! pixel whatever the source depth. TIFF images can be written back, and a
//! printable run-length transport form is provided for buffers.
//!
//! # Related Links
//! * <https://web.archive.org/web/20210108073850/https://www.adobe.io/open/standards/TIFF.html> - The TIFF specification
//! * <https://www.w3.org/Graphics/GIF/spec-gif89a.txt> - GIF 89a
//! * ITU-T T.4 and T.6 - Group 3 and Group 4 facsimile coding

pub mod bits;
pub mod convert;
pub mod decoder;
pub mod encoder;
mod error;
pub mod fax;
pub mod gif;
#[cfg(feature = "jpeg")]
pub mod jpeg;
pub mod lzw;
mod pixel;
pub mod rle;
pub mod tags;

pub use self::error::{DirectoryError, ImageError, ImageResult, StreamError};
pub use self::pixel::{BitDepth, ColorTable, PixelBuffer, Rgb};

use self::fax::FaxScheme;
use self::tags::{CompressionMethod, Predictor, T4_OPTION_2D};

/// Strip compression of a TIFF image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompressionScheme {
    None,
    PackBits,
    Lzw { predictor: Predictor },
    /// CCITT modified Huffman, compression 2.
    CcittRle,
    CcittGroup3_1D,
    CcittGroup3_2D,
    CcittGroup4,
}

impl CompressionScheme {
    /// Interpret the Compression tag together with T4Options and Predictor.
    pub fn from_tags(method: u16, t4_options: u32, predictor: u16) -> ImageResult<Self> {
        let scheme = match CompressionMethod::from_u16_exhaustive(method) {
            CompressionMethod::None => CompressionScheme::None,
            CompressionMethod::PackBits => CompressionScheme::PackBits,
            CompressionMethod::LZW => match Predictor::from_u16_exhaustive(predictor) {
                p @ (Predictor::None | Predictor::Horizontal) => {
                    CompressionScheme::Lzw { predictor: p }
                }
                _ => {
                    return Err(ImageError::UnsupportedVariant(format!(
                        "predictor {}",
                        predictor
                    )))
                }
            },
            CompressionMethod::Huffman => CompressionScheme::CcittRle,
            CompressionMethod::Fax3 if t4_options & T4_OPTION_2D != 0 => {
                CompressionScheme::CcittGroup3_2D
            }
            CompressionMethod::Fax3 => CompressionScheme::CcittGroup3_1D,
            CompressionMethod::Fax4 => CompressionScheme::CcittGroup4,
            _ => {
                return Err(ImageError::UnsupportedVariant(format!(
                    "compression {}",
                    method
                )))
            }
        };
        Ok(scheme)
    }

    /// The value of the Compression tag.
    pub fn compression_method(&self) -> CompressionMethod {
        match self {
            CompressionScheme::None => CompressionMethod::None,
            CompressionScheme::PackBits => CompressionMethod::PackBits,
            CompressionScheme::Lzw { .. } => CompressionMethod::LZW,
            CompressionScheme::CcittRle => CompressionMethod::Huffman,
            CompressionScheme::CcittGroup3_1D | CompressionScheme::CcittGroup3_2D => {
                CompressionMethod::Fax3
            }
            CompressionScheme::CcittGroup4 => CompressionMethod::Fax4,
        }
    }

    /// The row coding of fax schemes, `None` for the general purpose ones.
    pub fn fax_scheme(&self) -> Option<FaxScheme> {
        match self {
            CompressionScheme::None
            | CompressionScheme::PackBits
            | CompressionScheme::Lzw { .. } => None,
            CompressionScheme::CcittRle => Some(FaxScheme::Rle),
            CompressionScheme::CcittGroup3_1D => Some(FaxScheme::Group3_1D),
            CompressionScheme::CcittGroup3_2D => Some(FaxScheme::Group3_2D),
            CompressionScheme::CcittGroup4 => Some(FaxScheme::Group4),
        }
    }
}

/// Which photometric interpretation of bilevel TIFF data counts as inverted.
///
/// `Standard` treats min-is-white as the sample value 0 being white. Some
/// writers got this backwards; `Inverted` reads and writes their files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Polarity {
    #[default]
    Standard,
    Inverted,
}

/// Image resolution in dots per inch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub x: u32,
    pub y: u32,
}

impl Resolution {
    /// A resolution from densities in `unit`, `None` for a bare 1:1 aspect ratio.
    pub(crate) fn from_density(x: u32, y: u32, centimeters: bool) -> Option<Resolution> {
        let (x, y) = if centimeters {
            ((f64::from(x) / 2.54) as u32, (f64::from(y) / 2.54) as u32)
        } else {
            (x, y)
        };
        let x = if x == 1 { 0 } else { x };
        let y = if y == 1 { 0 } else { y };
        if x == 0 && y == 0 {
            None
        } else {
            Some(Resolution { x, y })
        }
    }
}

/// Container formats recognised by their signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Tiff,
    Gif,
    Jpeg,
}

impl ImageFormat {
    pub fn detect(data: &[u8]) -> Option<ImageFormat> {
        match data {
            [b'I', b'I', 42, 0, ..] | [b'M', b'M', 0, 42, ..] => Some(ImageFormat::Tiff),
            [b'G', b'I', b'F', ..] => Some(ImageFormat::Gif),
            [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }
}

/// Header level description of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
    pub resolution: Option<Resolution>,
}

/// Decode the first image of `data` into a buffer of `depth` bits per pixel.
pub fn decode(data: &[u8], depth: BitDepth) -> ImageResult<PixelBuffer> {
    match ImageFormat::detect(data).ok_or(ImageError::UnsupportedFormat)? {
        ImageFormat::Tiff => decoder::Decoder::new(data)?.read_image(depth),
        ImageFormat::Gif => gif::GifDecoder::new(data)?.decode(depth),
        ImageFormat::Jpeg => decode_jpeg(data, depth),
    }
}

/// Read the size, depth and resolution of the first image of `data`.
pub fn image_info(data: &[u8]) -> ImageResult<ImageInfo> {
    let format = ImageFormat::detect(data).ok_or(ImageError::UnsupportedFormat)?;
    let ((width, height), bits_per_pixel, resolution) = match format {
        ImageFormat::Tiff => {
            let decoder = decoder::Decoder::new(data)?;
            (
                decoder.dimensions(),
                decoder.bits_per_pixel(),
                decoder.resolution(),
            )
        }
        ImageFormat::Gif => {
            let decoder = gif::GifDecoder::new(data)?;
            (decoder.dimensions(), decoder.bits_per_pixel(), None)
        }
        ImageFormat::Jpeg => jpeg_info(data)?,
    };
    Ok(ImageInfo {
        format,
        width,
        height,
        bits_per_pixel,
        resolution,
    })
}

#[cfg(feature = "jpeg")]
fn decode_jpeg(data: &[u8], depth: BitDepth) -> ImageResult<PixelBuffer> {
    jpeg::JpegDecoder::new(data)?.decode(depth)
}

#[cfg(not(feature = "jpeg"))]
fn decode_jpeg(_: &[u8], _: BitDepth) -> ImageResult<PixelBuffer> {
    Err(ImageError::UnsupportedVariant("JPEG support is disabled".into()))
}

#[cfg(feature = "jpeg")]
fn jpeg_info(data: &[u8]) -> ImageResult<((u32, u32), u32, Option<Resolution>)> {
    let decoder = jpeg::JpegDecoder::new(data)?;
    Ok((
        decoder.dimensions(),
        decoder.bits_per_pixel(),
        decoder.resolution(),
    ))
}

#[cfg(not(feature = "jpeg"))]
fn jpeg_info(_: &[u8]) -> ImageResult<((u32, u32), u32, Option<Resolution>)> {
    Err(ImageError::UnsupportedVariant("JPEG support is disabled".into()))
}
