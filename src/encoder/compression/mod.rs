//! Strip compressors for the TIFF encoder.

use std::io::Write;

use crate::error::{ImageError, ImageResult};
use crate::fax::FaxOptions;
use crate::CompressionScheme;

mod fax;
#[cfg(feature = "lzw")]
mod lzw;
mod packbits;
mod uncompressed;

pub use self::fax::Fax;
#[cfg(feature = "lzw")]
pub use self::lzw::Lzw;
pub use self::packbits::Packbits;
pub use self::uncompressed::Uncompressed;

/// An algorithm that compresses one strip at a time.
pub trait CompressionAlgorithm {
    /// Compress `bytes` into `writer` and return the number of bytes written.
    fn write_to<W: Write>(&mut self, writer: &mut W, bytes: &[u8]) -> ImageResult<u64>;
}

/// The compressor of one image.
#[derive(Debug)]
pub enum Compressor {
    Uncompressed(Uncompressed),
    Packbits(Packbits),
    #[cfg(feature = "lzw")]
    Lzw(Lzw),
    Fax(Fax),
}

impl Compressor {
    /// The compressor for `scheme` on rows `width` pixels wide.
    ///
    /// Predictors are applied by the caller; fax schemes expect bilevel rows.
    pub fn new(scheme: CompressionScheme, width: u32, k_factor: u32) -> ImageResult<Self> {
        let compressor = match scheme {
            CompressionScheme::None => Compressor::Uncompressed(Uncompressed),
            CompressionScheme::PackBits => Compressor::Packbits(Packbits),
            #[cfg(feature = "lzw")]
            CompressionScheme::Lzw { .. } => Compressor::Lzw(Lzw),
            #[cfg(not(feature = "lzw"))]
            CompressionScheme::Lzw { .. } => {
                return Err(ImageError::UnsupportedVariant(
                    "LZW encoding is disabled".into(),
                ))
            }
            CompressionScheme::CcittRle
            | CompressionScheme::CcittGroup3_1D
            | CompressionScheme::CcittGroup3_2D
            | CompressionScheme::CcittGroup4 => {
                let fax_scheme = scheme.fax_scheme().ok_or_else(|| {
                    ImageError::UnsupportedVariant(format!("{:?}", scheme))
                })?;
                let mut options = FaxOptions::new(fax_scheme, width);
                options.k_factor = k_factor;
                Compressor::Fax(Fax::new(options))
            }
        };
        Ok(compressor)
    }
}

impl CompressionAlgorithm for Compressor {
    fn write_to<W: Write>(&mut self, writer: &mut W, bytes: &[u8]) -> ImageResult<u64> {
        match self {
            Compressor::Uncompressed(algorithm) => algorithm.write_to(writer, bytes),
            Compressor::Packbits(algorithm) => algorithm.write_to(writer, bytes),
            #[cfg(feature = "lzw")]
            Compressor::Lzw(algorithm) => algorithm.write_to(writer, bytes),
            Compressor::Fax(algorithm) => algorithm.write_to(writer, bytes),
        }
    }
}
