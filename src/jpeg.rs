//! JPEG through external codecs: `zune-jpeg` decodes, `image` encodes.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use zune_jpeg::zune_core::colorspace::ColorSpace;
use zune_jpeg::zune_core::options::DecoderOptions;

use crate::convert::{gray_ramp, RowConverter, SourceFormat, SourceRow};
use crate::error::{ImageError, ImageResult, StreamError};
use crate::pixel::{BitDepth, PixelBuffer};
use crate::Resolution;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: u8 = 0xE0;
const SOS: u8 = 0xDA;

const DENSITY_CENTIMETERS: u8 = 2;

fn codec_error(err: impl std::fmt::Debug) -> ImageError {
    StreamError::Jpeg(format!("{:?}", err)).into()
}

/// Density of the JFIF APP0 segment, if the file has one.
///
/// Segments are walked up to the start of scan.
fn jfif_resolution(data: &[u8]) -> Option<Resolution> {
    if !data.starts_with(&SOI) {
        return None;
    }
    let mut pos = 2;
    while let [0xFF, marker, hi, lo, ..] = *data.get(pos..)? {
        if marker == SOS {
            break;
        }
        let len = usize::from(u16::from_be_bytes([hi, lo]));
        let body = data.get(pos + 4..pos + 2 + len)?;
        if marker == APP0 && body.starts_with(b"JFIF\0") && body.len() >= 12 {
            let x = u16::from_be_bytes([body[8], body[9]]);
            let y = u16::from_be_bytes([body[10], body[11]]);
            return Resolution::from_density(
                u32::from(x),
                u32::from(y),
                body[7] == DENSITY_CENTIMETERS,
            );
        }
        pos += 2 + len;
    }
    None
}

/// Header information of a JPEG file, decoding on demand.
#[derive(Debug)]
pub struct JpegDecoder<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    components: usize,
    resolution: Option<Resolution>,
}

impl<'a> JpegDecoder<'a> {
    pub fn new(data: &'a [u8]) -> ImageResult<JpegDecoder<'a>> {
        let mut decoder = zune_jpeg::JpegDecoder::new(Cursor::new(data));
        decoder.decode_headers().map_err(codec_error)?;
        let (width, height) = decoder
            .dimensions()
            .ok_or_else(|| codec_error("no frame header"))?;
        let components = decoder
            .input_colorspace()
            .map(|c| c.num_components())
            .unwrap_or(3);

        Ok(JpegDecoder {
            data,
            width: width as u32,
            height: height as u32,
            components,
            resolution: jfif_resolution(data),
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn bits_per_pixel(&self) -> u32 {
        self.components as u32 * 8
    }

    /// The JFIF density in dots per inch.
    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    /// Decode into a buffer of `depth` bits per pixel.
    pub fn decode(&self, depth: BitDepth) -> ImageResult<PixelBuffer> {
        let gray = self.components == 1;
        let out = if gray { ColorSpace::Luma } else { ColorSpace::RGB };
        let options = DecoderOptions::default().jpeg_set_out_colorspace(out);
        let mut decoder = zune_jpeg::JpegDecoder::new_with_options(Cursor::new(self.data), options);
        let pixels = decoder.decode().map_err(codec_error)?;

        let channels = out.num_components();
        let row_len = self.width as usize * channels;
        let source = if gray {
            SourceFormat::Indexed {
                bits: 8,
                table: gray_ramp(8, false),
                gray: true,
            }
        } else {
            SourceFormat::Rgb
        };
        let mut buffer = PixelBuffer::new(self.width, self.height, depth)?;
        let mut converter = RowConverter::new(&source, self.width, depth);
        for (y, samples) in pixels
            .chunks_exact(row_len.max(1))
            .take(self.height as usize)
            .enumerate()
        {
            let row = if gray {
                SourceRow::Indexed { samples, bits: 8 }
            } else {
                SourceRow::Rgb { samples, channels }
            };
            converter.convert_row(row, buffer.row_mut(y as u32));
        }
        if let Some(palette) = converter.palette() {
            buffer.set_palette(palette.clone());
        }
        Ok(buffer)
    }
}

/// Encode `buffer` as a baseline JPEG, indexed depths through their palette.
///
/// `quality` runs from 1 to 100.
pub fn encode(buffer: &PixelBuffer, quality: u8) -> ImageResult<Vec<u8>> {
    let (width, height) = buffer.dimensions();
    let rgb: Vec<u8> = match buffer.depth() {
        BitDepth::TwentyFour => (0..height)
            .flat_map(|y| buffer.row(y)[..width as usize * 3].iter().copied())
            .collect(),
        _ => (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .flat_map(|(x, y)| {
                let c = buffer.color(x, y);
                [c.r, c.g, c.b]
            })
            .collect(),
    };

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode(&rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(|err| StreamError::Jpeg(err.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::Rgb;

    fn jfif(units: u8, x: u16, y: u16) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8, 0xFF, APP0, 0, 16];
        data.extend_from_slice(b"JFIF\0\x01\x02");
        data.push(units);
        data.extend_from_slice(&x.to_be_bytes());
        data.extend_from_slice(&y.to_be_bytes());
        data.extend_from_slice(&[0, 0, 0xFF, SOS]);
        data
    }

    #[test]
    fn density_units() {
        assert_eq!(
            jfif_resolution(&jfif(1, 300, 300)),
            Some(Resolution { x: 300, y: 300 })
        );
        assert_eq!(
            jfif_resolution(&jfif(2, 118, 118)),
            Some(Resolution { x: 46, y: 46 })
        );
        assert_eq!(jfif_resolution(&jfif(0, 1, 1)), None);
        assert_eq!(jfif_resolution(&[0xFF, 0xD8, 0xFF]), None);
    }

    #[test]
    fn encode_then_decode() {
        let mut buffer = PixelBuffer::new(16, 8, BitDepth::TwentyFour).unwrap();
        for y in 0..8 {
            buffer.row_mut(y)[..48].fill(200);
        }
        let data = encode(&buffer, 90).unwrap();
        let decoder = JpegDecoder::new(&data).unwrap();
        assert_eq!(decoder.dimensions(), (16, 8));
        assert_eq!(decoder.bits_per_pixel(), 24);

        let decoded = decoder.decode(BitDepth::TwentyFour).unwrap();
        let c = decoded.color(5, 5);
        assert!(c.r.abs_diff(200) < 8, "{:?}", c);

        let bilevel = decoder.decode(BitDepth::One).unwrap();
        assert_eq!(bilevel.color(5, 5), Rgb::WHITE);
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let err = JpegDecoder::new(&[0xFF, 0xD8, 0xFF, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            ImageError::CorruptEntropyStream(StreamError::Jpeg(_))
        ));
    }
}
