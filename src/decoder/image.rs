use super::predictor::rev_hpredict;
use super::stream::unpack_bits;
use super::Limits;
use crate::convert::{gray_ramp, RowConverter, SourceFormat, SourceRow};
use crate::error::{DirectoryError, ImageError, ImageResult};
use crate::fax::{FaxDecoder, FaxOptions};
use crate::lzw::LzwDecoder;
use crate::pixel::{ColorTable, PixelBuffer};
use crate::tags::{FillOrder, PhotometricInterpretation, Predictor, Tag, FAX_OPTION_UNCOMPRESSED};
use crate::{CompressionScheme, Polarity, Resolution};

/// Values derived from the directory of one image.
#[derive(Clone, Debug)]
pub(crate) struct ImageLayout {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u16,
    pub samples: u16,
    pub compression: CompressionScheme,
    pub photometric_interpretation: PhotometricInterpretation,
    pub fill_order: FillOrder,
    pub rows_per_strip: u32,
    pub strip_offsets: Vec<u32>,
    /// `None` when a single strip runs to the end of the file.
    pub strip_byte_counts: Option<Vec<u32>>,
    /// T4Options or T6Options.
    pub fax_options: u32,
    pub color_map: Option<ColorTable>,
    pub resolution: Option<Resolution>,
}

impl ImageLayout {
    pub fn bits_per_pixel(&self) -> u32 {
        u32::from(self.bits_per_sample) * u32::from(self.samples)
    }

    /// Bytes of one decompressed row.
    pub fn row_bytes(&self) -> usize {
        (self.width as usize * self.bits_per_pixel() as usize).div_ceil(8)
    }

    pub fn strip_count(&self) -> usize {
        self.strip_offsets.len()
    }

    /// The sample layout rows are converted from.
    pub fn source_format(&self) -> ImageResult<SourceFormat> {
        let fax = self.compression.fax_scheme().is_some();
        let unsupported = || {
            ImageError::UnsupportedVariant(format!(
                "{} bits x {} samples with {:?}",
                self.bits_per_sample, self.samples, self.compression
            ))
        };

        let format = match (self.bits_per_sample, self.samples) {
            (1, 1) => SourceFormat::Bilevel,
            _ if fax => return Err(unsupported()),
            (4 | 8, 1) => match (&self.color_map, self.photometric_interpretation) {
                (Some(table), _) => SourceFormat::Indexed {
                    bits: u32::from(self.bits_per_sample),
                    table: table.clone(),
                    gray: false,
                },
                (None, PhotometricInterpretation::RGBPalette) => {
                    return Err(ImageError::MissingRequiredTag(Tag::ColorMap))
                }
                (None, photometric) => SourceFormat::Indexed {
                    bits: u32::from(self.bits_per_sample),
                    table: gray_ramp(
                        u32::from(self.bits_per_sample),
                        photometric == PhotometricInterpretation::WhiteIsZero,
                    ),
                    gray: true,
                },
            },
            (8, 3 | 4) => SourceFormat::Rgb,
            _ => return Err(unsupported()),
        };

        if let CompressionScheme::Lzw {
            predictor: Predictor::Horizontal,
        } = self.compression
        {
            if self.bits_per_sample != 8 {
                return Err(unsupported());
            }
        }
        Ok(format)
    }

    /// Whether raw bilevel rows have to be inverted to read 1 as white.
    pub fn inverts_bilevel(&self, polarity: Polarity) -> bool {
        let min_is_white = self.photometric_interpretation == PhotometricInterpretation::WhiteIsZero;
        match polarity {
            Polarity::Standard => min_is_white,
            Polarity::Inverted => !min_is_white,
        }
    }
}

/// Working state of one `decode_into` call.
#[derive(Debug)]
pub(crate) struct DecodeContext {
    converter: RowConverter,
    source: SourceFormat,
    invert: bool,
    lzw: Option<LzwDecoder>,
    fax: Option<FaxDecoder>,
    strip: Vec<u8>,
    row: Vec<u8>,
}

impl DecodeContext {
    pub fn new(layout: &ImageLayout, buffer: &PixelBuffer, polarity: Polarity) -> ImageResult<Self> {
        let source = layout.source_format()?;
        let converter = RowConverter::new(&source, layout.width, buffer.depth());
        let lzw = match layout.compression {
            CompressionScheme::Lzw { .. } => Some(LzwDecoder::tiff()),
            _ => None,
        };
        let fax = layout.compression.fax_scheme().map(|scheme| {
            let mut options = FaxOptions::new(scheme, layout.width);
            options.uncompressed = layout.fax_options & FAX_OPTION_UNCOMPRESSED != 0;
            FaxDecoder::new(options)
        });
        Ok(DecodeContext {
            converter,
            source,
            invert: layout.inverts_bilevel(polarity),
            lzw,
            fax,
            strip: Vec::new(),
            row: Vec::new(),
        })
    }

    pub fn palette(&self) -> Option<&ColorTable> {
        self.converter.palette()
    }

    /// Decompress strip `index` into the context's strip buffer.
    ///
    /// Returns the number of complete rows available.
    fn decompress(
        &mut self,
        layout: &ImageLayout,
        limits: &Limits,
        bytes: &[u8],
        index: usize,
        rows: usize,
    ) -> ImageResult<usize> {
        let row_bytes = layout.row_bytes();
        let expected = row_bytes
            .checked_mul(rows)
            .filter(|&n| n <= limits.decoding_buffer_size)
            .ok_or(ImageError::LimitsExceeded)?;

        let reversed;
        let bytes = if layout.fill_order == FillOrder::LsbFirst {
            reversed = bytes.iter().map(|b| b.reverse_bits()).collect::<Vec<_>>();
            &reversed[..]
        } else {
            bytes
        };

        self.strip = match layout.compression {
            CompressionScheme::None => bytes[..bytes.len().min(expected)].to_vec(),
            CompressionScheme::PackBits => unpack_bits(bytes, expected)?,
            CompressionScheme::Lzw { predictor } => {
                let decoder = self.lzw.get_or_insert_with(LzwDecoder::tiff);
                let mut data = decoder.decode(bytes, expected)?;
                if predictor == Predictor::Horizontal {
                    rev_hpredict(&mut data, row_bytes, usize::from(layout.samples));
                }
                data
            }
            CompressionScheme::CcittRle
            | CompressionScheme::CcittGroup3_1D
            | CompressionScheme::CcittGroup3_2D
            | CompressionScheme::CcittGroup4 => {
                let mut data = vec![0; expected];
                if let Some(decoder) = self.fax.as_mut() {
                    match decoder.decode_strip(bytes, &mut data) {
                        Ok(decoded) => {
                            log::trace!("strip {}: {} of {} fax rows", index, decoded, rows)
                        }
                        Err(err) if limits.strict_fax => return Err(err),
                        Err(err) => log::warn!("strip {} is damaged, keeping what decoded: {}", index, err),
                    }
                }
                data
            }
        };

        if self.strip.len() < expected {
            log::debug!(
                "strip {} holds {} of {} bytes",
                index,
                self.strip.len(),
                expected
            );
        }
        Ok(self.strip.len() / row_bytes.max(1))
    }

    fn emit_row(&mut self, layout: &ImageLayout, row: usize, dest: &mut [u8]) {
        let row_bytes = layout.row_bytes();
        let samples = &self.strip[row * row_bytes..(row + 1) * row_bytes];
        let source = match &self.source {
            SourceFormat::Bilevel => {
                let invert = if self.invert { 0xFF } else { 0 };
                self.row.clear();
                self.row.extend(samples.iter().map(|b| b ^ invert));
                // Padding bits of the last byte stay clear.
                let tail = layout.width % 8;
                if let (Some(last), true) = (self.row.last_mut(), tail != 0) {
                    *last &= 0xFF << (8 - tail);
                }
                SourceRow::Bilevel(&self.row)
            }
            SourceFormat::Indexed { bits, .. } => SourceRow::Indexed {
                samples,
                bits: *bits,
            },
            SourceFormat::Rgb => SourceRow::Rgb {
                samples,
                channels: usize::from(layout.samples),
            },
        };
        self.converter.convert_row(source, dest);
    }
}

/// Decode every strip of `layout` from `data` into `buffer`.
pub(crate) fn decode_strips(
    layout: &ImageLayout,
    data: &[u8],
    limits: &Limits,
    ctx: &mut DecodeContext,
    buffer: &mut PixelBuffer,
) -> ImageResult<()> {
    let rows_per_strip = layout.rows_per_strip.clamp(1, layout.height.max(1)) as usize;
    let height = layout.height as usize;

    for (index, &offset) in layout.strip_offsets.iter().enumerate() {
        let first_row = index.saturating_mul(rows_per_strip);
        if first_row >= height {
            log::debug!("ignoring {} strips past the last row", layout.strip_count() - index);
            break;
        }
        let rows = rows_per_strip.min(height - first_row);

        let count = layout.strip_byte_counts.as_ref().map(|counts| counts[index]);
        if count == Some(0) {
            log::debug!("strip {} is empty", index);
            continue;
        }

        let start = offset as usize;
        let end = match count {
            Some(count) => start.checked_add(count as usize),
            None => Some(data.len()),
        };
        let bytes = match end.and_then(|end| data.get(start..end)) {
            Some(bytes) => bytes,
            None => return Err(DirectoryError::OffsetOutOfBounds(u64::from(offset)).into()),
        };
        if bytes.is_empty() {
            log::debug!("strip {} is empty", index);
            continue;
        }

        let available = ctx.decompress(layout, limits, bytes, index, rows)?;
        for row in 0..available.min(rows) {
            let y = (first_row + row) as u32;
            ctx.emit_row(layout, row, buffer.row_mut(y));
        }
    }
    Ok(())
}
