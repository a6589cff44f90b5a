//! Conversion of decoded samples into the fixed pixel buffer depths.
//!
//! Decoders hand over one row at a time as a [`SourceRow`]; a
//! [`RowConverter`] planned once per image writes it into a destination row
//! of the buffer's depth, quantizing through a colour table where the
//! destination has fewer bits than the source.

use std::collections::HashMap;

use crate::pixel::{BitDepth, ColorTable, Rgb};

/// A gray ramp for `bits` bits per sample.
///
/// Four bit ramps step by 16, eight bit ramps by 1, one bit ramps are black
/// and white. `min_is_white` reverses the ramp.
pub fn gray_ramp(bits: u32, min_is_white: bool) -> ColorTable {
    let entries: Vec<Rgb> = match bits {
        1 => vec![Rgb::BLACK, Rgb::WHITE],
        4 => (0..16u32).map(|i| Rgb::gray((i * 16) as u8)).collect(),
        _ => (0..=255u8).map(Rgb::gray).collect(),
    };
    let entries = if min_is_white {
        entries.into_iter().rev().collect()
    } else {
        entries
    };
    ColorTable::new(entries)
}

/// Build a colour table from a TIFF ColorMap (all reds, then greens, then blues).
///
/// Writers disagree on whether the map holds 16 bit or 8 bit values. If any
/// value exceeds 255 the map is taken as 16 bit and scaled down, otherwise the
/// values are used as they are.
pub fn color_map_to_table(map: &[u16]) -> ColorTable {
    let n = map.len() / 3;
    let sixteen_bit = map.iter().any(|&v| v > 255);
    let scale = |v: u16| -> u8 {
        if sixteen_bit {
            (v >> 8) as u8
        } else {
            v as u8
        }
    };
    let entries = (0..n)
        .map(|i| Rgb::new(scale(map[i]), scale(map[n + i]), scale(map[2 * n + i])))
        .collect();
    ColorTable::new(entries)
}

/// The palette used for an indexed destination when the source palette does not fit.
///
/// One bit: black and white. Four bit: the 16 VGA colours. Eight bit: a
/// 6×6×6 colour cube followed by a 40 step gray ramp.
pub fn standard_palette(depth: BitDepth) -> ColorTable {
    match depth {
        BitDepth::One => ColorTable::bilevel(),
        BitDepth::Four => ColorTable::new(
            [
                (0, 0, 0),
                (128, 0, 0),
                (0, 128, 0),
                (128, 128, 0),
                (0, 0, 128),
                (128, 0, 128),
                (0, 128, 128),
                (192, 192, 192),
                (128, 128, 128),
                (255, 0, 0),
                (0, 255, 0),
                (255, 255, 0),
                (0, 0, 255),
                (255, 0, 255),
                (0, 255, 255),
                (255, 255, 255),
            ]
            .iter()
            .map(|&(r, g, b)| Rgb::new(r, g, b))
            .collect(),
        ),
        BitDepth::Eight => {
            let mut entries = Vec::with_capacity(256);
            for r in 0..6u32 {
                for g in 0..6u32 {
                    for b in 0..6u32 {
                        entries.push(Rgb::new((r * 51) as u8, (g * 51) as u8, (b * 51) as u8));
                    }
                }
            }
            for i in 0..40u32 {
                entries.push(Rgb::gray((i * 255 / 39) as u8));
            }
            ColorTable::new(entries)
        }
        BitDepth::TwentyFour => ColorTable::default(),
    }
}

/// Store `value` as pixel `x` of a packed row.
#[inline]
pub fn put_sample(row: &mut [u8], x: usize, depth: BitDepth, value: u32) {
    match depth {
        BitDepth::One => {
            let mask = 0x80u8 >> (x % 8);
            if value & 1 != 0 {
                row[x / 8] |= mask;
            } else {
                row[x / 8] &= !mask;
            }
        }
        BitDepth::Four => {
            let byte = &mut row[x / 2];
            if x % 2 == 0 {
                *byte = (*byte & 0x0F) | ((value as u8 & 0x0F) << 4);
            } else {
                *byte = (*byte & 0xF0) | (value as u8 & 0x0F);
            }
        }
        BitDepth::Eight => row[x] = value as u8,
        BitDepth::TwentyFour => {
            row[x * 3] = (value >> 16) as u8;
            row[x * 3 + 1] = (value >> 8) as u8;
            row[x * 3 + 2] = value as u8;
        }
    }
}

/// Read sample `x` of a packed row of `bits` bits per sample (1, 2, 4 or 8).
#[inline]
pub fn get_sample(row: &[u8], x: usize, bits: u32) -> u8 {
    match bits {
        1 => (row[x / 8] >> (7 - (x % 8))) & 1,
        2 => (row[x / 4] >> (6 - 2 * (x % 4))) & 3,
        4 => (row[x / 2] >> if x % 2 == 0 { 4 } else { 0 }) & 0x0F,
        _ => row[x],
    }
}

/// One decoded row in its source format.
#[derive(Clone, Copy, Debug)]
pub enum SourceRow<'a> {
    /// Packed bits, most significant first, 1 = white.
    Bilevel(&'a [u8]),
    /// Packed palette indices of `bits` bits each.
    Indexed { samples: &'a [u8], bits: u32 },
    /// Interleaved 8 bit samples; only the first three of each pixel are used.
    Rgb { samples: &'a [u8], channels: usize },
}

/// What the decoder knows about the source before the first row.
#[derive(Clone, Debug)]
pub enum SourceFormat {
    Bilevel,
    /// Palette or gray data with the table to resolve it through.
    Indexed { bits: u32, table: ColorTable, gray: bool },
    Rgb,
}

/// Nearest colour lookups with a per colour cache.
#[derive(Debug)]
pub struct Quantizer {
    table: ColorTable,
    cache: HashMap<Rgb, u8>,
}

impl Quantizer {
    pub fn new(table: ColorTable) -> Quantizer {
        Quantizer {
            table,
            cache: HashMap::new(),
        }
    }

    pub fn index(&mut self, color: Rgb) -> u8 {
        let table = &self.table;
        *self.cache.entry(color).or_insert_with(|| table.nearest(color))
    }

    pub fn table(&self) -> &ColorTable {
        &self.table
    }
}

/// Converts rows of one source format into rows of one destination depth.
#[derive(Debug)]
pub struct RowConverter {
    width: usize,
    depth: BitDepth,
    plan: Plan,
    palette: Option<ColorTable>,
}

#[derive(Debug)]
enum Plan {
    /// Bilevel into an indexed buffer whose palette is black, white.
    BilevelIndex,
    /// Bilevel into 24 bit.
    BilevelRgb,
    /// Source index mapped through a lookup to the destination value.
    IndexMap { bits: u32, map: Vec<u32> },
    /// RGB copied into 24 bit.
    RgbCopy,
    /// RGB quantized into the destination palette.
    RgbQuantize(Quantizer),
}

impl RowConverter {
    pub fn new(source: &SourceFormat, width: u32, depth: BitDepth) -> RowConverter {
        let (plan, palette) = match (source, depth) {
            (SourceFormat::Bilevel, BitDepth::TwentyFour) => (Plan::BilevelRgb, None),
            (SourceFormat::Bilevel, _) => (Plan::BilevelIndex, Some(ColorTable::bilevel())),
            (SourceFormat::Indexed { bits, table, .. }, BitDepth::TwentyFour) => {
                let map = (0..1usize << bits)
                    .map(|i| {
                        let c = table.color(i);
                        (u32::from(c.r) << 16) | (u32::from(c.g) << 8) | u32::from(c.b)
                    })
                    .collect();
                (Plan::IndexMap { bits: *bits, map }, None)
            }
            (SourceFormat::Indexed { bits, table, gray }, _) => {
                let slots = depth.palette_size();
                if table.len() <= slots {
                    let map = (0..1u32 << bits)
                        .map(|i| if (i as usize) < table.len() { i } else { 0 })
                        .collect();
                    (Plan::IndexMap { bits: *bits, map }, Some(table.clone()))
                } else {
                    let target = if *gray {
                        gray_ramp(depth.bits(), false)
                    } else {
                        standard_palette(depth)
                    };
                    let map = (0..1usize << bits)
                        .map(|i| u32::from(target.nearest(table.color(i))))
                        .collect();
                    (Plan::IndexMap { bits: *bits, map }, Some(target))
                }
            }
            (SourceFormat::Rgb, BitDepth::TwentyFour) => (Plan::RgbCopy, None),
            (SourceFormat::Rgb, _) => {
                let target = standard_palette(depth);
                (Plan::RgbQuantize(Quantizer::new(target.clone())), Some(target))
            }
        };

        RowConverter {
            width: width as usize,
            depth,
            plan,
            palette,
        }
    }

    /// The palette the destination buffer must carry, if indexed.
    pub fn palette(&self) -> Option<&ColorTable> {
        self.palette.as_ref()
    }

    /// Write `source` into `dest`, a destination row of at least the packed width.
    ///
    /// Source rows shorter than the image width leave the remaining pixels
    /// untouched.
    pub fn convert_row(&mut self, source: SourceRow<'_>, dest: &mut [u8]) {
        let depth = self.depth;
        match (&mut self.plan, source) {
            (Plan::BilevelIndex, SourceRow::Bilevel(bits)) => {
                if depth == BitDepth::One {
                    let n = bits.len().min(dest.len()).min(self.width.div_ceil(8));
                    dest[..n].copy_from_slice(&bits[..n]);
                } else {
                    let width = self.width.min(bits.len() * 8);
                    for x in 0..width {
                        put_sample(dest, x, depth, u32::from(get_sample(bits, x, 1)));
                    }
                }
            }
            (Plan::BilevelRgb, SourceRow::Bilevel(bits)) => {
                let width = self.width.min(bits.len() * 8);
                for x in 0..width {
                    let v = if get_sample(bits, x, 1) != 0 { 0xFF } else { 0 };
                    dest[x * 3..x * 3 + 3].fill(v);
                }
            }
            (Plan::IndexMap { bits, map }, SourceRow::Indexed { samples, .. }) => {
                let width = self.width.min(samples.len() * 8 / *bits as usize);
                for x in 0..width {
                    let index = get_sample(samples, x, *bits) as usize;
                    put_sample(dest, x, depth, map.get(index).copied().unwrap_or(0));
                }
            }
            (Plan::RgbCopy, SourceRow::Rgb { samples, channels }) => {
                for (x, px) in samples.chunks_exact(channels).take(self.width).enumerate() {
                    dest[x * 3..x * 3 + 3].copy_from_slice(&px[..3]);
                }
            }
            (Plan::RgbQuantize(quantizer), SourceRow::Rgb { samples, channels }) => {
                for (x, px) in samples.chunks_exact(channels).take(self.width).enumerate() {
                    let color = Rgb::new(px[0], px[1], px[2]);
                    let value = if depth == BitDepth::One {
                        u32::from(color.luma() >= 128)
                    } else {
                        u32::from(quantizer.index(color))
                    };
                    put_sample(dest, x, depth, value);
                }
            }
            (plan, source) => {
                log::warn!("row format {:?} does not match conversion {:?}", source, plan);
            }
        }
    }
}
