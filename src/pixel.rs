//! The fixed-format pixel buffer every decoder writes into.

use crate::error::{ImageError, ImageResult};

/// Bits per pixel of a [`PixelBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BitDepth {
    /// Bilevel, eight pixels per byte, most significant bit first.
    One,
    /// Palette index, two pixels per byte, high nibble first.
    Four,
    /// Palette index, one byte per pixel.
    Eight,
    /// Red, green and blue bytes.
    TwentyFour,
}

impl BitDepth {
    pub fn from_bits(bits: u32) -> Option<BitDepth> {
        match bits {
            1 => Some(BitDepth::One),
            4 => Some(BitDepth::Four),
            8 => Some(BitDepth::Eight),
            24 => Some(BitDepth::TwentyFour),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            BitDepth::One => 1,
            BitDepth::Four => 4,
            BitDepth::Eight => 8,
            BitDepth::TwentyFour => 24,
        }
    }

    /// Whether buffers of this depth carry a colour table.
    pub fn is_indexed(self) -> bool {
        self != BitDepth::TwentyFour
    }

    /// Number of palette entries addressable at this depth.
    pub fn palette_size(self) -> usize {
        match self {
            BitDepth::One => 2,
            BitDepth::Four => 16,
            BitDepth::Eight => 256,
            BitDepth::TwentyFour => 0,
        }
    }

    /// Bytes needed for `width` pixels without padding.
    pub fn packed_row_bytes(self, width: u32) -> usize {
        (width as usize * self.bits() as usize).div_ceil(8)
    }

    /// Bytes per row padded to a four byte boundary.
    pub fn stride(self, width: u32) -> usize {
        (width as usize * self.bits() as usize).div_ceil(32) * 4
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };

    pub const fn new(r: u8, g: u8, b: u8) -> Rgb {
        Rgb { r, g, b }
    }

    pub const fn gray(v: u8) -> Rgb {
        Rgb { r: v, g: v, b: v }
    }

    /// Squared euclidean distance in RGB space.
    pub fn distance_sq(self, other: Rgb) -> u32 {
        let dr = i32::from(self.r) - i32::from(other.r);
        let dg = i32::from(self.g) - i32::from(other.g);
        let db = i32::from(self.b) - i32::from(other.b);
        (dr * dr + dg * dg + db * db) as u32
    }

    /// Integer approximation of the luminance.
    pub fn luma(self) -> u8 {
        ((u32::from(self.r) * 299 + u32::from(self.g) * 587 + u32::from(self.b) * 114) / 1000)
            as u8
    }
}

/// An ordered table of at most 256 colours.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorTable {
    entries: Vec<Rgb>,
}

impl ColorTable {
    pub const MAX_ENTRIES: usize = 256;

    /// Build a table, keeping at most 256 entries.
    pub fn new(mut entries: Vec<Rgb>) -> ColorTable {
        entries.truncate(Self::MAX_ENTRIES);
        ColorTable { entries }
    }

    /// The bilevel palette: black at index 0, white at index 1.
    pub fn bilevel() -> ColorTable {
        ColorTable::new(vec![Rgb::BLACK, Rgb::WHITE])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Rgb> {
        self.entries.get(index).copied()
    }

    /// Colour of `index`, black when the index is outside the table.
    pub fn color(&self, index: usize) -> Rgb {
        self.get(index).unwrap_or(Rgb::BLACK)
    }

    pub fn entries(&self) -> &[Rgb] {
        &self.entries
    }

    /// Index of the entry closest to `color`.
    ///
    /// An exact match wins; otherwise the smallest squared RGB distance, the
    /// lowest index on ties. An empty table yields 0.
    pub fn nearest(&self, color: Rgb) -> u8 {
        let mut best = 0usize;
        let mut best_dist = u32::MAX;
        for (i, entry) in self.entries.iter().enumerate() {
            let dist = entry.distance_sq(color);
            if dist < best_dist {
                best = i;
                best_dist = dist;
                if dist == 0 {
                    break;
                }
            }
        }
        best as u8
    }
}

/// A decoded image at one of the fixed bit depths.
///
/// Rows are stored top down, each padded to a multiple of four bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    depth: BitDepth,
    stride: usize,
    data: Vec<u8>,
    palette: Option<ColorTable>,
}

impl PixelBuffer {
    /// A zero filled buffer.
    ///
    /// Indexed depths get a default palette: black and white for one bit, a
    /// gray ramp for four and eight bits.
    pub fn new(width: u32, height: u32, depth: BitDepth) -> ImageResult<PixelBuffer> {
        let stride = depth.stride(width);
        let len = stride
            .checked_mul(height as usize)
            .ok_or(ImageError::LimitsExceeded)?;
        let palette = match depth {
            BitDepth::One => Some(ColorTable::bilevel()),
            BitDepth::Four => Some(crate::convert::gray_ramp(4, false)),
            BitDepth::Eight => Some(crate::convert::gray_ramp(8, false)),
            BitDepth::TwentyFour => None,
        };
        Ok(PixelBuffer {
            width,
            height,
            depth,
            stride,
            data: vec![0; len],
            palette,
        })
    }

    /// Wrap existing pixel data, which must hold `stride * height` bytes.
    pub fn from_raw(
        width: u32,
        height: u32,
        depth: BitDepth,
        data: Vec<u8>,
        palette: Option<ColorTable>,
    ) -> ImageResult<PixelBuffer> {
        let stride = depth.stride(width);
        let needed = stride
            .checked_mul(height as usize)
            .ok_or(ImageError::LimitsExceeded)?;
        if data.len() < needed {
            return Err(ImageError::BufferTooSmall(needed, data.len()));
        }
        let mut buffer = PixelBuffer {
            width,
            height,
            depth,
            stride,
            data,
            palette: None,
        };
        buffer.data.truncate(needed);
        match palette {
            Some(table) => buffer.set_palette(table),
            None => {
                let defaults = PixelBuffer::new(0, 0, depth)?;
                buffer.palette = defaults.palette;
            }
        }
        Ok(buffer)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn depth(&self) -> BitDepth {
        self.depth
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn palette(&self) -> Option<&ColorTable> {
        self.palette.as_ref()
    }

    /// Replace the colour table. Ignored for 24 bit buffers.
    pub fn set_palette(&mut self, table: ColorTable) {
        if self.depth.is_indexed() {
            let mut entries = table.entries;
            entries.truncate(self.depth.palette_size());
            self.palette = Some(ColorTable::new(entries));
        }
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.stride]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        &mut self.data[start..start + self.stride]
    }

    /// Raw sample value at `(x, y)`: a palette index or a packed `0xRRGGBB`.
    pub fn pixel(&self, x: u32, y: u32) -> u32 {
        let row = self.row(y);
        let x = x as usize;
        match self.depth {
            BitDepth::One => u32::from((row[x / 8] >> (7 - (x % 8))) & 1),
            BitDepth::Four => u32::from((row[x / 2] >> if x % 2 == 0 { 4 } else { 0 }) & 0x0F),
            BitDepth::Eight => u32::from(row[x]),
            BitDepth::TwentyFour => {
                let p = &row[x * 3..x * 3 + 3];
                (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])
            }
        }
    }

    /// Colour of the pixel at `(x, y)`, resolved through the palette.
    pub fn color(&self, x: u32, y: u32) -> Rgb {
        let value = self.pixel(x, y);
        match (&self.palette, self.depth) {
            (_, BitDepth::TwentyFour) => {
                Rgb::new((value >> 16) as u8, (value >> 8) as u8, value as u8)
            }
            (Some(table), _) => table.color(value as usize),
            (None, _) => Rgb::BLACK,
        }
    }

    /// Store a raw sample value as returned by [`PixelBuffer::pixel`].
    pub fn set_pixel(&mut self, x: u32, y: u32, value: u32) {
        let depth = self.depth;
        let row = self.row_mut(y);
        crate::convert::put_sample(row, x as usize, depth, value);
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }
}
