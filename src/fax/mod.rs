//! CCITT bilevel coding: modified Huffman, Group 3 and Group 4.
//!
//! Rows handed to and produced by this module are packed most significant
//! bit first with `1` meaning a black run. Mapping that onto the colours of a
//! particular image is up to the container.

mod decode;
mod encode;
pub(crate) mod tables;

pub use self::decode::FaxDecoder;
pub use self::encode::FaxEncoder;

/// Row coding of a fax strip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaxScheme {
    /// Modified Huffman runs, each row byte aligned, no end of line codes.
    Rle,
    /// Modified Huffman runs, each row preceded by an end of line code.
    Group3_1D,
    /// Group 3 with a tag bit after each end of line selecting 1-D or 2-D.
    Group3_2D,
    /// Two dimensional rows without end of line codes.
    Group4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaxOptions {
    pub scheme: FaxScheme,
    pub width: u32,
    /// The uncompressed mode escape may appear in 2-D rows.
    pub uncompressed: bool,
    /// Group 3 2-D encoding codes every `k_factor`-th row one dimensionally.
    pub k_factor: u32,
}

impl FaxOptions {
    pub fn new(scheme: FaxScheme, width: u32) -> FaxOptions {
        FaxOptions {
            scheme,
            width,
            uncompressed: false,
            k_factor: 4,
        }
    }
}

/// Positions at which the colour of a row changes, starting from white.
///
/// Element `i` starts a black run when `i` is even and a white run when it
/// is odd. Positions never decrease and are below the row width.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangingElements {
    positions: Vec<u32>,
}

impl ChangingElements {
    pub fn new() -> ChangingElements {
        ChangingElements::default()
    }

    /// Collect the changing elements of a packed row (`1` = black).
    pub fn from_row(row: &[u8], width: u32) -> ChangingElements {
        let mut elements = ChangingElements::new();
        let mut black = false;
        for x in 0..width {
            let bit = (row[(x / 8) as usize] >> (7 - (x % 8))) & 1 != 0;
            if bit != black {
                elements.positions.push(x);
                black = bit;
            }
        }
        elements
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    /// Record a colour change at `pos`.
    ///
    /// A change at the position of the previous one cancels it, so zero
    /// length runs leave no trace.
    pub fn push(&mut self, pos: u32) {
        if self.positions.last() == Some(&pos) {
            self.positions.pop();
        } else {
            self.positions.push(pos);
        }
    }

    /// First element right of `a0` whose run colour is the opposite of
    /// `white`, and the element after it, as `(b1, b2)`.
    ///
    /// `a0` of `None` stands for the imaginary position before the row.
    /// Missing elements are reported as `width`.
    pub fn b1_b2(&self, a0: Option<u32>, white: bool, width: u32) -> (u32, u32) {
        // Even elements start black runs, which are opposite to white.
        let parity = if white { 0 } else { 1 };
        let found = self
            .positions
            .iter()
            .enumerate()
            .find(|&(i, &pos)| i % 2 == parity && a0.map_or(true, |a0| pos > a0));
        match found {
            Some((i, &b1)) => {
                let b2 = self.positions.get(i + 1).copied().unwrap_or(width);
                (b1, b2)
            }
            None => (width, width),
        }
    }

    /// First element right of `a0`, or `width`.
    pub fn next_after(&self, a0: Option<u32>, width: u32) -> u32 {
        self.positions
            .iter()
            .copied()
            .find(|&pos| a0.map_or(true, |a0| pos > a0))
            .unwrap_or(width)
    }

    /// Write the row into `row`, setting the bits of black runs.
    pub fn render(&self, row: &mut [u8], width: u32) {
        row.fill(0);
        for pair in self.positions.chunks(2) {
            let start = pair[0];
            let end = pair.get(1).copied().unwrap_or(width).min(width);
            for x in start..end {
                row[(x / 8) as usize] |= 0x80 >> (x % 8);
            }
        }
    }
}
