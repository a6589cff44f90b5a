use std::mem;

use super::tables::{
    makeup_code, terminating_code, Mode, EOL_BITS, EOL_CODE, LONGEST_MAKEUP, REPEAT_MAKEUP_FROM,
};
use super::{ChangingElements, FaxOptions, FaxScheme};
use crate::bits::{BitOrder, BitWriter};

/// End of line codes forming the return to control at the end of a Group 3 strip.
const RTC_EOLS: usize = 6;

/// Encoder for one fax strip.
///
/// Rows are packed most significant bit first with `1` meaning black.
#[derive(Debug)]
pub struct FaxEncoder {
    options: FaxOptions,
    writer: BitWriter,
    reference: ChangingElements,
    rows: u32,
}

impl FaxEncoder {
    pub fn new(options: FaxOptions) -> FaxEncoder {
        FaxEncoder {
            options,
            writer: BitWriter::new(BitOrder::Msb),
            reference: ChangingElements::new(),
            rows: 0,
        }
    }

    pub fn encode_row(&mut self, row: &[u8]) {
        let width = self.options.width;
        let current = ChangingElements::from_row(row, width);

        match self.options.scheme {
            FaxScheme::Rle => {
                self.encode_1d(&current);
                self.writer.align_to_byte();
            }
            FaxScheme::Group3_1D => {
                self.put_eol();
                self.encode_1d(&current);
            }
            FaxScheme::Group3_2D => {
                let k = self.options.k_factor.max(1);
                let one_dimensional = self.rows % k == 0;
                self.put_eol();
                self.writer.put_bit(u32::from(one_dimensional));
                if one_dimensional {
                    self.encode_1d(&current);
                } else {
                    self.encode_2d(&current);
                }
            }
            FaxScheme::Group4 => self.encode_2d(&current),
        }

        self.reference = current;
        self.rows += 1;
    }

    /// Terminate the strip and return its bytes.
    pub fn finish(mut self) -> Vec<u8> {
        match self.options.scheme {
            FaxScheme::Rle => {}
            FaxScheme::Group3_1D => {
                for _ in 0..RTC_EOLS {
                    self.put_eol();
                }
            }
            FaxScheme::Group3_2D => {
                for _ in 0..RTC_EOLS {
                    self.put_eol();
                    self.writer.put_bit(1);
                }
            }
            FaxScheme::Group4 => {
                // End of facsimile block.
                self.put_eol();
                self.put_eol();
            }
        }
        self.writer.align_to_byte();
        self.writer.into_bytes()
    }

    fn put_eol(&mut self) {
        self.writer.put_code(EOL_CODE, EOL_BITS);
    }

    fn put_mode(&mut self, mode: Mode) {
        let (code, bits) = mode.code();
        self.writer.put_code(code, bits);
    }

    fn put_run(&mut self, white: bool, mut run: u32) {
        while run >= REPEAT_MAKEUP_FROM {
            let code = makeup_code(white, LONGEST_MAKEUP);
            self.writer.put_code(code.code.into(), code.bits.into());
            run -= LONGEST_MAKEUP;
        }
        if run >= 64 {
            let code = makeup_code(white, run & !63);
            self.writer.put_code(code.code.into(), code.bits.into());
            run &= 63;
        }
        let code = terminating_code(white, run);
        self.writer.put_code(code.code.into(), code.bits.into());
    }

    fn encode_1d(&mut self, current: &ChangingElements) {
        let width = self.options.width;
        let mut start = 0;
        let mut white = true;
        for &pos in current.positions() {
            self.put_run(white, pos - start);
            start = pos;
            white = !white;
        }
        self.put_run(white, width - start);
    }

    fn encode_2d(&mut self, current: &ChangingElements) {
        let width = self.options.width;
        let reference = mem::take(&mut self.reference);
        let mut a0: Option<u32> = None;
        let mut white = true;

        while a0.map_or(true, |a0| a0 < width) {
            let a1 = current.next_after(a0, width);
            let (b1, b2) = reference.b1_b2(a0, white, width);

            if b2 < a1 {
                self.put_mode(Mode::Pass);
                a0 = Some(b2);
            } else if a1.abs_diff(b1) <= 3 {
                self.put_mode(Mode::Vertical((i64::from(a1) - i64::from(b1)) as i8));
                a0 = Some(a1);
                white = !white;
            } else {
                let a2 = current.next_after(Some(a1), width);
                let start = a0.unwrap_or(0);
                self.put_mode(Mode::Horizontal);
                self.put_run(white, a1 - start);
                self.put_run(!white, a2 - a1);
                a0 = Some(a2);
            }
        }

        self.reference = reference;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fax::FaxDecoder;

    // 25 pixels: 10 white, 5 black, 10 white.
    const ROW: [u8; 4] = [0x00, 0x3E, 0x00, 0x00];

    fn pattern(width: u32, height: u32) -> Vec<u8> {
        let row_bytes = width.div_ceil(8) as usize;
        let mut rows = vec![0u8; row_bytes * height as usize];
        for y in 0..height {
            for x in 0..width {
                let black = (x * x + 3 * y) % 11 < 4 || (x > 40 && x < 2900 && y % 3 == 0);
                if black {
                    rows[y as usize * row_bytes + (x / 8) as usize] |= 0x80 >> (x % 8);
                }
            }
        }
        // Clear the padding bits.
        if width % 8 != 0 {
            for y in 0..height as usize {
                rows[y * row_bytes + row_bytes - 1] &= 0xFF << (8 - width % 8);
            }
        }
        rows
    }

    fn round_trip(scheme: FaxScheme, width: u32, height: u32) {
        let options = FaxOptions::new(scheme, width);
        let rows = pattern(width, height);
        let row_bytes = width.div_ceil(8) as usize;

        let mut encoder = FaxEncoder::new(options);
        for row in rows.chunks(row_bytes) {
            encoder.encode_row(row);
        }
        let data = encoder.finish();

        let mut decoder = FaxDecoder::new(options);
        let mut out = vec![0; rows.len()];
        let decoded = decoder.decode_strip(&data, &mut out).unwrap();
        assert_eq!(decoded, height as usize, "{:?}", scheme);
        assert_eq!(out, rows, "{:?}", scheme);
    }

    #[test]
    fn every_scheme_round_trips() {
        for scheme in [
            FaxScheme::Rle,
            FaxScheme::Group3_1D,
            FaxScheme::Group3_2D,
            FaxScheme::Group4,
        ] {
            round_trip(scheme, 61, 17);
            round_trip(scheme, 3000, 5);
        }
    }

    #[test]
    fn group4_rows_use_vertical_modes() {
        let mut encoder = FaxEncoder::new(FaxOptions::new(FaxScheme::Group4, 25));
        encoder.encode_row(&ROW);
        encoder.encode_row(&ROW);
        let data = encoder.finish();
        // 001 00111 0011 1 | 111 | EOL EOL
        assert_eq!(data, vec![0b0010_0111, 0b0011_1111, 0x00, 0x10, 0x01]);
    }

    #[test]
    fn long_runs_repeat_the_longest_makeup() {
        let mut encoder = FaxEncoder::new(FaxOptions::new(FaxScheme::Rle, 5200));
        encoder.encode_row(&vec![0; 650]);
        let data = encoder.finish();
        // 2560 + 2560 + 64 + 16 white.
        let mut decoder = FaxDecoder::new(FaxOptions::new(FaxScheme::Rle, 5200));
        let mut out = vec![0xFF; 650];
        assert_eq!(decoder.decode_strip(&data, &mut out).unwrap(), 1);
        assert!(out.iter().all(|&b| b == 0));
    }
}
