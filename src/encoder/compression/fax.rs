use crate::encoder::compression::*;
use crate::fax::FaxEncoder;

/// CCITT compression of bilevel strips.
///
/// Strips hold whole rows of `ceil(width / 8)` bytes with `1` meaning black.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fax {
    options: FaxOptions,
}

impl Fax {
    pub fn new(options: FaxOptions) -> Fax {
        Fax { options }
    }
}

impl CompressionAlgorithm for Fax {
    fn write_to<W: Write>(&mut self, writer: &mut W, bytes: &[u8]) -> ImageResult<u64> {
        let row_bytes = self.options.width.div_ceil(8) as usize;
        let mut encoder = FaxEncoder::new(self.options);
        if row_bytes > 0 {
            for row in bytes.chunks_exact(row_bytes) {
                encoder.encode_row(row);
            }
        }
        let data = encoder.finish();
        writer.write_all(&data)?;
        Ok(data.len() as u64)
    }
}
