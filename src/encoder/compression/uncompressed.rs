use crate::encoder::compression::*;

/// The default algorithm which does not compress at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Uncompressed;

impl CompressionAlgorithm for Uncompressed {
    fn write_to<W: Write>(&mut self, writer: &mut W, bytes: &[u8]) -> ImageResult<u64> {
        writer.write_all(bytes)?;
        Ok(bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::compression::tests::TEST_DATA;

    #[test]
    fn test_no_compression() {
        let mut compressed_data = Vec::<u8>::new();
        let written = Uncompressed.write_to(&mut compressed_data, TEST_DATA).unwrap();
        assert_eq!(written, TEST_DATA.len() as u64);
        assert_eq!(TEST_DATA, compressed_data);
    }
}
