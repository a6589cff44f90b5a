use crate::encoder::compression::*;
use crate::rle::pack_runs;

/// Compressor that uses the Packbits[^note] algorithm to compress bytes.
///
/// [^note]: PackBits is often ineffective on continuous tone images,
///          including many grayscale images. In such cases, it is better
///          to leave the image uncompressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Packbits;

impl CompressionAlgorithm for Packbits {
    fn write_to<W: Write>(&mut self, writer: &mut W, bytes: &[u8]) -> ImageResult<u64> {
        let mut packed = Vec::with_capacity(bytes.len() + bytes.len() / 128 + 1);
        pack_runs(bytes, &mut packed);
        writer.write_all(&packed)?;
        Ok(packed.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::stream::unpack_bits;
    use crate::encoder::compression::tests::TEST_DATA;

    #[test]
    fn test_packbits_single_byte() {
        let mut compressed_data = Vec::<u8>::new();
        Packbits.write_to(&mut compressed_data, &[0x3F]).unwrap();
        assert_eq!(compressed_data, vec![0x00, 0x3F]);
    }

    #[test]
    fn test_packbits_rept() {
        // Takes 7 bytes and compresses them into 2 bytes
        let data = b"\x00\x0F\x0F\x0F\x0F\x0F\x0F";
        let mut compressed_data = Vec::<u8>::new();
        Packbits.write_to(&mut compressed_data, data).unwrap();
        assert_eq!(compressed_data, vec![0x00, 0x00, 0xFB, 0x0F]);
    }

    #[test]
    fn test_packbits_large_rept() {
        let data = [0x0Fu8; 260];
        let mut compressed_data = Vec::<u8>::new();
        Packbits.write_to(&mut compressed_data, &data).unwrap();
        assert_eq!(compressed_data, vec![0x81, 0x0F, 0x81, 0x0F, 0xFD, 0x0F]);
    }

    #[test]
    fn test_packbits_round_trip() {
        let mut compressed_data = Vec::<u8>::new();
        let written = Packbits.write_to(&mut compressed_data, TEST_DATA).unwrap();
        assert_eq!(written as usize, compressed_data.len());
        assert_eq!(unpack_bits(&compressed_data, 1000).unwrap(), TEST_DATA);
    }
}
