//! Byte order aware cursors and the PackBits strip reader.

use std::io::{self, Cursor, Read, Seek, Take};

use crate::error::{ImageResult, StreamError};

/// Byte order of the TIFF file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    /// little endian byte order
    LittleEndian,
    /// big endian byte order
    BigEndian,
}

macro_rules! read_fn {
    ($name:ident, $type:ty) => {
        /// reads an $type
        #[inline(always)]
        fn $name(&mut self) -> Result<$type, io::Error> {
            let mut n = [0u8; std::mem::size_of::<$type>()];
            self.read_exact(&mut n)?;
            Ok(match self.byte_order() {
                ByteOrder::LittleEndian => <$type>::from_le_bytes(n),
                ByteOrder::BigEndian => <$type>::from_be_bytes(n),
            })
        }
    };
}

/// Reader that is aware of the byte order.
pub trait EndianReader: Read {
    /// Byte order that should be adhered to
    fn byte_order(&self) -> ByteOrder;

    read_fn!(read_u16, u16);
    read_fn!(read_i16, i16);
    read_fn!(read_u32, u32);
    read_fn!(read_i32, i32);
    read_fn!(read_f32, f32);
    read_fn!(read_f64, f64);

    #[inline(always)]
    fn read_u8(&mut self) -> Result<u8, io::Error> {
        let mut n = [0u8; 1];
        self.read_exact(&mut n)?;
        Ok(n[0])
    }
}

///
/// ## PackBits Reader
///

#[derive(Clone, Copy, Debug)]
enum PackBitsReaderState {
    Header,
    Literal,
    Repeat { value: u8 },
}

/// Reader that unpacks Apple's `PackBits` format
///
/// Unlike the transport run-length code, `0x80` is a no-op here and the
/// stream simply ends with its input.
#[derive(Debug)]
pub struct PackBitsReader<R: Read> {
    reader: Take<R>,
    state: PackBitsReaderState,
    count: usize,
}

impl<R: Read> PackBitsReader<R> {
    /// Wraps a reader
    pub fn new(reader: R, length: u64) -> Self {
        Self {
            reader: reader.take(length),
            state: PackBitsReaderState::Header,
            count: 0,
        }
    }
}

impl<R: Read> Read for PackBitsReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while let PackBitsReaderState::Header = self.state {
            if self.reader.limit() == 0 {
                return Ok(0);
            }
            let mut header: [u8; 1] = [0];
            self.reader.read_exact(&mut header)?;
            let h = header[0] as i8;
            if (-127..=-1).contains(&h) {
                let mut data: [u8; 1] = [0];
                self.reader.read_exact(&mut data)?;
                self.state = PackBitsReaderState::Repeat { value: data[0] };
                self.count = (1 - h as isize) as usize;
            } else if h >= 0 {
                self.state = PackBitsReaderState::Literal;
                self.count = h as usize + 1;
            } else {
                // h = -128 is a no-op.
            }
        }

        let length = buf.len().min(self.count);
        let actual = match self.state {
            PackBitsReaderState::Literal => {
                let read = self.reader.read(&mut buf[..length])?;
                if read == 0 && length > 0 {
                    return Err(io::ErrorKind::UnexpectedEof.into());
                }
                read
            }
            PackBitsReaderState::Repeat { value } => {
                buf[..length].fill(value);
                length
            }
            PackBitsReaderState::Header => 0,
        };

        self.count -= actual;
        if self.count == 0 {
            self.state = PackBitsReaderState::Header;
        }
        Ok(actual)
    }
}

/// Unpack a whole PackBits strip, keeping at most `limit` bytes.
pub fn unpack_bits(data: &[u8], limit: usize) -> ImageResult<Vec<u8>> {
    let reader = PackBitsReader::new(data, data.len() as u64);
    let mut out = Vec::with_capacity(limit.min(data.len().saturating_mul(2)));
    reader
        .take(limit as u64)
        .read_to_end(&mut out)
        .map_err(|_| StreamError::UnexpectedEof)?;
    Ok(out)
}

///
/// ## SmartReader Reader
///

/// Reader that is aware of the byte order.
#[derive(Debug)]
pub struct SmartReader<R> {
    pub(super) reader: R,
    pub byte_order: ByteOrder,
}

impl<R> SmartReader<R> {
    /// Wraps a reader
    pub fn wrap(reader: R, byte_order: ByteOrder) -> SmartReader<R> {
        SmartReader { reader, byte_order }
    }
}

impl<'a> SmartReader<Cursor<&'a [u8]>> {
    /// A reader over `data`, starting at its first byte.
    pub fn over(data: &'a [u8], byte_order: ByteOrder) -> Self {
        SmartReader::wrap(Cursor::new(data), byte_order)
    }

    pub fn position(&self) -> u64 {
        self.reader.position()
    }
}

impl<R: Read + Seek> SmartReader<R> {
    pub fn goto_offset(&mut self, offset: u64) -> io::Result<()> {
        self.seek(io::SeekFrom::Start(offset)).map(|_| ())
    }
}

impl<R: Read> EndianReader for SmartReader<R> {
    #[inline(always)]
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }
}

impl<R: Read> Read for SmartReader<R> {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R: Read + Seek> Seek for SmartReader<R> {
    #[inline]
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_packbits() {
        let encoded = vec![
            0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22, 0xF7,
            0xAA,
        ];
        let encoded_len = encoded.len();

        let buff = io::Cursor::new(encoded);
        let mut decoder = PackBitsReader::new(buff, encoded_len as u64);

        let mut decoded = Vec::new();
        decoder.read_to_end(&mut decoded).unwrap();

        let expected = vec![
            0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0x22,
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
        ];
        assert_eq!(decoded, expected);
    }

    #[test]
    fn unpack_stops_at_limit() {
        let encoded = [0xF7, 0x11, 0x80, 0x01, 0x22, 0x33];
        assert_eq!(unpack_bits(&encoded, 4).unwrap(), vec![0x11; 4]);
        let all = unpack_bits(&encoded, 100).unwrap();
        assert_eq!(all.len(), 12);
        assert_eq!(&all[10..], &[0x22, 0x33]);
    }

    #[test]
    fn truncated_literal_is_an_error() {
        assert!(unpack_bits(&[0x05, 0x01, 0x02], 100).is_err());
    }

    #[test]
    fn endian_reads() {
        let data = [0x12, 0x34, 0x56, 0x78];
        let mut le = SmartReader::over(&data, ByteOrder::LittleEndian);
        assert_eq!(le.read_u16().unwrap(), 0x3412);
        let mut be = SmartReader::over(&data, ByteOrder::BigEndian);
        assert_eq!(be.read_u32().unwrap(), 0x1234_5678);
        assert!(be.read_u8().is_err());
    }
}
