use std::io::{self, Seek, SeekFrom, Write};

/// Little endian writer that keeps track of its position in the file.
#[derive(Debug)]
pub struct TiffWriter<W> {
    writer: W,
    offset: u64,
}

impl<W: Write> TiffWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, offset: 0 }
    }

    pub fn write_header(&mut self) -> Result<(), io::Error> {
        self.write_bytes(b"II")?;
        self.write_u16(42)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), io::Error> {
        self.writer.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    pub fn write_u16(&mut self, n: u16) -> Result<(), io::Error> {
        self.write_bytes(&n.to_le_bytes())
    }

    pub fn write_u32(&mut self, n: u32) -> Result<(), io::Error> {
        self.write_bytes(&n.to_le_bytes())
    }

    pub fn pad_word_boundary(&mut self) -> Result<(), io::Error> {
        if self.offset % 4 != 0 {
            let padding = [0, 0, 0];
            let padd_len = 4 - (self.offset % 4);
            self.write_bytes(&padding[..padd_len as usize])?;
        }
        Ok(())
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Seek> TiffWriter<W> {
    pub fn goto_offset(&mut self, offset: u64) -> Result<(), io::Error> {
        self.writer.seek(SeekFrom::Start(offset))?;
        self.offset = offset;
        Ok(())
    }
}

impl<W: Write> Write for TiffWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.writer.write(buf)?;
        self.offset += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn pads_and_patches() {
        let mut writer = TiffWriter::new(Cursor::new(Vec::new()));
        writer.write_header().unwrap();
        writer.write_bytes(&[1]).unwrap();
        writer.pad_word_boundary().unwrap();
        assert_eq!(writer.offset(), 8);
        writer.goto_offset(4).unwrap();
        writer.write_u16(0xBEEF).unwrap();
        let data = writer.into_inner().into_inner();
        assert_eq!(data, vec![b'I', b'I', 42, 0, 0xEF, 0xBE, 0, 0]);
    }
}
