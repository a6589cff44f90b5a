//! Function for reading TIFF tags

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use super::stream::{ByteOrder, EndianReader, SmartReader};
use super::Limits;
use crate::error::{DirectoryError, ImageError, ImageResult};
use crate::tags::{Tag, Type};

use self::Value::{
    Ascii, Byte, Double, Float, List, Rational, SRational, Short, Signed, Unsigned,
};

#[allow(unused_qualifications)]
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    Byte(u8),
    Short(u16),
    Signed(i32),
    Unsigned(u32),
    Float(f32),
    Double(f64),
    List(Vec<Value>),
    Rational(u32, u32),
    SRational(i32, i32),
    Ascii(String),
}

impl Value {
    pub fn into_u16(self) -> Option<u16> {
        match self {
            Byte(val) => Some(val.into()),
            Short(val) => Some(val),
            Unsigned(val) => u16::try_from(val).ok(),
            List(mut vec) if vec.len() == 1 => vec.pop().and_then(Value::into_u16),
            _ => None,
        }
    }

    pub fn into_u32(self) -> Option<u32> {
        match self {
            Byte(val) => Some(val.into()),
            Short(val) => Some(val.into()),
            Unsigned(val) => Some(val),
            List(mut vec) if vec.len() == 1 => vec.pop().and_then(Value::into_u32),
            _ => None,
        }
    }

    pub fn into_rational(self) -> Option<(u32, u32)> {
        match self {
            Rational(n, d) => Some((n, d)),
            Unsigned(val) => Some((val, 1)),
            Short(val) => Some((val.into(), 1)),
            List(mut vec) if !vec.is_empty() => vec.swap_remove(0).into_rational(),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Ascii(val) => Some(val),
            _ => None,
        }
    }

    pub fn into_u32_vec(self) -> Option<Vec<u32>> {
        match self {
            List(vec) => vec.into_iter().map(Value::into_u32).collect(),
            val => val.into_u32().map(|v| vec![v]),
        }
    }

    pub fn into_u16_vec(self) -> Option<Vec<u16>> {
        match self {
            List(vec) => vec.into_iter().map(Value::into_u16).collect(),
            val => val.into_u16().map(|v| vec![v]),
        }
    }
}

/// One directory entry: field type, value count and the raw value or offset field.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub(crate) type_: Type,
    pub(crate) count: u32,
    offset: [u8; 4],
}

impl ::std::fmt::Debug for Entry {
    fn fmt(&self, fmt: &mut ::std::fmt::Formatter) -> Result<(), ::std::fmt::Error> {
        fmt.write_str(&format!(
            "Entry {{ type_: {:?}, count: {:?}, offset: {:?} }}",
            self.type_, self.count, &self.offset
        ))
    }
}

impl Entry {
    pub fn new(type_: Type, count: u32, offset: [u8; 4]) -> Entry {
        Entry {
            type_,
            count,
            offset,
        }
    }

    pub fn field_type(&self) -> Type {
        self.type_
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    #[inline(always)]
    pub(crate) fn value_bytes(&self) -> ImageResult<usize> {
        (self.count as usize)
            .checked_mul(self.type_.byte_len())
            .ok_or(ImageError::LimitsExceeded)
    }

    /// The value field read as an offset into the file.
    pub(crate) fn offset(&self, bo: ByteOrder) -> u32 {
        match bo {
            ByteOrder::LittleEndian => u32::from_le_bytes(self.offset),
            ByteOrder::BigEndian => u32::from_be_bytes(self.offset),
        }
    }

    /// Read the value of this entry from `data`, the whole file.
    ///
    /// Values of at most four bytes sit in the entry itself, longer ones at
    /// the offset it holds.
    pub fn val(&self, limits: &Limits, data: &[u8], bo: ByteOrder) -> ImageResult<Value> {
        let value_bytes = self.value_bytes()?;
        if value_bytes > limits.ifd_value_size {
            return Err(ImageError::LimitsExceeded);
        }

        let bytes = if value_bytes <= 4 {
            &self.offset[..value_bytes]
        } else {
            let start = self.offset(bo) as usize;
            start
                .checked_add(value_bytes)
                .and_then(|end| data.get(start..end))
                .ok_or(DirectoryError::OffsetOutOfBounds(start as u64))?
        };

        let mut reader = SmartReader::wrap(Cursor::new(bytes), bo);
        self.val_from_cursor(&mut reader)
            .map_err(|_| DirectoryError::OffsetOutOfBounds(u64::from(self.offset(bo))).into())
    }

    fn val_from_cursor<R: Read>(&self, reader: &mut SmartReader<R>) -> std::io::Result<Value> {
        if self.type_ == Type::ASCII {
            let mut out = vec![0; self.count as usize];
            reader.read_exact(&mut out)?;
            // Strings may be null-terminated, so we trim anything downstream of the null byte
            if let Some(first) = out.iter().position(|&b| b == 0) {
                out.truncate(first);
            }
            return Ok(Ascii(String::from_utf8_lossy(&out).into_owned()));
        }

        let mut values = Vec::with_capacity(self.count as usize);
        for _ in 0..self.count {
            values.push(match self.type_ {
                Type::BYTE | Type::UNDEFINED => Byte(reader.read_u8()?),
                Type::SBYTE => Signed(i32::from(reader.read_u8()? as i8)),
                Type::SHORT => Short(reader.read_u16()?),
                Type::SSHORT => Signed(i32::from(reader.read_i16()?)),
                Type::LONG | Type::IFD => Unsigned(reader.read_u32()?),
                Type::SLONG => Signed(reader.read_i32()?),
                Type::FLOAT => Float(reader.read_f32()?),
                Type::DOUBLE => Double(reader.read_f64()?),
                Type::RATIONAL => Rational(reader.read_u32()?, reader.read_u32()?),
                Type::SRATIONAL => SRational(reader.read_i32()?, reader.read_i32()?),
                Type::ASCII => Byte(reader.read_u8()?),
            });
        }

        if values.len() == 1 {
            Ok(values.remove(0))
        } else {
            Ok(List(values))
        }
    }
}

/// An Image File Directory (IFD).
///
/// Entries are keyed by tag number in ascending order. The decoder does not
/// mind unordered entries in the file.
#[doc(alias = "IFD")]
#[derive(Clone, Debug, Default)]
pub struct Directory {
    pub(crate) entries: BTreeMap<u16, Entry>,
    pub(crate) next_ifd: Option<u32>,
}

impl Directory {
    pub fn empty() -> Self {
        Directory::default()
    }

    /// Retrieve the entry of a tag.
    pub fn get(&self, tag: Tag) -> Option<&Entry> {
        self.entries.get(&tag.to_u16())
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.entries.contains_key(&tag.to_u16())
    }

    /// Iterate over all known and unknown tags in this directory.
    pub fn iter(&self) -> impl Iterator<Item = (Tag, &Entry)> + '_ {
        self.entries
            .iter()
            .map(|(k, v)| (Tag::from_u16_exhaustive(*k), v))
    }

    pub fn insert(&mut self, tag: Tag, entry: Entry) {
        self.entries.insert(tag.to_u16(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset of the following directory, if any.
    pub fn next(&self) -> Option<u32> {
        self.next_ifd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_and_offset_values() {
        let limits = Limits::default();
        let data = [0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 2, 0, 3, 0];

        let inline = Entry::new(Type::SHORT, 2, [7, 0, 9, 0]);
        assert_eq!(
            inline.val(&limits, &data, ByteOrder::LittleEndian).unwrap(),
            List(vec![Short(7), Short(9)])
        );

        let out_of_line = Entry::new(Type::SHORT, 3, [8, 0, 0, 0]);
        let value = out_of_line
            .val(&limits, &data, ByteOrder::LittleEndian)
            .unwrap();
        assert_eq!(value.into_u32_vec(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn offset_beyond_data_is_rejected() {
        let entry = Entry::new(Type::LONG, 4, [0, 0, 0, 200]);
        let err = entry
            .val(&Limits::default(), &[0; 16], ByteOrder::BigEndian)
            .unwrap_err();
        assert!(matches!(
            err,
            ImageError::MalformedDirectory(DirectoryError::OffsetOutOfBounds(200))
        ));
    }

    #[test]
    fn value_size_is_limited() {
        let mut limits = Limits::default();
        limits.ifd_value_size = 16;
        let entry = Entry::new(Type::RATIONAL, 3, [0; 4]);
        assert!(matches!(
            entry.val(&limits, &[0; 64], ByteOrder::BigEndian),
            Err(ImageError::LimitsExceeded)
        ));
    }

    #[test]
    fn strings_stop_at_nul() {
        let entry = Entry::new(Type::ASCII, 4, *b"ab\0c");
        let value = entry
            .val(&Limits::default(), &[], ByteOrder::LittleEndian)
            .unwrap();
        assert_eq!(value.into_string().as_deref(), Some("ab"));
    }
}
