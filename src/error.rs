use std::io;

use quick_error::quick_error;

use crate::tags::Tag;

quick_error! {
    /// Image error kinds.
    #[derive(Debug)]
    #[non_exhaustive]
    pub enum ImageError {
        /// The buffer does not start with a known image signature.
        UnsupportedFormat {
            display("The buffer does not contain a supported image format")
        }
        /// A tag the decoder cannot do without is absent from the directory.
        MissingRequiredTag(tag: Tag) {
            display("Required tag `{:?}` not found", tag)
        }
        /// The image directory or header is not formatted properly.
        MalformedDirectory(err: DirectoryError) {
            display("Malformed directory: {}", err)
            from()
        }
        /// A compressed stream could not be decoded.
        CorruptEntropyStream(err: StreamError) {
            display("Corrupt compressed stream: {}", err)
            from()
        }
        /// A destination or working buffer cannot hold the result.
        BufferTooSmall(needed: usize, available: usize) {
            display("Buffer too small: {} bytes needed, {} available", needed, available)
        }
        /// The image is well formed but uses a combination this crate does not handle.
        UnsupportedVariant(what: String) {
            display("Unsupported image variant: {}", what)
        }
        /// The limits configured for decoding were exceeded.
        LimitsExceeded {
            display("The decoder limits are exceeded")
        }
        /// An I/O error occurred while writing an image.
        IoError(err: io::Error) {
            display("{}", err)
            source(err)
            from()
        }
    }
}

quick_error! {
    /// Reasons for `ImageError::MalformedDirectory`.
    #[derive(Debug, Clone, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum DirectoryError {
        /// Header is shorter than the format requires.
        TruncatedHeader {
            display("header is truncated")
        }
        /// TIFF byte order marker is neither `II` nor `MM`.
        InvalidByteOrder {
            display("invalid byte order marker")
        }
        /// TIFF version is not 42.
        InvalidVersion(version: u16) {
            display("unsupported TIFF version {}", version)
        }
        /// An offset points outside the buffer.
        OffsetOutOfBounds(offset: u64) {
            display("offset {} lies outside the buffer", offset)
        }
        /// A tag holds a value of a type that cannot be interpreted for it.
        UnexpectedType(tag: Tag) {
            display("tag `{:?}` has an unexpected field type", tag)
        }
        /// A tag holds a value out of its valid range.
        InvalidValue(tag: Tag) {
            display("tag `{:?}` has an invalid value", tag)
        }
        /// Strip offset and strip byte count tables differ in length.
        InconsistentStrips(offsets: usize, byte_counts: usize) {
            display("{} strip offsets but {} strip byte counts", offsets, byte_counts)
        }
        /// The directory chain loops back on itself.
        CycleInOffsets {
            display("directory chain contains a cycle")
        }
        /// The requested image index does not exist.
        ImageIndexOutOfRange(index: usize) {
            display("image {} does not exist", index)
        }
        /// A GIF block is not an image descriptor, extension or trailer.
        UnknownBlock(introducer: u8) {
            display("unknown block introducer {:#04x}", introducer)
        }
        /// The file holds no image data.
        NoImage {
            display("no image found")
        }
    }
}

quick_error! {
    /// Reasons for `ImageError::CorruptEntropyStream`.
    #[derive(Debug, Clone, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum StreamError {
        /// The stream ended before the decoder was done.
        UnexpectedEof {
            display("unexpected end of data")
        }
        /// A bit sequence matches no code of the active table.
        InvalidCode {
            display("invalid code")
        }
        /// An LZW code refers beyond the current dictionary.
        LzwInvalidCode(code: u16, next: u16) {
            display("LZW code {} is beyond the next free entry {}", code, next)
        }
        /// The runs of a fax row add up to more than the image width.
        RowOverflow(total: u32, width: u32) {
            display("row length {} exceeds width {}", total, width)
        }
        /// The fax mode decoder reached an undefined code.
        ModeError {
            display("undefined fax mode code")
        }
        /// A run-length stream ended without its terminator.
        MissingTerminator {
            display("missing end of data marker")
        }
        /// The external JPEG codec failed.
        Jpeg(message: String) {
            display("JPEG: {}", message)
        }
    }
}

/// Result of an image decoding/encoding process
pub type ImageResult<T> = Result<T, ImageError>;
