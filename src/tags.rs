//! TIFF tag numbers and the enumerated values of the tags this crate interprets.

macro_rules! tags {
    {
        // Permit arbitrary meta items, which include documentation.
        $( #[$enum_attr:meta] )*
        $vis:vis enum $name:ident $(unknown(#[$unknown_meta:meta] $unknown_doc:ident))* {
            // Each of the `Name = Val,` permitting documentation.
            $($(#[$ident_attr:meta])* $tag:ident = $val:expr,)*
        }
    } => {
        $( #[$enum_attr] )*
        #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
        #[non_exhaustive]
        pub enum $name {
            $($(#[$ident_attr])* $tag,)*
            $(
                #[$unknown_meta]
                Unknown(u16),
            )*
        }

        impl $name {
            /// Map a raw field value, `None` if the value has no name.
            #[inline(always)]
            pub const fn from_u16(n: u16) -> Option<Self> {
                match n {
                    $( $val => Some($name::$tag), )*
                    _ => None,
                }
            }

            $(
            /// Map a raw field value, keeping unnamed values.
            #[inline(always)]
            pub const fn from_u16_exhaustive($unknown_doc: u16) -> Self {
                match Self::from_u16($unknown_doc) {
                    Some(v) => v,
                    None => $name::Unknown($unknown_doc),
                }
            }
            )*

            #[inline(always)]
            pub const fn to_u16(&self) -> u16 {
                match *self {
                    $( $name::$tag => $val, )*
                    $( $name::Unknown($unknown_doc) => { $unknown_doc }, )*
                }
            }
        }
    };
}

tags! {
/// TIFF tags used by the decoder and encoder.
pub enum Tag unknown(
    /// A tag this crate does not interpret
    unknown
) {
    NewSubfileType = 254,
    ImageWidth = 256,
    ImageLength = 257,
    BitsPerSample = 258,
    Compression = 259,
    PhotometricInterpretation = 262,
    FillOrder = 266,
    ImageDescription = 270,
    StripOffsets = 273,
    Orientation = 274,
    SamplesPerPixel = 277,
    RowsPerStrip = 278,
    StripByteCounts = 279,
    XResolution = 282,
    YResolution = 283,
    PlanarConfiguration = 284,
    /// Called Group3Options before TIFF 6.0.
    T4Options = 292,
    /// Called Group4Options before TIFF 6.0.
    T6Options = 293,
    ResolutionUnit = 296,
    Software = 305,
    Predictor = 317,
    ColorMap = 320,
    TileWidth = 322,
}
}

tags! {
/// The type of an IFD entry (a 2 byte field).
pub enum Type {
    /// 8-bit unsigned integer
    BYTE = 1,
    /// 8-bit byte that contains a 7-bit ASCII code; the last byte must be zero
    ASCII = 2,
    /// 16-bit unsigned integer
    SHORT = 3,
    /// 32-bit unsigned integer
    LONG = 4,
    /// Fraction stored as two 32-bit unsigned integers
    RATIONAL = 5,
    /// 8-bit signed integer
    SBYTE = 6,
    /// 8-bit byte that may contain anything, depending on the field
    UNDEFINED = 7,
    /// 16-bit signed integer
    SSHORT = 8,
    /// 32-bit signed integer
    SLONG = 9,
    /// Fraction stored as two 32-bit signed integers
    SRATIONAL = 10,
    /// 32-bit IEEE floating point
    FLOAT = 11,
    /// 64-bit IEEE floating point
    DOUBLE = 12,
    /// 32-bit unsigned integer (offset)
    IFD = 13,
}
}

impl Type {
    pub(crate) fn byte_len(&self) -> usize {
        match *self {
            Type::BYTE | Type::SBYTE | Type::ASCII | Type::UNDEFINED => 1,
            Type::SHORT | Type::SSHORT => 2,
            Type::LONG | Type::SLONG | Type::FLOAT | Type::IFD => 4,
            Type::DOUBLE | Type::RATIONAL | Type::SRATIONAL => 8,
        }
    }
}

tags! {
/// See [TIFF compression tags](https://www.awaresystems.be/imaging/tiff/tifftags/compression.html)
/// for reference.
pub enum CompressionMethod unknown(
    /// A compression method without a decoder here
    unknown
) {
    None = 1,
    /// CCITT modified Huffman run length encoding, byte aligned rows.
    Huffman = 2,
    Fax3 = 3,
    Fax4 = 4,
    LZW = 5,
    PackBits = 0x8005,
}
}

tags! {
pub enum PhotometricInterpretation unknown(
    /// Any other colour space
    unknown
) {
    WhiteIsZero = 0,
    BlackIsZero = 1,
    RGB = 2,
    RGBPalette = 3,
}
}

tags! {
pub enum Predictor unknown(
    /// Floating point or private predictors
    unknown
) {
    /// No changes were made to the data
    None = 1,
    /// The images' rows were processed to contain the difference of each pixel from the previous one.
    ///
    /// This means that instead of having in order `[r1, g1. b1, r2, g2 ...]` you will find
    /// `[r1, g1, b1, r2-r1, g2-g1, b2-b1, r3-r2, g3-g2, ...]`
    Horizontal = 2,
}
}

tags! {
/// Type to represent resolution units
pub enum ResolutionUnit {
    None = 1,
    Inch = 2,
    Centimeter = 3,
}
}

tags! {
/// Bit order inside each byte of a strip.
pub enum FillOrder {
    /// Lower column values are stored in the higher-order bits.
    MsbFirst = 1,
    /// Lower column values are stored in the lower-order bits.
    LsbFirst = 2,
}
}

/// T4Options bit: rows may be coded two-dimensionally.
pub const T4_OPTION_2D: u32 = 0x1;
/// T4Options / T6Options bit: the uncompressed escape may appear.
pub const FAX_OPTION_UNCOMPRESSED: u32 = 0x2;
