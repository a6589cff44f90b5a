extern crate pixcodec;

use pixcodec::decoder::{DecodeOptions, Decoder, Limits};
use pixcodec::tags::{PhotometricInterpretation, Tag};
use pixcodec::{BitDepth, CompressionScheme, DirectoryError, ImageError, Resolution, Rgb};

#[derive(Clone, Debug)]
enum Field {
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(u32, u32),
    Ascii(&'static str),
}

impl Field {
    fn encode(&self) -> (u16, u32, Vec<u8>) {
        match self {
            Field::Short(v) => (3, v.len() as u32, v.iter().flat_map(|x| x.to_le_bytes()).collect()),
            Field::Long(v) => (4, v.len() as u32, v.iter().flat_map(|x| x.to_le_bytes()).collect()),
            Field::Rational(n, d) => (5, 1, [n.to_le_bytes(), d.to_le_bytes()].concat()),
            Field::Ascii(s) => {
                let mut bytes = s.as_bytes().to_vec();
                bytes.push(0);
                (2, bytes.len() as u32, bytes)
            }
        }
    }
}

/// A little endian TIFF with one directory. Strip tables are added from
/// `strips` unless `fields` carries its own.
fn tiff(fields: &[(Tag, Field)], strips: &[&[u8]]) -> Vec<u8> {
    let mut data = b"II*\0\0\0\0\0".to_vec();
    let mut offsets = Vec::new();
    let mut counts = Vec::new();
    for strip in strips {
        offsets.push(data.len() as u32);
        counts.push(strip.len() as u32);
        data.extend_from_slice(strip);
    }

    let mut fields: Vec<(u16, Field)> = fields.iter().map(|(t, f)| (t.to_u16(), f.clone())).collect();
    if !strips.is_empty() {
        fields.push((Tag::StripOffsets.to_u16(), Field::Long(offsets)));
        fields.push((Tag::StripByteCounts.to_u16(), Field::Long(counts)));
    }
    fields.sort_by_key(|(tag, _)| *tag);

    let mut entries = Vec::new();
    for (tag, field) in fields {
        let (type_, count, mut bytes) = field.encode();
        if bytes.len() > 4 {
            if data.len() % 2 == 1 {
                data.push(0);
            }
            let offset = data.len() as u32;
            data.extend_from_slice(&bytes);
            bytes = offset.to_le_bytes().to_vec();
        } else {
            bytes.resize(4, 0);
        }
        entries.push((tag, type_, count, bytes));
    }

    if data.len() % 2 == 1 {
        data.push(0);
    }
    let ifd = data.len() as u32;
    data[4..8].copy_from_slice(&ifd.to_le_bytes());
    data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, type_, count, value) in entries {
        data.extend_from_slice(&tag.to_le_bytes());
        data.extend_from_slice(&type_.to_le_bytes());
        data.extend_from_slice(&count.to_le_bytes());
        data.extend_from_slice(&value);
    }
    data.extend_from_slice(&0u32.to_le_bytes());
    data
}

fn short(v: u16) -> Field {
    Field::Short(vec![v])
}

fn long(v: u32) -> Field {
    Field::Long(vec![v])
}

fn size(width: u32, height: u32) -> Vec<(Tag, Field)> {
    vec![
        (Tag::ImageWidth, long(width)),
        (Tag::ImageLength, long(height)),
    ]
}

#[test]
fn fill_order_lsb_first() {
    let mut fields = size(8, 2);
    fields.push((Tag::PhotometricInterpretation, short(1)));
    fields.push((Tag::FillOrder, short(2)));
    let data = tiff(&fields, &[&[0x01, 0x80]]);

    let image = Decoder::new(&data).unwrap().read_image(BitDepth::One).unwrap();
    assert_eq!(image.row(0)[0], 0x80);
    assert_eq!(image.row(1)[0], 0x01);
}

#[test]
fn min_is_white_bilevel_is_inverted() {
    let data = tiff(&size(8, 1), &[&[0xF0]]);
    let mut decoder = Decoder::new(&data).unwrap();
    assert_eq!(
        decoder.photometric_interpretation(),
        PhotometricInterpretation::WhiteIsZero
    );
    let image = decoder.read_image(BitDepth::One).unwrap();
    assert_eq!(image.row(0)[0], 0x0F);
    assert_eq!(image.color(0, 0), Rgb::BLACK);
    assert_eq!(image.color(7, 0), Rgb::WHITE);
}

#[test]
fn packbits_strip() {
    let mut fields = size(24, 1);
    fields.push((Tag::Compression, short(0x8005)));
    fields.push((Tag::PhotometricInterpretation, short(1)));
    let data = tiff(&fields, &[&[0xFE, 0xAA]]);
    let mut decoder = Decoder::new(&data).unwrap();
    assert_eq!(decoder.compression(), CompressionScheme::PackBits);
    let image = decoder.read_image(BitDepth::One).unwrap();
    assert_eq!(&image.row(0)[..3], &[0xAA, 0xAA, 0xAA]);
}

fn palette_image(map: Vec<u16>) -> Vec<u8> {
    let mut fields = size(3, 1);
    fields.push((Tag::BitsPerSample, short(8)));
    fields.push((Tag::PhotometricInterpretation, short(3)));
    fields.push((Tag::ColorMap, Field::Short(map)));
    tiff(&fields, &[&[0, 1, 2]])
}

fn color_map(colors: &[(u16, u16, u16)]) -> Vec<u16> {
    let mut map = vec![0u16; 768];
    for (i, &(r, g, b)) in colors.iter().enumerate() {
        map[i] = r;
        map[256 + i] = g;
        map[512 + i] = b;
    }
    map
}

#[test]
fn color_map_depth_detection() {
    let eight = palette_image(color_map(&[(0, 0, 0), (255, 0, 0), (10, 20, 30)]));
    let image = pixcodec::decode(&eight, BitDepth::TwentyFour).unwrap();
    assert_eq!(image.color(1, 0), Rgb::new(255, 0, 0));
    assert_eq!(image.color(2, 0), Rgb::new(10, 20, 30));

    let sixteen = palette_image(color_map(&[
        (0, 0, 0),
        (0xFFFF, 0, 0),
        (10 << 8, 20 << 8, 30 << 8),
    ]));
    let image = pixcodec::decode(&sixteen, BitDepth::TwentyFour).unwrap();
    assert_eq!(image.color(1, 0), Rgb::new(255, 0, 0));
    assert_eq!(image.color(2, 0), Rgb::new(10, 20, 30));
}

#[test]
fn palette_without_color_map() {
    let mut fields = size(3, 1);
    fields.push((Tag::BitsPerSample, short(8)));
    fields.push((Tag::PhotometricInterpretation, short(3)));
    let data = tiff(&fields, &[&[0, 1, 2]]);
    let err = Decoder::new(&data).unwrap().read_image(BitDepth::Eight).unwrap_err();
    assert!(matches!(err, ImageError::MissingRequiredTag(Tag::ColorMap)));
}

#[test]
fn gray_into_every_depth() {
    let mut fields = size(4, 1);
    fields.push((Tag::BitsPerSample, short(8)));
    fields.push((Tag::PhotometricInterpretation, short(1)));
    let data = tiff(&fields, &[&[0, 64, 200, 255]]);

    let gray = pixcodec::decode(&data, BitDepth::Eight).unwrap();
    assert_eq!(&gray.row(0)[..4], &[0, 64, 200, 255]);

    let rgb = pixcodec::decode(&data, BitDepth::TwentyFour).unwrap();
    assert_eq!(rgb.color(2, 0), Rgb::gray(200));

    let bilevel = pixcodec::decode(&data, BitDepth::One).unwrap();
    assert_eq!(bilevel.color(0, 0), Rgb::BLACK);
    assert_eq!(bilevel.color(3, 0), Rgb::WHITE);
}

#[test]
fn rgb_samples() {
    let mut fields = size(2, 1);
    fields.push((Tag::BitsPerSample, Field::Short(vec![8, 8, 8])));
    fields.push((Tag::SamplesPerPixel, short(3)));
    fields.push((Tag::PhotometricInterpretation, short(2)));
    let data = tiff(&fields, &[&[1, 2, 3, 250, 251, 252]]);
    let mut decoder = Decoder::new(&data).unwrap();
    assert_eq!(decoder.bits_per_pixel(), 24);
    let image = decoder.read_image(BitDepth::TwentyFour).unwrap();
    assert_eq!(image.color(0, 0), Rgb::new(1, 2, 3));
    assert_eq!(image.color(1, 0), Rgb::new(250, 251, 252));
}

#[test]
fn resolution_in_centimeters() {
    let mut fields = size(8, 1);
    fields.push((Tag::XResolution, Field::Rational(118, 1)));
    fields.push((Tag::YResolution, Field::Rational(236, 2)));
    fields.push((Tag::ResolutionUnit, short(3)));
    let data = tiff(&fields, &[&[0]]);
    let decoder = Decoder::new(&data).unwrap();
    assert_eq!(decoder.resolution(), Some(Resolution { x: 46, y: 46 }));
}

#[test]
fn missing_strip_offsets() {
    let data = tiff(&size(8, 8), &[]);
    assert!(matches!(
        Decoder::new(&data),
        Err(ImageError::MissingRequiredTag(Tag::StripOffsets))
    ));
}

#[test]
fn inconsistent_strip_tables() {
    let mut fields = size(8, 2);
    fields.push((Tag::RowsPerStrip, long(1)));
    fields.push((Tag::StripOffsets, Field::Long(vec![8, 9])));
    fields.push((Tag::StripByteCounts, long(1)));
    let data = tiff(&fields, &[]);
    assert!(matches!(
        Decoder::new(&data),
        Err(ImageError::MalformedDirectory(DirectoryError::InconsistentStrips(2, 1)))
    ));
}

#[test]
fn strip_limit() {
    let mut fields = size(8, 3);
    fields.push((Tag::RowsPerStrip, long(1)));
    let data = tiff(&fields, &[&[0], &[1], &[2]]);
    assert!(Decoder::new(&data).is_ok());

    let mut limits = Limits::default();
    limits.max_strips = 2;
    let options = DecodeOptions {
        limits,
        ..DecodeOptions::default()
    };
    assert!(matches!(
        Decoder::with_options(&data, options),
        Err(ImageError::LimitsExceeded)
    ));
}

#[test]
fn strip_out_of_bounds() {
    let mut fields = size(8, 1);
    fields.push((Tag::StripOffsets, long(4000)));
    fields.push((Tag::StripByteCounts, long(1)));
    let data = tiff(&fields, &[]);
    let err = Decoder::new(&data).unwrap().read_image(BitDepth::One).unwrap_err();
    assert!(matches!(
        err,
        ImageError::MalformedDirectory(DirectoryError::OffsetOutOfBounds(4000))
    ));
}

#[test]
fn unsupported_layouts() {
    let mut fields = size(8, 1);
    fields.push((Tag::TileWidth, long(16)));
    let data = tiff(&fields, &[&[0]]);
    assert!(matches!(
        Decoder::new(&data),
        Err(ImageError::UnsupportedVariant(_))
    ));

    let mut fields = size(8, 1);
    fields.push((Tag::Compression, short(7)));
    let data = tiff(&fields, &[&[0]]);
    assert!(matches!(
        Decoder::new(&data),
        Err(ImageError::UnsupportedVariant(_))
    ));
}

#[test]
fn buffer_too_small() {
    let data = tiff(&size(16, 4), &[&[0; 8]]);
    let mut buffer = pixcodec::PixelBuffer::new(8, 4, BitDepth::One).unwrap();
    assert!(matches!(
        Decoder::new(&data).unwrap().decode_into(&mut buffer),
        Err(ImageError::BufferTooSmall(_, _))
    ));
}

#[test]
fn ascii_tags_and_buffer_limit() {
    let mut fields = size(64, 64);
    fields.push((Tag::Software, Field::Ascii("pixcodec test")));
    let data = tiff(&fields, &[&[0; 512]]);

    let decoder = Decoder::new(&data).unwrap();
    assert_eq!(decoder.get_tag_ascii_string(Tag::Software).unwrap(), "pixcodec test");

    let mut limits = Limits::default();
    limits.decoding_buffer_size = 64;
    let mut limited = Decoder::new(&data).unwrap().with_limits(limits);
    assert!(matches!(
        limited.read_image(BitDepth::Eight),
        Err(ImageError::LimitsExceeded)
    ));

    let mut unlimited = Decoder::new(&data).unwrap().with_limits(Limits::unlimited());
    assert!(unlimited.read_image(BitDepth::Eight).is_ok());
}

#[test]
fn empty_strip_is_skipped_wherever_it_points() {
    let mut fields = size(8, 2);
    fields.push((Tag::RowsPerStrip, long(1)));
    fields.push((Tag::StripOffsets, Field::Long(vec![4000, 4001])));
    fields.push((Tag::StripByteCounts, Field::Long(vec![0, 0])));
    let data = tiff(&fields, &[]);

    let mut buffer = pixcodec::PixelBuffer::new(8, 2, BitDepth::One).unwrap();
    buffer.row_mut(0)[0] = 0xA5;
    buffer.row_mut(1)[0] = 0x5A;
    Decoder::new(&data).unwrap().decode_into(&mut buffer).unwrap();
    assert_eq!(buffer.row(0)[0], 0xA5);
    assert_eq!(buffer.row(1)[0], 0x5A);
}
