extern crate pixcodec;

use pixcodec::bits::{BitOrder, BitWriter};
use pixcodec::gif::GifDecoder;
use pixcodec::{decode, image_info, BitDepth, ImageFormat, Rgb};

/// Screen and image of `width` x `height` with a global table and no compression gain.
fn gif(width: u16, height: u16, table: &[Rgb], interlaced: bool, indices: &[u8]) -> Vec<u8> {
    let size_bits = (table.len().trailing_zeros() - 1) as u8;
    let mut data = b"GIF87a".to_vec();
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.extend_from_slice(&[0x80 | 0x70 | size_bits, 0, 0]);
    for c in table {
        data.extend_from_slice(&[c.r, c.g, c.b]);
    }
    // comment extension
    data.extend_from_slice(&[0x21, 0xFE, 3, b'a', b'b', b'c', 0]);
    data.push(0x2C);
    data.extend_from_slice(&[0, 0, 0, 0]);
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.push(if interlaced { 0x40 } else { 0 });

    let min_code_size = size_bits.max(1) + 1;
    let clear = 1u32 << min_code_size;
    let code_width = u32::from(min_code_size) + 1;
    let mut writer = BitWriter::new(BitOrder::Lsb);
    for chunk in indices.chunks((clear - 2) as usize) {
        writer.put_code(clear, code_width);
        for &i in chunk {
            writer.put_code(u32::from(i), code_width);
        }
    }
    writer.put_code(clear + 1, code_width);

    data.push(min_code_size);
    for block in writer.into_bytes().chunks(255) {
        data.push(block.len() as u8);
        data.extend_from_slice(block);
    }
    data.extend_from_slice(&[0, 0x3B]);
    data
}

fn palette() -> Vec<Rgb> {
    vec![
        Rgb::BLACK,
        Rgb::WHITE,
        Rgb::new(200, 0, 0),
        Rgb::new(0, 200, 0),
    ]
}

fn checkerboard(width: usize, height: usize) -> Vec<u8> {
    (0..height)
        .flat_map(|y| (0..width).map(move |x| ((x + y) % 4) as u8))
        .collect()
}

#[test]
fn info() {
    let data = gif(20, 10, &palette(), false, &checkerboard(20, 10));
    let info = image_info(&data).unwrap();
    assert_eq!(info.format, ImageFormat::Gif);
    assert_eq!((info.width, info.height), (20, 10));
    assert_eq!(info.bits_per_pixel, 2);
    assert_eq!(info.resolution, None);
}

#[test]
fn one_bit() {
    let data = gif(20, 10, &palette(), false, &checkerboard(20, 10));
    let image = decode(&data, BitDepth::One).unwrap();
    for (x, y) in [(0, 0), (1, 0), (3, 2), (5, 7)] {
        let expected = if (x + y) % 4 == 0 { Rgb::BLACK } else { Rgb::WHITE };
        assert_eq!(image.color(x, y), expected, "({}, {})", x, y);
    }
}

#[test]
fn four_bit() {
    let data = gif(9, 3, &palette(), false, &checkerboard(9, 3));
    let image = decode(&data, BitDepth::Four).unwrap();
    assert_eq!(image.pixel(2, 0), 2);
    assert_eq!(image.color(3, 0), Rgb::new(0, 200, 0));
}

#[test]
fn eight_bit() {
    let indices = checkerboard(600, 2);
    let data = gif(600, 2, &palette(), false, &indices);
    let image = decode(&data, BitDepth::Eight).unwrap();
    assert_eq!(&image.row(1)[..600], &indices[600..]);
    assert_eq!(image.palette().unwrap().entries(), &palette()[..]);
}

#[test]
fn twenty_four_bit() {
    let data = gif(5, 5, &palette(), false, &checkerboard(5, 5));
    let image = decode(&data, BitDepth::TwentyFour).unwrap();
    assert_eq!(image.color(2, 0), Rgb::new(200, 0, 0));
    assert_eq!(image.color(2, 1), Rgb::new(0, 200, 0));
}

#[test]
fn interlaced() {
    // Stream row n is filled with index n % 4.
    let height = 11;
    let indices: Vec<u8> = (0..height).flat_map(|n| [(n % 4) as u8; 3]).collect();
    let data = gif(3, height as u16, &palette(), true, &indices);
    let decoder = GifDecoder::new(&data).unwrap();
    assert!(decoder.is_interlaced());
    let image = decoder.decode(BitDepth::Eight).unwrap();

    // Pass order for 11 rows: 0, 8, 4, 2, 6, 10, 1, 3, 5, 7, 9.
    let order = [0u32, 8, 4, 2, 6, 10, 1, 3, 5, 7, 9];
    for (n, &y) in order.iter().enumerate() {
        assert_eq!(image.pixel(0, y), (n % 4) as u32, "row {}", y);
    }
}
