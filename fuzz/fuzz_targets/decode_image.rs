#![no_main]
use libfuzzer_sys::fuzz_target;

use pixcodec::decoder::{DecodeOptions, Decoder, Limits};
use pixcodec::BitDepth;

fuzz_target!(|data: &[u8]| {
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1_000_000;
    limits.ifd_value_size = 1_000_000;
    limits.max_images = 16;

    let options = DecodeOptions {
        limits,
        ..DecodeOptions::default()
    };
    if let Ok(mut decoder) = Decoder::with_options(data, options) {
        let _ = decoder.read_image(BitDepth::Eight);
    }

    if data.starts_with(b"GIF") && data.len() < 100_000 {
        let _ = pixcodec::decode(data, BitDepth::TwentyFour);
    }
});
