#![no_main]
use libfuzzer_sys::fuzz_target;

use pixcodec::fax::{FaxDecoder, FaxOptions, FaxScheme};

fuzz_target!(|data: &[u8]| {
    let Some((&selector, stream)) = data.split_first() else {
        return;
    };
    let scheme = match selector % 4 {
        0 => FaxScheme::Rle,
        1 => FaxScheme::Group3_1D,
        2 => FaxScheme::Group3_2D,
        _ => FaxScheme::Group4,
    };
    let width = 1 + u32::from(selector) * 7;
    let mut options = FaxOptions::new(scheme, width);
    options.uncompressed = selector & 0x80 != 0;

    let mut decoder = FaxDecoder::new(options);
    let mut out = vec![0u8; decoder.row_bytes() * 64];
    let _ = decoder.decode_strip(stream, &mut out);
});
