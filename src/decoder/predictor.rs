//! TIFF horizontal differencing for 8 bit samples.

/// Undo horizontal differencing on whole rows.
///
/// `data` holds rows of `row_bytes` bytes each; every sample is added to the
/// preceding sample of the same channel, `samples` channels per pixel.
pub fn rev_hpredict(data: &mut [u8], row_bytes: usize, samples: usize) {
    if row_bytes == 0 {
        return;
    }
    for row in data.chunks_mut(row_bytes) {
        for col in samples..row.len() {
            let prev_pixel = row[col - samples];
            row[col] = row[col].wrapping_add(prev_pixel);
        }
    }
}

/// Apply horizontal differencing to whole rows, the inverse of [`rev_hpredict`].
pub fn hpredict(data: &mut [u8], row_bytes: usize, samples: usize) {
    if row_bytes == 0 {
        return;
    }
    for row in data.chunks_mut(row_bytes) {
        for col in (samples..row.len()).rev() {
            let prev_pixel = row[col - samples];
            row[col] = row[col].wrapping_sub(prev_pixel);
        }
    }
}
