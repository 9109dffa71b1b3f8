// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Run-length mask decoding.
//!
//! Runs alternate background/foreground starting with background and are
//! walked over the row-major pixel index of the target canvas.

use super::BinaryMask;
use crate::coco::{CocoCompressedRle, CocoRle};

/// Decode uncompressed RLE counts onto a `(height, width)` canvas.
///
/// Runs that extend past `height * width` are truncated at the canvas
/// boundary. A declared `size` that disagrees with the canvas is ignored.
pub fn decode_rle(rle: &CocoRle, height: u32, width: u32) -> BinaryMask {
    if let Some([h, w]) = rle.size
        && (h, w) != (height, width)
    {
        log::debug!(
            "RLE size {}x{} differs from canvas {}x{}, decoding onto the canvas",
            w,
            h,
            width,
            height
        );
    }

    let mut mask = BinaryMask::new(height, width);
    let total = mask.data.len();
    let mut pos = 0usize;

    for (i, &count) in rle.counts.iter().enumerate() {
        if pos >= total {
            break;
        }
        let end = pos.saturating_add(count as usize).min(total);
        if i % 2 == 1 {
            mask.data[pos..end].fill(1);
        }
        pos = end;
    }

    mask
}

/// Compressed RLE is not decoded.
///
/// Returns an all-zero mask of the requested size; the caller reports it.
pub fn decode_compressed_rle(compressed: &CocoCompressedRle, height: u32, width: u32) -> BinaryMask {
    log::debug!(
        "Compressed RLE format detected ({} byte counts string), using an empty mask",
        compressed.counts.len()
    );
    BinaryMask::new(height, width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rle(counts: Vec<u32>) -> CocoRle {
        CocoRle { counts, size: None }
    }

    #[test]
    fn test_decode_row_major() {
        // 3x4 canvas: skip 2, cover 5, skip 1, cover 2.
        let mask = decode_rle(&rle(vec![2, 5, 1, 2]), 3, 4);
        assert_eq!(mask.data(), &[0, 0, 1, 1, 1, 1, 1, 0, 1, 1, 0, 0]);
        assert!(mask.get(1, 0));
        assert!(!mask.get(1, 3));
    }

    #[test]
    fn test_decode_leading_foreground() {
        let mask = decode_rle(&rle(vec![0, 3, 1]), 2, 2);
        assert_eq!(mask.data(), &[1, 1, 1, 0]);
    }

    #[test]
    fn test_decode_truncates_overflow() {
        let mask = decode_rle(&rle(vec![2, 100, 7, 9]), 2, 3);
        assert_eq!(mask.data(), &[0, 0, 1, 1, 1, 1]);

        let mask = decode_rle(&rle(vec![1, u32::MAX]), 2, 2);
        assert_eq!(mask.count(), 3);
    }

    #[test]
    fn test_decode_short_counts_leave_background() {
        let mask = decode_rle(&rle(vec![1, 1]), 2, 2);
        assert_eq!(mask.data(), &[0, 1, 0, 0]);
    }

    #[test]
    fn test_decode_ignores_mismatched_size() {
        let mask = decode_rle(
            &CocoRle {
                counts: vec![0, 4],
                size: Some([10, 10]),
            },
            2,
            2,
        );
        assert_eq!(mask.count(), 4);
    }

    #[test]
    fn test_compressed_returns_empty_mask() {
        let compressed = CocoCompressedRle {
            counts: "0`0b0".to_string(),
            size: Some([3, 5]),
        };
        let mask = decode_compressed_rle(&compressed, 3, 5);
        assert_eq!((mask.height(), mask.width()), (3, 5));
        assert!(mask.is_empty());
    }
}
