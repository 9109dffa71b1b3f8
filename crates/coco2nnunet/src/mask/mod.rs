// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Segmentation decoding and label raster compositing.
//!
//! - [`polygon`]: even-odd scan fill of COCO polygons
//! - [`rle`]: uncompressed run-length decoding (compressed RLE degrades to an
//!   empty mask)
//! - [`composite`]: priority-ordered overlay of every annotation of one image
//!   into a single-channel label raster
//!
//! Both raster types are row-major, one byte per pixel, indexed by
//! `(row, col)` within a `(height, width)` canvas.

pub mod composite;
pub mod polygon;
pub mod rle;

use crate::{
    Error,
    coco::CocoSegmentation,
    report::{Issue, IssueKind},
};
use image::GrayImage;
use std::collections::BTreeMap;

/// Largest canvas, in pixels, a raster may be allocated for.
pub const MAX_CANVAS_PIXELS: u64 = 1 << 28;

/// Pixel count of a `(height, width)` canvas, or `None` when it is empty or
/// larger than [`MAX_CANVAS_PIXELS`].
pub fn canvas_pixels(height: u32, width: u32) -> Option<usize> {
    let pixels = u64::from(height).checked_mul(u64::from(width))?;
    if pixels == 0 || pixels > MAX_CANVAS_PIXELS {
        return None;
    }
    usize::try_from(pixels).ok()
}

/// Binary coverage mask of one annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    height: u32,
    width: u32,
    data: Vec<u8>,
}

impl BinaryMask {
    /// All-zero mask of the given canvas.
    pub fn new(height: u32, width: u32) -> Self {
        Self {
            height,
            width,
            data: vec![0; height as usize * width as usize],
        }
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Row-major pixel data, 1 for covered and 0 otherwise.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the pixel is covered. Out-of-canvas coordinates are not.
    pub fn get(&self, row: u32, col: u32) -> bool {
        row < self.height && col < self.width && self.data[self.offset(row, col)] != 0
    }

    /// Number of covered pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&v| v == 0)
    }

    /// Element-wise maximum with another mask of the same canvas.
    pub fn union_with(&mut self, other: &BinaryMask) {
        debug_assert_eq!((self.height, self.width), (other.height, other.width));
        for (dst, &src) in self.data.iter_mut().zip(&other.data) {
            *dst = (*dst).max(src);
        }
    }

    /// Cover `[start, end)` of a row; the caller clips to the canvas.
    fn fill_span(&mut self, row: u32, start: u32, end: u32) {
        let base = row as usize * self.width as usize;
        self.data[base + start as usize..base + end as usize].fill(1);
    }

    fn offset(&self, row: u32, col: u32) -> usize {
        row as usize * self.width as usize + col as usize
    }
}

/// Single-channel per-pixel class-id raster.
///
/// 0 is background; every other value is the class id of exactly one
/// category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRaster {
    height: u32,
    width: u32,
    data: Vec<u8>,
}

impl LabelRaster {
    /// All-background raster of the given canvas.
    pub fn new(height: u32, width: u32) -> Self {
        Self {
            height,
            width,
            data: vec![0; height as usize * width as usize],
        }
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Class id at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the coordinate is outside the canvas.
    pub fn get(&self, row: u32, col: u32) -> u8 {
        assert!(row < self.height && col < self.width);
        self.data[row as usize * self.width as usize + col as usize]
    }

    /// Overwrite every pixel covered by `mask` with `value`.
    pub fn paint(&mut self, mask: &BinaryMask, value: u8) {
        debug_assert_eq!((self.height, self.width), (mask.height, mask.width));
        for (dst, &covered) in self.data.iter_mut().zip(&mask.data) {
            if covered != 0 {
                *dst = value;
            }
        }
    }

    /// Pixel count per class id present in the raster.
    pub fn histogram(&self) -> BTreeMap<u8, u64> {
        let mut counts = [0u64; 256];
        for &v in &self.data {
            counts[v as usize] += 1;
        }
        counts
            .iter()
            .enumerate()
            .filter(|(_, n)| **n > 0)
            .map(|(v, n)| (v as u8, *n))
            .collect()
    }

    /// Number of pixels holding `value`.
    pub fn count(&self, value: u8) -> u64 {
        self.data.iter().filter(|&&v| v == value).count() as u64
    }

    pub fn into_image(self) -> Result<GrayImage, Error> {
        let (width, height) = (self.width, self.height);
        GrayImage::from_raw(width, height, self.data).ok_or_else(|| {
            Error::InvalidParameters(format!(
                "raster buffer does not match {}x{} canvas",
                width, height
            ))
        })
    }

    pub fn from_image(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            height,
            width,
            data: image.into_raw(),
        }
    }
}

/// A decoded segmentation plus whatever was absorbed while decoding it.
#[derive(Debug, Clone)]
pub struct DecodedMask {
    pub mask: BinaryMask,
    pub issues: Vec<Issue>,
}

/// Decode any supported segmentation into a binary mask of the canvas.
///
/// Never fails: unsupported or malformed inputs yield an empty mask with an
/// issue describing why.
pub fn decode_segmentation(
    segmentation: &CocoSegmentation,
    height: u32,
    width: u32,
) -> DecodedMask {
    match segmentation {
        CocoSegmentation::Polygon(polygons) => {
            let raster = polygon::rasterize_polygons(polygons, height, width);
            let mut issues = Vec::new();
            if polygons.is_empty() {
                issues.push(Issue::new(
                    IssueKind::MalformedAnnotation,
                    "empty polygon list",
                ));
            } else if raster.rejected > 0 {
                issues.push(Issue::new(
                    IssueKind::MalformedAnnotation,
                    format!(
                        "{} of {} polygons skipped (fewer than 3 points or non-finite)",
                        raster.rejected,
                        polygons.len()
                    ),
                ));
            }
            if raster.clipped {
                issues.push(Issue::new(
                    IssueKind::GeometryOutOfBounds,
                    format!("polygon clipped to {}x{} canvas", width, height),
                ));
            }
            if raster.filled > 0 && raster.mask.is_empty() {
                issues.push(Issue::new(
                    IssueKind::MalformedAnnotation,
                    format!("polygon covers no pixel of the {}x{} canvas", width, height),
                ));
            } else if raster.outlined > 0 {
                log::debug!(
                    "{} polygons smaller than a pixel drawn by their outline",
                    raster.outlined
                );
            }
            DecodedMask {
                mask: raster.mask,
                issues,
            }
        }
        CocoSegmentation::Rle(rle) => DecodedMask {
            mask: rle::decode_rle(rle, height, width),
            issues: Vec::new(),
        },
        CocoSegmentation::CompressedRle(compressed) => DecodedMask {
            mask: rle::decode_compressed_rle(compressed, height, width),
            issues: vec![Issue::new(
                IssueKind::UnsupportedEncoding,
                "compressed RLE is not supported, using an empty mask",
            )],
        },
        CocoSegmentation::Unrecognized(value) => DecodedMask {
            mask: BinaryMask::new(height, width),
            issues: vec![Issue::new(
                IssueKind::MalformedAnnotation,
                format!("unrecognised segmentation: {}", truncate(&value.to_string(), 64)),
            )],
        },
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
