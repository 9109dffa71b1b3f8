// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! COCO JSON data structures for serde deserialization.
//!
//! Only the subset needed for semantic segmentation is modelled: categories,
//! images and annotations with polygon or run-length segmentation. Fields
//! that commonly go missing in exported datasets are optional so that one
//! incomplete record never fails the whole document.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Top-level COCO dataset structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoDataset {
    /// Dataset metadata (optional but commonly present).
    #[serde(default)]
    pub info: CocoInfo,
    /// List of images in the dataset.
    #[serde(default)]
    pub images: Vec<CocoImage>,
    /// List of annotations (one per object instance).
    #[serde(default)]
    pub annotations: Vec<CocoAnnotation>,
    /// List of object categories/classes.
    #[serde(default)]
    pub categories: Vec<CocoCategory>,
}

/// Dataset metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoInfo {
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contributor: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
}

/// Image metadata.
///
/// `width` and `height` define the canvas of every label raster derived from
/// this image's annotations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoImage {
    /// Unique image ID.
    pub id: u64,
    /// Filename (relative path within the images folder).
    pub file_name: String,
    /// Image width in pixels.
    #[serde(default)]
    pub width: Option<u32>,
    /// Image height in pixels.
    #[serde(default)]
    pub height: Option<u32>,
}

impl CocoImage {
    /// Declared canvas as `(height, width)`, if both are present and nonzero.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.height, self.width) {
            (Some(h), Some(w)) if h > 0 && w > 0 => Some((h, w)),
            _ => None,
        }
    }
}

/// Category definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoCategory {
    /// Unique category ID.
    pub id: u32,
    /// Category name (e.g., "cyst", "kidney").
    pub name: String,
    /// Parent category name.
    #[serde(default)]
    pub supercategory: Option<String>,
}

/// Annotation for instance segmentation.
///
/// Each annotation covers a single region of one image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoAnnotation {
    /// Unique annotation ID.
    #[serde(default)]
    pub id: u64,
    /// ID of the image containing this region.
    pub image_id: u64,
    /// Category ID of this region.
    #[serde(default)]
    pub category_id: Option<u32>,
    /// Bounding box: `[x, y, width, height]` in pixels (top-left corner).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    /// Area of the segmentation mask in pixels².
    #[serde(default)]
    pub area: f64,
    /// Whether this is a crowd annotation (0 = single instance, 1 = crowd).
    #[serde(default)]
    pub iscrowd: u8,
    /// Segmentation mask (polygon or RLE format).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<CocoSegmentation>,
}

/// Segmentation format: polygon array or RLE.
///
/// Anything that matches neither shape is kept as raw JSON rather than
/// rejected, and is treated as a malformed annotation when rasterized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CocoSegmentation {
    /// Polygon format: `[[x1,y1,x2,y2,...], [x3,y3,...]]`
    ///
    /// Multiple polygons represent disjoint regions of the same object.
    Polygon(Vec<Vec<f64>>),
    /// Uncompressed RLE format with counts array.
    Rle(CocoRle),
    /// Compressed RLE format with string-encoded counts.
    CompressedRle(CocoCompressedRle),
    /// Unrecognised segmentation payload.
    Unrecognized(serde_json::Value),
}

/// Uncompressed RLE (Run-Length Encoding) segmentation.
///
/// The counts array alternates between background and foreground pixel runs,
/// starting with background, walked in row-major pixel order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocoRle {
    /// Run-length counts: `[bg_run, fg_run, bg_run, fg_run, ...]`
    pub counts: Vec<u32>,
    /// Image size as `[height, width]` (NOT `[width, height]`!)
    #[serde(default)]
    pub size: Option<[u32; 2]>,
}

/// Compressed RLE segmentation (string encoded counts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocoCompressedRle {
    /// Encoded counts string.
    pub counts: String,
    /// Image size as `[height, width]`.
    #[serde(default)]
    pub size: Option<[u32; 2]>,
}

/// Lookup tables over a borrowed `CocoDataset`.
#[derive(Debug, Clone)]
pub struct CocoIndex<'a> {
    /// `image_id` → `CocoImage`
    pub images: HashMap<u64, &'a CocoImage>,
    /// `category_id` → `CocoCategory`
    pub categories: HashMap<u32, &'a CocoCategory>,
    /// `image_id` → annotations in document order
    pub annotations_by_image: HashMap<u64, Vec<&'a CocoAnnotation>>,
    /// Annotations whose `image_id` matches no image record.
    pub orphans: Vec<&'a CocoAnnotation>,
}

impl<'a> CocoIndex<'a> {
    /// Build lookup index from a `CocoDataset`.
    pub fn from_dataset(dataset: &'a CocoDataset) -> Self {
        let images: HashMap<_, _> = dataset.images.iter().map(|img| (img.id, img)).collect();

        let categories: HashMap<_, _> = dataset
            .categories
            .iter()
            .map(|cat| (cat.id, cat))
            .collect();

        let mut annotations_by_image: HashMap<u64, Vec<&CocoAnnotation>> = HashMap::new();
        let mut orphans = Vec::new();
        for ann in &dataset.annotations {
            if images.contains_key(&ann.image_id) {
                annotations_by_image
                    .entry(ann.image_id)
                    .or_default()
                    .push(ann);
            } else {
                orphans.push(ann);
            }
        }

        Self {
            images,
            categories,
            annotations_by_image,
            orphans,
        }
    }

    /// Get the label name for a category ID.
    pub fn label_name(&self, category_id: u32) -> Option<&str> {
        self.categories
            .get(&category_id)
            .map(|c| c.name.as_str())
    }

    /// Get annotations for an image.
    pub fn annotations_for_image(&self, image_id: u64) -> &[&'a CocoAnnotation] {
        self.annotations_by_image
            .get(&image_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether at least one annotation references the image.
    pub fn is_annotated(&self, image_id: u64) -> bool {
        !self.annotations_for_image(image_id).is_empty()
    }

    /// Category ids referenced by annotations but absent from `categories`.
    pub fn undeclared_categories(&self) -> HashSet<u32> {
        self.annotations_by_image
            .values()
            .flatten()
            .filter_map(|ann| ann.category_id)
            .filter(|id| !self.categories.contains_key(id))
            .collect()
    }
}
