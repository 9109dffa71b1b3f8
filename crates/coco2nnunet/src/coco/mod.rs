// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! # COCO Dataset Format Support
//!
//! Reading side of the COCO (Common Objects in Context) annotation format:
//! the document model and a JSON reader. Only what semantic segmentation
//! needs is covered (categories, images, polygon and RLE segmentations).
//!
//! ## Example
//!
//! ```rust,no_run
//! use coco2nnunet::coco::{CocoIndex, CocoReader};
//!
//! let dataset = CocoReader::new().read_json("train/_annotations.coco.json")?;
//! let index = CocoIndex::from_dataset(&dataset);
//! for image in &dataset.images {
//!     println!("{}: {} annotations", image.file_name,
//!              index.annotations_for_image(image.id).len());
//! }
//! # Ok::<(), coco2nnunet::Error>(())
//! ```

mod reader;
mod types;

pub use reader::{CocoReader, log_summary};
pub use types::{
    CocoAnnotation, CocoCategory, CocoCompressedRle, CocoDataset, CocoImage, CocoIndex, CocoInfo,
    CocoRle, CocoSegmentation,
};
