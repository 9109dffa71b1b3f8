// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! # COCO to nnU-Net Conversion Library
//!
//! Converts a COCO instance segmentation export (polygon or RLE annotations
//! over 2D images) into an nnU-Net v2 raw dataset: one image and one
//! single-channel label PNG per annotated image, a `dataset.json` manifest
//! and a `case_map.json` recording which source image became which case.
//!
//! Overlapping annotations are resolved by class priority. Every annotation
//! is painted in ascending priority order, so the class listed last in the
//! priority list wins any pixel it covers regardless of the order the
//! annotations appear in the document.
//!
//! ## Features
//!
//! - **COCO reading**: tolerant JSON model covering polygon, uncompressed RLE
//!   and compressed RLE segmentations
//! - **Rasterization**: even-odd polygon scan fill sampled at pixel centres,
//!   row-major RLE decoding
//! - **Compositing**: priority-ordered overlay into a label raster
//! - **nnU-Net output**: `imagesTr`/`labelsTr` layout, manifest, case map
//! - **Verification**: read-back checks of a converted dataset
//! - **Configuration**: layered config file and environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coco2nnunet::{ConversionConfig, Converter, Error};
//!
//! fn main() -> Result<(), Error> {
//!     let converter = Converter::new(ConversionConfig::default())?;
//!     let summary = converter.convert(
//!         "train/_annotations.coco.json",
//!         "train",
//!         "nnUNet_raw/Dataset001_KidneyCyst",
//!         None,
//!     )?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

pub mod coco;
pub mod config;
mod error;
pub mod mask;
pub mod nnunet;
mod report;

pub use crate::{
    config::{ConfigLoader, ConversionConfig},
    error::Error,
    mask::{
        BinaryMask, LabelRaster,
        composite::{Composite, CompositeReport, Compositor, PriorityOrder},
    },
    nnunet::{
        CaseEntry, CaseMap, ConversionSummary, Converter, DatasetLayout, DatasetManifest,
        LabelInspection, VerificationReport, VerifyOptions, inspect_label, verify_dataset,
    },
    report::{Issue, IssueKind, count_by_kind},
};

/// Progress information for long-running operations.
///
/// Sent over an `mpsc` channel by [`Converter::convert`] after each image
/// finishes, in completion order.
///
/// # Examples
///
/// ```rust
/// use coco2nnunet::Progress;
///
/// let progress = Progress {
///     current: 25,
///     total: 100,
/// };
/// let percentage = (progress.current as f64 / progress.total as f64) * 100.0;
/// assert_eq!(percentage, 25.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Current number of completed items.
    pub current: usize,
    /// Total number of items to process.
    pub total: usize,
}
