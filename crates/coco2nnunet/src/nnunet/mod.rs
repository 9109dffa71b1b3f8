// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! # nnU-Net v2 Dataset Output
//!
//! Writing side of the conversion: directory layout and case naming, the
//! `dataset.json` manifest, the `case_map.json` correspondence file, the
//! batch converter, and read-back tools that verify a dataset or inspect
//! individual label files.

mod case_map;
mod convert;
mod inspect;
mod layout;
mod manifest;
mod verify;

pub use case_map::{CaseEntry, CaseMap};
pub use convert::{ConversionSummary, Converter};
pub use inspect::{InspectionDisplay, LabelInspection, inspect_label};
pub use layout::{
    CASE_MAP_FILE, CHANNEL_SUFFIX, DatasetLayout, IMAGES_DIR, LABELS_DIR, MANIFEST_FILE,
};
pub use manifest::DatasetManifest;
pub use verify::{LabelProblem, VerificationReport, VerifyOptions, verify_dataset};
