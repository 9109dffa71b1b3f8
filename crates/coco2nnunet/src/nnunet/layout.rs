// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! nnU-Net v2 raw dataset layout and case naming.
//!
//! ```text
//! <root>/
//! ├── dataset.json
//! ├── case_map.json
//! ├── imagesTr/case001_0000.png
//! └── labelsTr/case001.png
//! ```

use crate::{Error, config::ConversionConfig};
use std::path::{Path, PathBuf};

pub const IMAGES_DIR: &str = "imagesTr";
pub const LABELS_DIR: &str = "labelsTr";
pub const MANIFEST_FILE: &str = "dataset.json";
pub const CASE_MAP_FILE: &str = "case_map.json";
/// Channel suffix of the single input modality.
pub const CHANNEL_SUFFIX: &str = "_0000";

/// Paths and file names of one nnU-Net dataset.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
    case_prefix: String,
    case_digits: usize,
    file_ending: String,
}

impl DatasetLayout {
    pub fn new<P: AsRef<Path>>(root: P, config: &ConversionConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            case_prefix: config.case_prefix.clone(),
            case_digits: config.case_digits,
            file_ending: config.file_ending.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    pub fn labels_dir(&self) -> PathBuf {
        self.root.join(LABELS_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn case_map_path(&self) -> PathBuf {
        self.root.join(CASE_MAP_FILE)
    }

    /// Create `imagesTr/` and `labelsTr/` (and the root) if missing.
    pub fn create(&self) -> Result<(), Error> {
        std::fs::create_dir_all(self.images_dir())?;
        std::fs::create_dir_all(self.labels_dir())?;
        Ok(())
    }

    /// Case id for a 1-based case number, e.g. `case007`.
    pub fn case_id(&self, number: usize) -> String {
        format!(
            "{}{:0width$}",
            self.case_prefix,
            number,
            width = self.case_digits
        )
    }

    pub fn image_file_name(&self, case_id: &str) -> String {
        format!("{}{}{}", case_id, CHANNEL_SUFFIX, self.file_ending)
    }

    pub fn label_file_name(&self, case_id: &str) -> String {
        format!("{}{}", case_id, self.file_ending)
    }

    pub fn image_path(&self, case_id: &str) -> PathBuf {
        self.images_dir().join(self.image_file_name(case_id))
    }

    pub fn label_path(&self, case_id: &str) -> PathBuf {
        self.labels_dir().join(self.label_file_name(case_id))
    }

    /// Whether `s` is `<prefix><digits>` with at least the configured
    /// number of digits.
    pub fn is_case_id(&self, s: &str) -> bool {
        match s.strip_prefix(&self.case_prefix) {
            Some(digits) => {
                digits.len() >= self.case_digits && digits.bytes().all(|b| b.is_ascii_digit())
            }
            None => false,
        }
    }

    /// Case id of an `imagesTr` file name, if it follows the convention.
    pub fn parse_image_file_name(&self, name: &str) -> Option<String> {
        let case_id = name
            .strip_suffix(&self.file_ending)?
            .strip_suffix(CHANNEL_SUFFIX)?;
        self.is_case_id(case_id).then(|| case_id.to_string())
    }

    /// Case id of a `labelsTr` file name, if it follows the convention.
    pub fn parse_label_file_name(&self, name: &str) -> Option<String> {
        let case_id = name.strip_suffix(&self.file_ending)?;
        self.is_case_id(case_id).then(|| case_id.to_string())
    }
}
