// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! COCO JSON reader.

use super::types::{CocoDataset, CocoIndex};
use crate::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Reader for COCO annotation documents.
///
/// # Example
///
/// ```rust,no_run
/// use coco2nnunet::coco::CocoReader;
///
/// let reader = CocoReader::new();
/// let dataset = reader.read_json("train/_annotations.coco.json")?;
/// println!("Loaded {} images", dataset.images.len());
/// # Ok::<(), coco2nnunet::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct CocoReader;

impl CocoReader {
    /// Create a new COCO reader.
    pub fn new() -> Self {
        Self
    }

    /// Read COCO dataset from a JSON file.
    ///
    /// Failing to open or parse the document is the only fatal input error
    /// of a conversion run.
    pub fn read_json<P: AsRef<Path>>(&self, path: P) -> Result<CocoDataset, Error> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::with_capacity(64 * 1024, file);
        let dataset: CocoDataset = serde_json::from_reader(reader)?;
        Ok(dataset)
    }
}

/// Log a structure summary of a freshly read dataset.
pub fn log_summary(dataset: &CocoDataset) {
    log::info!("Categories: {}", dataset.categories.len());
    for cat in &dataset.categories {
        log::info!("  - ID: {}, Name: {}", cat.id, cat.name);
    }
    log::info!("Images: {}", dataset.images.len());
    log::info!("Annotations: {}", dataset.annotations.len());

    let index = CocoIndex::from_dataset(dataset);
    let annotated = dataset
        .images
        .iter()
        .filter(|img| index.is_annotated(img.id))
        .count();
    log::info!(
        "Images with annotations: {}, without: {}",
        annotated,
        dataset.images.len() - annotated
    );
    if !index.orphans.is_empty() {
        log::warn!(
            "{} annotations reference unknown image ids",
            index.orphans.len()
        );
    }
    let mut undeclared: Vec<_> = index.undeclared_categories().into_iter().collect();
    if !undeclared.is_empty() {
        undeclared.sort_unstable();
        log::warn!(
            "Annotations reference undeclared category ids: {:?}",
            undeclared
        );
    }
}
