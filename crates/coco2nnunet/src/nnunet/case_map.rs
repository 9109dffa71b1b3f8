// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Bidirectional `image_id ↔ case_id` mapping.
//!
//! Built once while converting and persisted as `case_map.json` next to the
//! manifest, so downstream tools look correspondence up instead of guessing
//! it from file names.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// One converted image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseEntry {
    pub case_id: String,
    pub image_id: u64,
    /// Source file name from the COCO image record.
    pub file_name: String,
}

#[derive(Serialize, Deserialize)]
struct CaseMapFile {
    cases: Vec<CaseEntry>,
}

/// Unique in both directions: one case per image id and one image id per
/// case.
#[derive(Debug, Clone, Default)]
pub struct CaseMap {
    entries: Vec<CaseEntry>,
    by_image: HashMap<u64, usize>,
    by_case: HashMap<String, usize>,
}

impl CaseMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries, rejecting duplicates.
    pub fn from_entries<I: IntoIterator<Item = CaseEntry>>(entries: I) -> Result<Self, Error> {
        let mut map = Self::new();
        for entry in entries {
            map.insert(entry)?;
        }
        Ok(map)
    }

    /// Add a case. Fails if the image id or the case id is already mapped.
    pub fn insert(&mut self, entry: CaseEntry) -> Result<(), Error> {
        if let Some(&idx) = self.by_image.get(&entry.image_id) {
            return Err(Error::InvalidCaseMap(format!(
                "image {} already mapped to {}",
                entry.image_id, self.entries[idx].case_id
            )));
        }
        if let Some(&idx) = self.by_case.get(&entry.case_id) {
            return Err(Error::InvalidCaseMap(format!(
                "case {} already mapped to image {}",
                entry.case_id, self.entries[idx].image_id
            )));
        }
        let idx = self.entries.len();
        self.by_image.insert(entry.image_id, idx);
        self.by_case.insert(entry.case_id.clone(), idx);
        self.entries.push(entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion (case number) order.
    pub fn entries(&self) -> &[CaseEntry] {
        &self.entries
    }

    pub fn case_for_image(&self, image_id: u64) -> Option<&str> {
        self.by_image
            .get(&image_id)
            .map(|&idx| self.entries[idx].case_id.as_str())
    }

    pub fn image_for_case(&self, case_id: &str) -> Option<u64> {
        self.entry_for_case(case_id).map(|e| e.image_id)
    }

    pub fn entry_for_case(&self, case_id: &str) -> Option<&CaseEntry> {
        self.by_case.get(case_id).map(|&idx| &self.entries[idx])
    }

    /// First case converted from the given source file name.
    pub fn case_for_file(&self, file_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.file_name == file_name)
            .map(|e| e.case_id.as_str())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        let doc = CaseMapFile {
            cases: self.entries.clone(),
        };
        serde_json::to_writer_pretty(&mut writer, &doc)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Load and re-check the uniqueness invariants.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path.as_ref())?;
        let doc: CaseMapFile = serde_json::from_reader(BufReader::new(file))?;
        Self::from_entries(doc.cases)
    }
}
