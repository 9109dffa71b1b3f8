// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! `dataset.json` manifest consumed by nnU-Net v2.

use crate::{Error, config::ConversionConfig};
use serde::{Deserialize, Serialize, Serializer};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    /// Input channel index → channel name.
    pub channel_names: BTreeMap<String, String>,
    /// Label name → raster value, written in ascending value order.
    #[serde(serialize_with = "serialize_by_value")]
    pub labels: BTreeMap<String, u32>,
    /// Number of converted cases.
    #[serde(rename = "numTraining")]
    pub num_training: usize,
    pub file_ending: String,
    pub dataset_name: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub description: String,
}

impl DatasetManifest {
    pub fn from_config(config: &ConversionConfig, num_training: usize) -> Self {
        Self {
            channel_names: config.channel_names.clone(),
            labels: config.labels.clone(),
            num_training,
            file_ending: config.file_ending.clone(),
            dataset_name: config.dataset_name.clone(),
            reference: config.reference.clone(),
            description: config.description.clone(),
        }
    }

    /// Raster values the manifest declares.
    pub fn label_values(&self) -> BTreeSet<u8> {
        self.labels
            .values()
            .filter_map(|&v| u8::try_from(v).ok())
            .collect()
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

fn serialize_by_value<S: Serializer>(
    labels: &BTreeMap<String, u32>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut ordered: Vec<_> = labels.iter().collect();
    ordered.sort_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));
    serializer.collect_map(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_json_shape() {
        let mut config = ConversionConfig::default();
        config.labels.insert("aorta".to_string(), 3);
        config.priority = vec![2, 1, 3];
        let manifest = DatasetManifest::from_config(&config, 12);

        let json = serde_json::to_string(&manifest).unwrap();
        // labels are ordered by value, not by name
        let background = json.find("\"background\"").unwrap();
        let cyst = json.find("\"cyst\"").unwrap();
        let kidney = json.find("\"kidney\"").unwrap();
        let aorta = json.find("\"aorta\"").unwrap();
        assert!(background < cyst && cyst < kidney && kidney < aorta);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["numTraining"], 12);
        assert_eq!(value["channel_names"]["0"], "image");
        assert_eq!(value["labels"]["cyst"], 1);
        assert_eq!(value["labels"]["kidney"], 2);
        assert_eq!(value["file_ending"], ".png");
        assert_eq!(value["dataset_name"], "KidneyCyst");
        assert_eq!(value["reference"], "Converted from COCO format");
        assert_eq!(value["description"], "Kidney cyst segmentation dataset");
    }

    #[test]
    fn test_manifest_write_read() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dataset.json");
        let manifest = DatasetManifest::from_config(&ConversionConfig::default(), 3);
        manifest.write(&path).unwrap();

        let restored = DatasetManifest::read(&path).unwrap();
        assert_eq!(restored, manifest);
        assert_eq!(restored.label_values(), BTreeSet::from([0, 1, 2]));
    }
}
