// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Conversion configuration.
//!
//! Settings are layered, lowest precedence first:
//!
//! 1. Built-in defaults (the kidney cyst dataset)
//! 2. `config.toml` in the user configuration directory, if present
//! 3. An explicit configuration file (TOML, JSON or YAML by extension)
//! 4. `COCO2NNUNET_*` environment variables, e.g.
//!    `COCO2NNUNET_DATASET_NAME=Kidney` or `COCO2NNUNET_PRIORITY=2,1`

use crate::{Error, mask::composite::PriorityOrder};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    path::{Path, PathBuf},
};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "COCO2NNUNET";

/// The only file ending images and labels are written with.
pub const LOSSLESS_FILE_ENDING: &str = ".png";

/// Everything a conversion run needs besides its input/output paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// `dataset_name` written to the manifest.
    pub dataset_name: String,
    /// `description` written to the manifest.
    pub description: String,
    /// `reference` written to the manifest.
    pub reference: String,
    /// Extension of every image and label file, including the dot. Only
    /// `.png` is accepted.
    pub file_ending: String,
    /// Input channel index → channel name.
    pub channel_names: BTreeMap<String, String>,
    /// Label name → raster value. Must include `background: 0`.
    pub labels: BTreeMap<String, u32>,
    /// Category ids in paint order, lowest priority first. Each id is also
    /// the raster value painted for that category.
    pub priority: Vec<u32>,
    /// Case id prefix (`case` → `case001`).
    pub case_prefix: String,
    /// Zero-padded width of the case number.
    pub case_digits: usize,
    /// Leave images without any annotation out of the output.
    pub skip_unannotated: bool,
    /// Fan out across worker threads, one image per task.
    pub parallel: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dataset_name: "KidneyCyst".to_string(),
            description: "Kidney cyst segmentation dataset".to_string(),
            reference: "Converted from COCO format".to_string(),
            file_ending: ".png".to_string(),
            channel_names: BTreeMap::from([("0".to_string(), "image".to_string())]),
            labels: BTreeMap::from([
                ("background".to_string(), 0),
                ("cyst".to_string(), 1),
                ("kidney".to_string(), 2),
            ]),
            // kidney painted first, cyst second: cyst wins overlaps
            priority: vec![2, 1],
            case_prefix: "case".to_string(),
            case_digits: 3,
            skip_unannotated: false,
            parallel: true,
        }
    }
}

impl ConversionConfig {
    /// Load the layered configuration with the default user config location
    /// and environment prefix.
    pub fn load(explicit: Option<&Path>) -> Result<Self, Error> {
        ConfigLoader::new().file(explicit).load()
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), Error> {
        if self.labels.get("background") != Some(&0) {
            return Err(Error::InvalidConfig(
                "labels must map background to 0".to_string(),
            ));
        }
        let mut values = HashSet::new();
        for (name, &value) in &self.labels {
            if value > u8::MAX as u32 {
                return Err(Error::InvalidConfig(format!(
                    "label {} = {} does not fit an 8-bit raster",
                    name, value
                )));
            }
            if !values.insert(value) {
                return Err(Error::InvalidConfig(format!(
                    "label value {} is assigned to more than one name",
                    value
                )));
            }
        }

        let order = PriorityOrder::new(self.priority.clone())?;
        for &id in order.ids() {
            if !values.contains(&id) {
                return Err(Error::MissingLabel(format!(
                    "category id {} in priority order has no label name",
                    id
                )));
            }
        }

        if self.case_prefix.is_empty()
            || self
                .case_prefix
                .contains(|c: char| c == '/' || c == '\\' || c == '.')
        {
            return Err(Error::InvalidConfig(format!(
                "invalid case prefix {:?}",
                self.case_prefix
            )));
        }
        if self.case_digits == 0 {
            return Err(Error::InvalidConfig(
                "case_digits must be at least 1".to_string(),
            ));
        }
        // Label values must round-trip exactly.
        if self.file_ending != LOSSLESS_FILE_ENDING {
            return Err(Error::InvalidConfig(format!(
                "file ending {:?} is not supported, labels are written as {}",
                self.file_ending, LOSSLESS_FILE_ENDING
            )));
        }
        Ok(())
    }

    /// Validated priority order.
    pub fn priority_order(&self) -> Result<PriorityOrder, Error> {
        PriorityOrder::new(self.priority.clone())
    }

    /// Every raster value the label map allows.
    pub fn label_values(&self) -> BTreeSet<u8> {
        self.labels
            .values()
            .filter_map(|&v| u8::try_from(v).ok())
            .collect()
    }

    /// Name of the label with the given raster value.
    pub fn label_name(&self, value: u8) -> Option<&str> {
        self.labels
            .iter()
            .find(|(_, v)| **v == value as u32)
            .map(|(name, _)| name.as_str())
    }
}

/// Location of the per-user configuration file.
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("ai", "EdgeFirst", "coco2nnunet")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Builder over the configuration layers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config: Option<PathBuf>,
    file: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            user_config: user_config_path(),
            file: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Replace (or with `None` disable) the user configuration layer.
    pub fn user_config(mut self, path: Option<PathBuf>) -> Self {
        self.user_config = path;
        self
    }

    /// Explicit configuration file; it must exist when given.
    pub fn file(mut self, path: Option<&Path>) -> Self {
        self.file = path.map(Path::to_path_buf);
        self
    }

    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Merge every layer, deserialize and validate.
    pub fn load(&self) -> Result<ConversionConfig, Error> {
        let mut builder = config::Config::builder();

        if let Some(path) = &self.user_config {
            log::debug!("Looking for user configuration at {}", path.display());
            builder = builder.add_source(config::File::from(path.as_path()).required(false));
        }
        if let Some(path) = &self.file {
            log::debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("priority"),
        );

        let config: ConversionConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn loader() -> ConfigLoader {
        ConfigLoader::new()
            .user_config(None)
            .env_prefix("COCO2NNUNET_TEST_UNSET")
    }

    #[test]
    fn test_default_is_valid() {
        let config = ConversionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.priority_order().unwrap().ids(), &[2, 1]);
        assert_eq!(config.label_values(), BTreeSet::from([0, 1, 2]));
        assert_eq!(config.label_name(1), Some("cyst"));
        assert_eq!(config.label_name(2), Some("kidney"));
        assert_eq!(config.label_name(3), None);
    }

    #[test]
    fn test_load_without_sources_gives_defaults() {
        let config = loader().load().unwrap();
        assert_eq!(config, ConversionConfig::default());
    }

    #[test]
    fn test_load_toml_file_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
dataset_name = "RenalMasses"
priority = [2, 1, 3]
case_digits = 4
parallel = false

[labels]
background = 0
cyst = 1
kidney = 2
tumor = 3
"#
        )
        .unwrap();

        let config = loader().file(Some(file.path())).load().unwrap();
        assert_eq!(config.dataset_name, "RenalMasses");
        assert_eq!(config.priority, vec![2, 1, 3]);
        assert_eq!(config.case_digits, 4);
        assert!(!config.parallel);
        assert_eq!(config.labels["tumor"], 3);
        // untouched fields keep their defaults
        assert_eq!(config.file_ending, ".png");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = loader()
            .file(Some(Path::new("/nonexistent/coco2nnunet.toml")))
            .load();
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_env_overrides() {
        let prefix = "COCO2NNUNET_TEST_ENV";
        // SAFETY: the variables use a prefix no other test reads.
        unsafe {
            std::env::set_var("COCO2NNUNET_TEST_ENV_DATASET_NAME", "FromEnv");
            std::env::set_var("COCO2NNUNET_TEST_ENV_SKIP_UNANNOTATED", "true");
        }
        let config = loader().env_prefix(prefix).load().unwrap();
        assert_eq!(config.dataset_name, "FromEnv");
        assert!(config.skip_unannotated);
    }

    #[test]
    fn test_validate_rejects_inconsistent_labels() {
        let mut config = ConversionConfig::default();
        config.labels.remove("background");
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = ConversionConfig::default();
        config.labels.insert("tumor".to_string(), 2);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = ConversionConfig::default();
        config.labels.insert("huge".to_string(), 300);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = ConversionConfig::default();
        config.priority = vec![2, 1, 3];
        assert!(matches!(config.validate(), Err(Error::MissingLabel(_))));

        let mut config = ConversionConfig::default();
        config.priority = vec![1, 1];
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_bad_naming() {
        let mut config = ConversionConfig::default();
        config.case_prefix = "../case".to_string();
        assert!(config.validate().is_err());

        let mut config = ConversionConfig::default();
        config.file_ending = "png".to_string();
        assert!(config.validate().is_err());

        for ending in [".jpg", ".jpeg", ".tif", ".PNG"] {
            let mut config = ConversionConfig::default();
            config.file_ending = ending.to_string();
            assert!(
                matches!(config.validate(), Err(Error::InvalidConfig(_))),
                "{} accepted",
                ending
            );
        }

        let mut config = ConversionConfig::default();
        config.case_digits = 0;
        assert!(config.validate().is_err());
    }
}
