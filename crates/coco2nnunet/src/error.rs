// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

/// Error type for COCO to nnU-Net conversion.
///
/// Only failures of the surrounding collaborators are represented here: an
/// unreadable annotation document, an unwritable output directory or an
/// invalid configuration. Problems with individual images or annotations are
/// absorbed and reported as [`crate::Issue`]s instead.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred during file operations.
    IoError(std::io::Error),
    /// JSON serialization or deserialization error.
    JsonError(serde_json::Error),
    /// Image decoding or encoding error.
    ImageError(image::ImageError),
    /// Configuration parsing or loading error.
    ConfigError(config::ConfigError),
    /// Configuration loaded but failed validation.
    InvalidConfig(String),
    /// The image/case correspondence violates its uniqueness invariants.
    InvalidCaseMap(String),
    /// Referenced label is missing from the label map.
    MissingLabel(String),
    /// Invalid parameters provided to an operation.
    InvalidParameters(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err)
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageError(err)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::ConfigError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::JsonError(e) => write!(f, "JSON error: {}", e),
            Error::ImageError(e) => write!(f, "Image error: {}", e),
            Error::ConfigError(e) => write!(f, "Configuration error: {}", e),
            Error::InvalidConfig(s) => write!(f, "Invalid configuration: {}", s),
            Error::InvalidCaseMap(s) => write!(f, "Invalid case map: {}", s),
            Error::MissingLabel(s) => write!(f, "Missing label: {}", s),
            Error::InvalidParameters(s) => write!(f, "Invalid parameters: {}", s),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::JsonError(e) => Some(e),
            Error::ImageError(e) => Some(e),
            Error::ConfigError(e) => Some(e),
            _ => None,
        }
    }
}
