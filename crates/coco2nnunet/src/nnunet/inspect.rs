// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-file label histograms.

use super::case_map::CaseMap;
use crate::{Error, config::ConversionConfig, mask::LabelRaster};
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

/// Pixel value counts of one label file.
#[derive(Debug, Clone)]
pub struct LabelInspection {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Whether the file was stored as 8-bit grayscale.
    pub single_channel: bool,
    pub histogram: BTreeMap<u8, u64>,
}

impl LabelInspection {
    pub fn total_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Values other than background.
    pub fn foreground_values(&self) -> Vec<u8> {
        self.histogram.keys().copied().filter(|&v| v != 0).collect()
    }

    /// Render with class names from `config` and, when available, the
    /// source image from `case_map`.
    pub fn describe<'a>(
        &'a self,
        config: &'a ConversionConfig,
        case_map: Option<&'a CaseMap>,
    ) -> InspectionDisplay<'a> {
        InspectionDisplay {
            inspection: self,
            config,
            case_map,
        }
    }
}

pub struct InspectionDisplay<'a> {
    inspection: &'a LabelInspection,
    config: &'a ConversionConfig,
    case_map: Option<&'a CaseMap>,
}

impl fmt::Display for InspectionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inspection = self.inspection;
        writeln!(
            f,
            "{} ({}x{})",
            inspection.path.display(),
            inspection.width,
            inspection.height
        )?;
        if !inspection.single_channel {
            writeln!(f, "  warning: not stored as single-channel 8-bit")?;
        }
        let source = inspection
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(&self.config.file_ending))
            .and_then(|case_id| self.case_map?.entry_for_case(case_id));
        if let Some(entry) = source {
            writeln!(f, "  source: {} (image {})", entry.file_name, entry.image_id)?;
        }
        let total = inspection.total_pixels().max(1) as f64;
        for (value, count) in &inspection.histogram {
            let name = self.config.label_name(*value).unwrap_or("unknown");
            writeln!(
                f,
                "  {:>3} {:<12} {:>10} ({:5.1}%)",
                value,
                name,
                count,
                *count as f64 * 100.0 / total
            )?;
        }
        Ok(())
    }
}

/// Read a label PNG and count its pixel values.
///
/// Multi-channel files are accepted and converted to luma so a malformed
/// label can still be looked at.
pub fn inspect_label<P: AsRef<Path>>(path: P) -> Result<LabelInspection, Error> {
    let path = path.as_ref();
    let image = image::open(path)?;
    let single_channel = matches!(image, image::DynamicImage::ImageLuma8(_));
    let raster = LabelRaster::from_image(image.into_luma8());
    Ok(LabelInspection {
        path: path.to_path_buf(),
        width: raster.width(),
        height: raster.height(),
        single_channel,
        histogram: raster.histogram(),
    })
}
