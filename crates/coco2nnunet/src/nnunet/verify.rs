// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! nnU-Net dataset verification.
//!
//! Checks a converted dataset the way nnU-Net will consume it: flat
//! `imagesTr`/`labelsTr` directories, conventional file names, one label per
//! image with matching size, single-channel labels holding only declared
//! values, and agreement with `dataset.json` and `case_map.json`.
//!
//! Given the source annotations, sampled labels are also composited again
//! and compared pixel by pixel, and source images that no record names are
//! listed.

use super::{case_map::CaseMap, layout::DatasetLayout, manifest::DatasetManifest};
use crate::{
    Error,
    coco::{CocoDataset, CocoIndex, CocoReader},
    config::ConversionConfig,
    mask::composite::Compositor,
};
use image::GrayImage;
use std::{
    collections::{BTreeSet, HashSet},
    fmt,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Options for dataset verification.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Number of label files whose pixel values are checked, in case order
    /// (0 = all).
    pub sample: usize,
    /// COCO annotation file the dataset was converted from. Checked labels
    /// are composited again from it and compared.
    pub annotations: Option<PathBuf>,
    /// Source image directory, listed for files no image record names.
    /// Requires `annotations`.
    pub images: Option<PathBuf>,
}

/// Source image extensions considered when listing unreferenced files.
const SOURCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// A label file that failed a content check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelProblem {
    pub case_id: String,
    pub detail: String,
}

/// Result of verifying an nnU-Net dataset directory.
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub root: PathBuf,
    /// Required directories that do not exist.
    pub missing_dirs: Vec<String>,
    /// Nested directories (nnU-Net expects flat folders).
    pub subdirectories: Vec<PathBuf>,
    /// Files with the dataset extension that break the naming convention.
    pub invalid_names: Vec<String>,
    pub image_count: usize,
    pub label_count: usize,
    /// Cases with an image but no label.
    pub missing_labels: Vec<String>,
    /// Cases with a label but no image.
    pub missing_images: Vec<String>,
    /// Labels whose content was checked.
    pub labels_checked: usize,
    pub label_problems: Vec<LabelProblem>,
    pub manifest_found: bool,
    /// `(numTraining, label files)` when they disagree.
    pub num_training_mismatch: Option<(usize, usize)>,
    pub case_map_found: bool,
    /// Cases on disk with no case map entry.
    pub unmapped_cases: Vec<String>,
    /// Case map entries with no files on disk.
    pub orphaned_entries: Vec<String>,
    /// Labels compared against their annotations.
    pub overlay_checked: usize,
    /// Labels that disagree with their annotations.
    pub overlay_mismatches: Vec<LabelProblem>,
    /// Source images no image record names. Informational.
    pub unreferenced_sources: Vec<String>,
}

impl VerificationReport {
    /// Returns true if every check passed.
    pub fn is_valid(&self) -> bool {
        self.missing_dirs.is_empty()
            && self.subdirectories.is_empty()
            && self.invalid_names.is_empty()
            && self.missing_labels.is_empty()
            && self.missing_images.is_empty()
            && self.label_problems.is_empty()
            && self.manifest_found
            && self.num_training_mismatch.is_none()
            && self.unmapped_cases.is_empty()
            && self.orphaned_entries.is_empty()
            && self.overlay_mismatches.is_empty()
    }
}

fn list_some(f: &mut fmt::Formatter<'_>, title: &str, items: &[String]) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(f, "║   {}: {}", title, items.len())?;
    for item in items.iter().take(5) {
        writeln!(f, "║     - {}", item)?;
    }
    if items.len() > 5 {
        writeln!(f, "║     ... and {} more", items.len() - 5)?;
    }
    Ok(())
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "╔══════════════════════════════════════════════════════════════╗"
        )?;
        writeln!(
            f,
            "║                 nnU-Net DATASET VERIFICATION                 ║"
        )?;
        writeln!(
            f,
            "╠══════════════════════════════════════════════════════════════╣"
        )?;
        writeln!(f, "║ Root: {}", self.root.display())?;
        list_some(f, "Missing directories", &self.missing_dirs)?;
        let subdirs: Vec<String> = self
            .subdirectories
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        list_some(f, "Subdirectories", &subdirs)?;
        writeln!(
            f,
            "║ Files: {} images, {} labels",
            self.image_count, self.label_count
        )?;
        list_some(f, "Invalid names", &self.invalid_names)?;
        list_some(f, "Missing labels", &self.missing_labels)?;
        list_some(f, "Missing images", &self.missing_images)?;
        writeln!(f, "║ Labels checked: {}", self.labels_checked)?;
        let problems: Vec<String> = self
            .label_problems
            .iter()
            .map(|p| format!("{}: {}", p.case_id, p.detail))
            .collect();
        list_some(f, "Label problems", &problems)?;
        if !self.manifest_found {
            writeln!(f, "║ dataset.json: missing")?;
        } else if let Some((declared, found)) = self.num_training_mismatch {
            writeln!(
                f,
                "║ dataset.json: numTraining {} but {} labels",
                declared, found
            )?;
        } else {
            writeln!(f, "║ dataset.json: ok")?;
        }
        if self.case_map_found {
            writeln!(f, "║ case_map.json: present")?;
            list_some(f, "Unmapped cases", &self.unmapped_cases)?;
            list_some(f, "Orphaned entries", &self.orphaned_entries)?;
        } else {
            writeln!(f, "║ case_map.json: not present")?;
        }
        if self.overlay_checked > 0 || !self.overlay_mismatches.is_empty() {
            writeln!(f, "║ Overlay checked: {}", self.overlay_checked)?;
            let mismatches: Vec<String> = self
                .overlay_mismatches
                .iter()
                .map(|p| format!("{}: {}", p.case_id, p.detail))
                .collect();
            list_some(f, "Overlay mismatches", &mismatches)?;
        }
        list_some(f, "Unreferenced sources", &self.unreferenced_sources)?;
        writeln!(
            f,
            "╠══════════════════════════════════════════════════════════════╣"
        )?;
        let status = if self.is_valid() {
            "✓ PASSED"
        } else {
            "✗ FAILED"
        };
        writeln!(f, "║ Status: {}", status)?;
        write!(
            f,
            "╚══════════════════════════════════════════════════════════════╝"
        )
    }
}

/// Case ids found in one of the two data directories.
struct DirScan {
    cases: BTreeSet<String>,
    subdirectories: Vec<PathBuf>,
    invalid_names: Vec<String>,
}

fn scan_dir(
    dir: &Path,
    file_ending: &str,
    parse: impl Fn(&str) -> Option<String>,
) -> Result<DirScan, Error> {
    let mut scan = DirScan {
        cases: BTreeSet::new(),
        subdirectories: Vec::new(),
        invalid_names: Vec::new(),
    };
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::IoError(e.into()))?;
        if entry.file_type().is_dir() {
            scan.subdirectories.push(entry.path().to_path_buf());
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(file_ending) {
            continue;
        }
        match parse(&name) {
            Some(case_id) => {
                scan.cases.insert(case_id);
            }
            None => scan.invalid_names.push(name.into_owned()),
        }
    }
    Ok(scan)
}

/// Verify the dataset at `root`.
///
/// Naming follows `config`; allowed label values come from `dataset.json`
/// when present and from `config` otherwise.
pub fn verify_dataset<P: AsRef<Path>>(
    root: P,
    config: &ConversionConfig,
    options: &VerifyOptions,
) -> Result<VerificationReport, Error> {
    let layout = DatasetLayout::new(root, config);
    let mut report = VerificationReport {
        root: layout.root().to_path_buf(),
        ..Default::default()
    };

    let images_dir = layout.images_dir();
    let labels_dir = layout.labels_dir();
    for dir in [&images_dir, &labels_dir] {
        if !dir.is_dir() {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            report.missing_dirs.push(name);
        }
    }
    if !report.missing_dirs.is_empty() {
        return Ok(report);
    }

    let images = scan_dir(&images_dir, &config.file_ending, |n| {
        layout.parse_image_file_name(n)
    })?;
    let labels = scan_dir(&labels_dir, &config.file_ending, |n| {
        layout.parse_label_file_name(n)
    })?;

    report.image_count = images.cases.len();
    report.label_count = labels.cases.len();
    report.missing_labels = images.cases.difference(&labels.cases).cloned().collect();
    report.missing_images = labels.cases.difference(&images.cases).cloned().collect();
    report.subdirectories = images.subdirectories;
    report.subdirectories.extend(labels.subdirectories);
    report.invalid_names = images.invalid_names;
    report.invalid_names.extend(labels.invalid_names);

    let manifest = match DatasetManifest::read(layout.manifest_path()) {
        Ok(manifest) => Some(manifest),
        Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };
    report.manifest_found = manifest.is_some();
    let allowed = match &manifest {
        Some(manifest) => {
            if manifest.num_training != report.label_count {
                report.num_training_mismatch = Some((manifest.num_training, report.label_count));
            }
            manifest.label_values()
        }
        None => config.label_values(),
    };

    let case_map_path = layout.case_map_path();
    let case_map = if case_map_path.is_file() {
        Some(CaseMap::load(&case_map_path)?)
    } else {
        None
    };

    let source = match &options.annotations {
        Some(path) => Some(CocoReader::new().read_json(path)?),
        None => None,
    };
    let overlay = match (&source, &case_map) {
        (Some(dataset), Some(case_map)) => Some(Overlay {
            index: CocoIndex::from_dataset(dataset),
            compositor: Compositor::new(config.priority_order()?),
            case_map,
        }),
        (Some(_), None) => {
            log::warn!(
                "{} not found, labels cannot be compared with their annotations",
                case_map_path.display()
            );
            None
        }
        _ => None,
    };

    let limit = match options.sample {
        0 => usize::MAX,
        n => n,
    };
    for case_id in labels.cases.iter().take(limit) {
        report.labels_checked += 1;
        let image_path = images
            .cases
            .contains(case_id)
            .then(|| layout.image_path(case_id));
        match check_label(&layout.label_path(case_id), image_path, &allowed) {
            Ok(label) => {
                if let Some(overlay) = &overlay {
                    report.overlay_checked += 1;
                    if let Some(detail) = overlay.compare(case_id, &label) {
                        report.overlay_mismatches.push(LabelProblem {
                            case_id: case_id.clone(),
                            detail,
                        });
                    }
                }
            }
            Err(detail) => report.label_problems.push(LabelProblem {
                case_id: case_id.clone(),
                detail,
            }),
        }
    }

    if let Some(case_map) = &case_map {
        report.case_map_found = true;
        let on_disk: HashSet<&String> = images.cases.union(&labels.cases).collect();
        report.unmapped_cases = on_disk
            .iter()
            .filter(|case| case_map.entry_for_case(case).is_none())
            .map(|case| case.to_string())
            .collect();
        report.unmapped_cases.sort();
        report.orphaned_entries = case_map
            .entries()
            .iter()
            .filter(|e| !images.cases.contains(&e.case_id) || !labels.cases.contains(&e.case_id))
            .map(|e| e.case_id.clone())
            .collect();
    }

    match (&options.images, &source) {
        (Some(dir), Some(dataset)) => {
            report.unreferenced_sources = unreferenced_sources(dir, dataset)?;
        }
        (Some(_), None) => log::warn!("source images are only listed together with annotations"),
        _ => {}
    }

    Ok(report)
}

/// Labels compared with a fresh composite of their annotations.
struct Overlay<'a> {
    index: CocoIndex<'a>,
    compositor: Compositor,
    case_map: &'a CaseMap,
}

impl Overlay<'_> {
    /// Returns how the label disagrees with its annotations, if it does.
    fn compare(&self, case_id: &str, label: &GrayImage) -> Option<String> {
        let Some(image_id) = self.case_map.image_for_case(case_id) else {
            return Some("no case map entry".to_string());
        };
        if !self.index.images.contains_key(&image_id) {
            return Some(format!("image {} is not in the annotations", image_id));
        }
        let expected = self
            .compositor
            .composite(
                image_id,
                label.height(),
                label.width(),
                self.index.annotations_for_image(image_id).iter().copied(),
            )
            .raster;
        let differing = expected
            .data()
            .iter()
            .zip(label.as_raw())
            .filter(|(a, b)| a != b)
            .count();
        (differing > 0).then(|| {
            format!(
                "{} of {} pixels differ from the annotations",
                differing,
                label.as_raw().len()
            )
        })
    }
}

/// Files with an image extension directly inside `dir` that no image record
/// of `dataset` names.
fn unreferenced_sources(dir: &Path, dataset: &CocoDataset) -> Result<Vec<String>, Error> {
    let named: HashSet<&str> = dataset
        .images
        .iter()
        .map(|img| img.file_name.as_str())
        .collect();
    let mut unreferenced = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::IoError(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_image = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        let name = entry.file_name().to_string_lossy();
        if is_image && !named.contains(&*name) {
            unreferenced.push(name.into_owned());
        }
    }
    Ok(unreferenced)
}

/// Returns the label, or a description of what is wrong with it.
fn check_label(
    label_path: &Path,
    image_path: Option<PathBuf>,
    allowed: &BTreeSet<u8>,
) -> Result<GrayImage, String> {
    let label = image::open(label_path).map_err(|e| format!("unreadable: {}", e))?;
    let gray = match label {
        image::DynamicImage::ImageLuma8(gray) => gray,
        other => return Err(format!("not single-channel 8-bit ({:?})", other.color())),
    };

    let present: BTreeSet<u8> = gray.pixels().map(|p| p.0[0]).collect();
    let unexpected: Vec<u8> = present.difference(allowed).copied().collect();
    if !unexpected.is_empty() {
        return Err(format!("unexpected values {:?}", unexpected));
    }

    if let Some(image_path) = image_path {
        match image::image_dimensions(&image_path) {
            Ok(dims) if dims != gray.dimensions() => {
                return Err(format!(
                    "label is {}x{} but image is {}x{}",
                    gray.width(),
                    gray.height(),
                    dims.0,
                    dims.1
                ));
            }
            Ok(_) => {}
            Err(e) => return Err(format!("image unreadable: {}", e)),
        }
    }
    Ok(gray)
}
