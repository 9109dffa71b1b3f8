// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! COCO → nnU-Net v2 batch conversion.
//!
//! One pass over the image records: plan cases, convert each image
//! independently (optionally fanned out with rayon, one task per image),
//! then write the manifest and the case map. Problems with individual
//! images or annotations are reported and skipped; only failures to read
//! the annotation document or to prepare the output directory abort.

use super::{
    case_map::{CaseEntry, CaseMap},
    layout::DatasetLayout,
    manifest::DatasetManifest,
};
use crate::{
    Error, Progress,
    coco::{CocoAnnotation, CocoDataset, CocoImage, CocoIndex, CocoReader, log_summary},
    config::ConversionConfig,
    mask::{canvas_pixels, composite::Compositor},
    report::{Issue, IssueKind, count_by_kind},
};
use image::{DynamicImage, ImageFormat, imageops::FilterType};
use rayon::prelude::*;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::Sender,
    },
};

/// Outcome of a conversion run.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionSummary {
    /// Image records in the annotation document.
    pub images_total: usize,
    /// Cases written to the output.
    pub converted: usize,
    /// Images left out because they carry no annotation.
    pub skipped_unannotated: usize,
    /// Images that were planned or present but could not be converted.
    pub failed: usize,
    /// Annotations painted into some raster.
    pub annotations_painted: usize,
    /// Pixel count per raster value over every written label.
    pub label_pixels: BTreeMap<u8, u64>,
    /// Everything absorbed along the way.
    pub issues: Vec<Issue>,
    pub output: PathBuf,
    pub manifest_path: PathBuf,
    pub case_map_path: PathBuf,
}

impl fmt::Display for ConversionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Conversion Complete ===")?;
        writeln!(f, "Images in annotations: {}", self.images_total)?;
        writeln!(f, "Processed images:      {}", self.converted)?;
        if self.skipped_unannotated > 0 {
            writeln!(f, "Skipped (no annotations): {}", self.skipped_unannotated)?;
        }
        if self.failed > 0 {
            writeln!(f, "Failed images:         {}", self.failed)?;
        }
        writeln!(f, "Annotations painted:   {}", self.annotations_painted)?;
        for (value, pixels) in &self.label_pixels {
            writeln!(f, "  Value {}: {} pixels", value, pixels)?;
        }
        let counts = count_by_kind(&self.issues);
        if !counts.is_empty() {
            writeln!(f, "Issues:")?;
            for (kind, n) in counts {
                writeln!(f, "  {}: {}", kind, n)?;
            }
        }
        writeln!(f, "Output directory: {}", self.output.display())?;
        writeln!(f, "Dataset JSON:     {}", self.manifest_path.display())?;
        write!(f, "Case map:         {}", self.case_map_path.display())
    }
}

struct PlannedCase<'a> {
    case_id: String,
    image: &'a CocoImage,
    source: PathBuf,
    annotations: &'a [&'a CocoAnnotation],
}

struct CaseResult {
    entry: Option<CaseEntry>,
    painted: usize,
    label_pixels: BTreeMap<u8, u64>,
    issues: Vec<Issue>,
}

/// Converts COCO segmentation datasets into the nnU-Net v2 raw layout.
///
/// # Example
///
/// ```rust,no_run
/// use coco2nnunet::{ConversionConfig, Converter};
///
/// let converter = Converter::new(ConversionConfig::default())?;
/// let summary = converter.convert(
///     "train/_annotations.coco.json",
///     "train",
///     "nnunet_dataset",
///     None,
/// )?;
/// println!("{}", summary);
/// # Ok::<(), coco2nnunet::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConversionConfig,
    compositor: Compositor,
    overwrite: bool,
}

impl Converter {
    /// Validate the configuration and build a converter.
    pub fn new(config: ConversionConfig) -> Result<Self, Error> {
        config.validate()?;
        let compositor = Compositor::new(config.priority_order()?);
        Ok(Self {
            config,
            compositor,
            overwrite: false,
        })
    }

    /// Allow replacing the files of a previous run in `imagesTr`/`labelsTr`.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Read the annotation document and convert it.
    pub fn convert<A, I, O>(
        &self,
        annotations: A,
        images_dir: I,
        output: O,
        progress: Option<Sender<Progress>>,
    ) -> Result<ConversionSummary, Error>
    where
        A: AsRef<Path>,
        I: AsRef<Path>,
        O: AsRef<Path>,
    {
        log::info!("Loading COCO data from {}", annotations.as_ref().display());
        let dataset = CocoReader::new().read_json(annotations)?;
        log_summary(&dataset);
        self.convert_dataset(&dataset, images_dir, output, progress)
    }

    /// Convert an already loaded dataset.
    pub fn convert_dataset<I, O>(
        &self,
        dataset: &CocoDataset,
        images_dir: I,
        output: O,
        progress: Option<Sender<Progress>>,
    ) -> Result<ConversionSummary, Error>
    where
        I: AsRef<Path>,
        O: AsRef<Path>,
    {
        let layout = DatasetLayout::new(output, &self.config);
        self.prepare_output(&layout)?;

        let index = CocoIndex::from_dataset(dataset);
        let mut issues: Vec<Issue> = index
            .orphans
            .iter()
            .map(|ann| {
                let issue = Issue::new(
                    IssueKind::UnknownImage,
                    format!("image {} has no image record", ann.image_id),
                )
                .with_annotation(ann.id);
                issue.log();
                issue
            })
            .collect();

        let (plan, skipped_unannotated, planning_issues) =
            self.plan(dataset, &index, images_dir.as_ref(), &layout);
        let missing = planning_issues.len();
        issues.extend(planning_issues);
        log::info!("Converting {} images...", plan.len());

        let total = plan.len();
        let done = AtomicUsize::new(0);
        let run = |case: &PlannedCase| {
            let result = self.convert_case(&layout, case);
            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(tx) = &progress {
                let _ = tx.send(Progress { current, total });
            }
            result
        };
        let results: Vec<CaseResult> = if self.config.parallel {
            plan.par_iter().map(run).collect()
        } else {
            plan.iter().map(run).collect()
        };

        let mut case_map = CaseMap::new();
        let mut annotations_painted = 0;
        let mut label_pixels = BTreeMap::new();
        let mut failed = missing;
        for result in results {
            issues.extend(result.issues);
            match result.entry {
                Some(mut entry) => {
                    let case_id = layout.case_id(case_map.len() + 1);
                    if entry.case_id != case_id {
                        renumber(&layout, &entry.case_id, &case_id)?;
                        entry.case_id = case_id;
                    }
                    case_map.insert(entry)?;
                    annotations_painted += result.painted;
                    for (value, n) in result.label_pixels {
                        *label_pixels.entry(value).or_insert(0) += n;
                    }
                }
                None => failed += 1,
            }
        }

        let manifest = DatasetManifest::from_config(&self.config, case_map.len());
        manifest.write(layout.manifest_path())?;
        case_map.save(layout.case_map_path())?;

        Ok(ConversionSummary {
            images_total: dataset.images.len(),
            converted: case_map.len(),
            skipped_unannotated,
            failed,
            annotations_painted,
            label_pixels,
            issues,
            output: layout.root().to_path_buf(),
            manifest_path: layout.manifest_path(),
            case_map_path: layout.case_map_path(),
        })
    }

    fn prepare_output(&self, layout: &DatasetLayout) -> Result<(), Error> {
        layout.create()?;
        for dir in [layout.images_dir(), layout.labels_dir()] {
            let existing: Vec<PathBuf> = std::fs::read_dir(&dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect();
            if existing.is_empty() {
                continue;
            }
            if !self.overwrite {
                return Err(Error::InvalidParameters(format!(
                    "{} already contains {} files, refusing to mix runs",
                    dir.display(),
                    existing.len()
                )));
            }
            log::info!(
                "Removing {} files from previous run in {}",
                existing.len(),
                dir.display()
            );
            for path in existing {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    /// Decide which images become cases. The case ids assigned here are
    /// provisional; cases after a failed image are renumbered once
    /// conversion finishes so the written ids stay contiguous.
    fn plan<'a>(
        &self,
        dataset: &'a CocoDataset,
        index: &'a CocoIndex<'a>,
        images_dir: &Path,
        layout: &DatasetLayout,
    ) -> (Vec<PlannedCase<'a>>, usize, Vec<Issue>) {
        let mut plan = Vec::new();
        let mut skipped = 0;
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        for image in &dataset.images {
            if !seen.insert(image.id) {
                let issue = Issue::new(
                    IssueKind::ImageFailure,
                    format!("duplicate image record for {}", image.file_name),
                )
                .with_image(image.id);
                issue.log();
                issues.push(issue);
                continue;
            }

            let annotations = index.annotations_for_image(image.id);
            if annotations.is_empty() && self.config.skip_unannotated {
                log::debug!("Skipping {} without annotations", image.file_name);
                skipped += 1;
                continue;
            }

            let source = images_dir.join(&image.file_name);
            if !source.is_file() {
                let issue = Issue::new(
                    IssueKind::MissingSourceAsset,
                    format!("image {} not found", source.display()),
                )
                .with_image(image.id);
                issue.log();
                issues.push(issue);
                continue;
            }

            plan.push(PlannedCase {
                case_id: layout.case_id(plan.len() + 1),
                image,
                source,
                annotations,
            });
        }

        (plan, skipped, issues)
    }

    /// Label canvas `(height, width)` of a case.
    ///
    /// The declared size wins when it is usable and plausible for the
    /// decoded source; the source is then resized to it if needed. Without
    /// a declared size the source size is used. `None` means the image is
    /// skipped, with the reason recorded.
    fn canvas(
        &self,
        case: &PlannedCase,
        source: &DynamicImage,
        result: &mut CaseResult,
    ) -> Option<(u32, u32)> {
        let image_id = case.image.id;
        let file_name = &case.image.file_name;
        let actual = (source.height(), source.width());

        let Some((h, w)) = case.image.dimensions() else {
            if canvas_pixels(actual.0, actual.1).is_none() {
                record(
                    result,
                    IssueKind::MissingDimensions,
                    image_id,
                    format!("{} has no usable size", file_name),
                );
                return None;
            }
            record(
                result,
                IssueKind::MissingDimensions,
                image_id,
                format!(
                    "{} has no declared size, using file size {}x{}",
                    file_name, actual.1, actual.0
                ),
            );
            return Some(actual);
        };

        if canvas_pixels(h, w).is_none() || !plausible(h, actual.0) || !plausible(w, actual.1) {
            record(
                result,
                IssueKind::ImageFailure,
                image_id,
                format!(
                    "{} declares size {}x{} but the file is {}x{}",
                    file_name, w, h, actual.1, actual.0
                ),
            );
            return None;
        }
        if (h, w) != actual {
            record(
                result,
                IssueKind::DimensionMismatch,
                image_id,
                format!(
                    "{} declares size {}x{} but the file is {}x{}, resizing the image",
                    file_name, w, h, actual.1, actual.0
                ),
            );
        }
        Some((h, w))
    }

    fn convert_case(&self, layout: &DatasetLayout, case: &PlannedCase) -> CaseResult {
        let image_id = case.image.id;
        let mut result = CaseResult {
            entry: None,
            painted: 0,
            label_pixels: BTreeMap::new(),
            issues: Vec::new(),
        };

        let source = match image::open(&case.source) {
            Ok(img) => img,
            Err(e) => {
                record(
                    &mut result,
                    IssueKind::ImageFailure,
                    image_id,
                    format!("cannot decode {}: {}", case.source.display(), e),
                );
                return result;
            }
        };

        let (height, width) = match self.canvas(case, &source, &mut result) {
            Some(canvas) => canvas,
            None => return result,
        };
        let source = if (source.height(), source.width()) == (height, width) {
            source
        } else {
            source.resize_exact(width, height, FilterType::Triangle)
        };

        let image_path = layout.image_path(&case.case_id);
        if let Err(e) = source
            .to_rgb8()
            .save_with_format(&image_path, ImageFormat::Png)
        {
            record(
                &mut result,
                IssueKind::ImageFailure,
                image_id,
                format!("cannot write {}: {}", image_path.display(), e),
            );
            let _ = std::fs::remove_file(&image_path);
            return result;
        }

        let composite = self.compositor.composite(
            image_id,
            height,
            width,
            case.annotations.iter().copied(),
        );
        result.issues.extend(composite.report.issues);
        result.painted = composite.report.painted;
        result.label_pixels = composite.raster.histogram();

        let label_path = layout.label_path(&case.case_id);
        let written = composite
            .raster
            .into_image()
            .and_then(|img| {
                img.save_with_format(&label_path, ImageFormat::Png)
                    .map_err(Error::from)
            });
        if let Err(e) = written {
            record(
                &mut result,
                IssueKind::ImageFailure,
                image_id,
                format!("cannot write {}: {}", label_path.display(), e),
            );
            let _ = std::fs::remove_file(&image_path);
            let _ = std::fs::remove_file(&label_path);
            return result;
        }

        log::debug!(
            "{} -> {} ({} annotations)",
            case.image.file_name,
            case.case_id,
            case.annotations.len()
        );
        result.entry = Some(CaseEntry {
            case_id: case.case_id.clone(),
            image_id,
            file_name: case.image.file_name.clone(),
        });
        result
    }
}

/// Declared and decoded extents differ by at most this factor.
const MAX_SCALE: u64 = 8;

fn plausible(declared: u32, actual: u32) -> bool {
    let (declared, actual) = (u64::from(declared), u64::from(actual));
    declared <= actual * MAX_SCALE && actual <= declared * MAX_SCALE
}

/// Move a converted case's files to a new case id.
fn renumber(layout: &DatasetLayout, from: &str, to: &str) -> Result<(), Error> {
    log::debug!("Renumbering {} -> {}", from, to);
    std::fs::rename(layout.image_path(from), layout.image_path(to))?;
    std::fs::rename(layout.label_path(from), layout.label_path(to))?;
    Ok(())
}

fn record(result: &mut CaseResult, kind: IssueKind, image_id: u64, detail: String) {
    let issue = Issue::new(kind, detail).with_image(image_id);
    issue.log();
    result.issues.push(issue);
}
