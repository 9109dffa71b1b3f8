// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Priority-ordered label compositing.
//!
//! Categories are painted from lowest to highest priority and each paint
//! unconditionally overwrites what is underneath, so wherever regions of
//! different categories overlap the higher-priority category wins. The order
//! is explicit data and is never derived from the numeric category ids.
//!
//! ```
//! use coco2nnunet::coco::{CocoAnnotation, CocoSegmentation};
//! use coco2nnunet::mask::composite::{Compositor, PriorityOrder};
//!
//! // Kidney (2) first, cyst (1) second: cyst wins overlaps.
//! let compositor = Compositor::new(PriorityOrder::new(vec![2, 1])?);
//! let square = |id, cat, lo: f64, hi: f64| CocoAnnotation {
//!     id,
//!     image_id: 1,
//!     category_id: Some(cat),
//!     segmentation: Some(CocoSegmentation::Polygon(vec![vec![lo, lo, hi, lo, hi, hi, lo, hi]])),
//!     ..Default::default()
//! };
//! let annotations = [square(1, 1, 30.0, 70.0), square(2, 2, 10.0, 50.0)];
//! let composite = compositor.composite(1, 100, 100, &annotations);
//! assert_eq!(composite.raster.get(40, 40), 1);
//! assert_eq!(composite.raster.get(20, 20), 2);
//! assert_eq!(composite.raster.get(80, 80), 0);
//! # Ok::<(), coco2nnunet::Error>(())
//! ```

use super::{LabelRaster, decode_segmentation};
use crate::{
    Error,
    coco::CocoAnnotation,
    report::{Issue, IssueKind},
};
use std::collections::HashSet;

/// Ordered list of category ids, lowest priority first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityOrder(Vec<u32>);

impl PriorityOrder {
    /// Build a priority order.
    ///
    /// Ids must be unique, nonzero (0 is background) and fit in an 8-bit
    /// raster.
    pub fn new(ids: Vec<u32>) -> Result<Self, Error> {
        if ids.is_empty() {
            return Err(Error::InvalidConfig(
                "priority order must name at least one category".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for &id in &ids {
            if id == 0 || id > u8::MAX as u32 {
                return Err(Error::InvalidConfig(format!(
                    "category id {} in priority order must be within 1..=255",
                    id
                )));
            }
            if !seen.insert(id) {
                return Err(Error::InvalidConfig(format!(
                    "category id {} appears twice in priority order",
                    id
                )));
            }
        }
        Ok(Self(ids))
    }

    /// Category ids, lowest priority first.
    pub fn ids(&self) -> &[u32] {
        &self.0
    }

    /// Position of a category in the paint order.
    pub fn rank(&self, category_id: u32) -> Option<usize> {
        self.0.iter().position(|&id| id == category_id)
    }

    pub fn contains(&self, category_id: u32) -> bool {
        self.rank(category_id).is_some()
    }
}

/// Outcome of compositing one image.
#[derive(Debug, Clone)]
pub struct Composite {
    pub raster: LabelRaster,
    pub report: CompositeReport,
}

#[derive(Debug, Clone, Default)]
pub struct CompositeReport {
    /// Annotations whose decoded mask was painted.
    pub painted: usize,
    /// Everything absorbed while compositing.
    pub issues: Vec<Issue>,
}

/// Paints annotations into a label raster in priority order.
#[derive(Debug, Clone)]
pub struct Compositor {
    priority: PriorityOrder,
}

impl Compositor {
    pub fn new(priority: PriorityOrder) -> Self {
        Self { priority }
    }

    pub fn priority(&self) -> &PriorityOrder {
        &self.priority
    }

    /// Composite every annotation of one image onto a `(height, width)`
    /// canvas.
    ///
    /// Annotations without a segmentation, with an unsupported or malformed
    /// segmentation, or whose category is not in the priority order
    /// contribute nothing and are reported. The raster depends only on the
    /// annotation set and the priority order, not on iteration order.
    pub fn composite<'a, I>(
        &self,
        image_id: u64,
        height: u32,
        width: u32,
        annotations: I,
    ) -> Composite
    where
        I: IntoIterator<Item = &'a CocoAnnotation>,
    {
        let mut report = CompositeReport::default();
        let mut by_rank: Vec<Vec<&CocoAnnotation>> = vec![Vec::new(); self.priority.ids().len()];

        for ann in annotations {
            let rank = ann.category_id.and_then(|id| self.priority.rank(id));
            match rank {
                Some(rank) => by_rank[rank].push(ann),
                None => {
                    let detail = match ann.category_id {
                        Some(id) => format!("category {} is not in the priority order", id),
                        None => "annotation has no category".to_string(),
                    };
                    report.issues.push(absorb(
                        Issue::new(IssueKind::UnknownCategory, detail),
                        image_id,
                        ann.id,
                    ));
                }
            }
        }

        let mut raster = LabelRaster::new(height, width);
        for (&category_id, annotations) in self.priority.ids().iter().zip(&by_rank) {
            // PriorityOrder::new guarantees the id fits in u8.
            let value = category_id as u8;
            for ann in annotations {
                let Some(segmentation) = &ann.segmentation else {
                    report.issues.push(absorb(
                        Issue::new(IssueKind::MalformedAnnotation, "missing segmentation"),
                        image_id,
                        ann.id,
                    ));
                    continue;
                };

                let decoded = decode_segmentation(segmentation, height, width);
                report.issues.extend(
                    decoded
                        .issues
                        .into_iter()
                        .map(|issue| absorb(issue, image_id, ann.id)),
                );
                if !decoded.mask.is_empty() {
                    raster.paint(&decoded.mask, value);
                    report.painted += 1;
                }
            }
        }

        Composite { raster, report }
    }
}

fn absorb(issue: Issue, image_id: u64, annotation_id: u64) -> Issue {
    let issue = issue.with_image(image_id).with_annotation(annotation_id);
    issue.log();
    issue
}
