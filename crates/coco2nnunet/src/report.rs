// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Absorbed per-image and per-annotation problems.
//!
//! None of these abort a conversion run. Each one is logged where it is
//! absorbed and collected into the run's report.

use serde::Serialize;
use std::{collections::BTreeMap, fmt};

/// Classification of an absorbed problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Compressed RLE was encountered; the annotation contributes nothing.
    UnsupportedEncoding,
    /// Missing/empty segmentation, polygon with fewer than 3 points or an
    /// unrecognised segmentation shape.
    MalformedAnnotation,
    /// The annotation's category is absent or not part of the priority order.
    UnknownCategory,
    /// The annotation references an image id with no image record.
    UnknownImage,
    /// The source image file does not exist.
    MissingSourceAsset,
    /// Neither the image record nor the source file provides a usable
    /// canvas size.
    MissingDimensions,
    /// The declared size disagrees with the source file; the source is
    /// resized to the declared canvas.
    DimensionMismatch,
    /// Polygon vertices outside the canvas were clipped.
    GeometryOutOfBounds,
    /// The source image could not be decoded or an output could not be
    /// written.
    ImageFailure,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueKind::UnsupportedEncoding => "unsupported encoding",
            IssueKind::MalformedAnnotation => "malformed annotation",
            IssueKind::UnknownCategory => "unknown category",
            IssueKind::UnknownImage => "unknown image",
            IssueKind::MissingSourceAsset => "missing source asset",
            IssueKind::MissingDimensions => "missing dimensions",
            IssueKind::DimensionMismatch => "dimension mismatch",
            IssueKind::GeometryOutOfBounds => "geometry out of bounds",
            IssueKind::ImageFailure => "image failure",
        };
        f.write_str(name)
    }
}

/// One absorbed problem with the records it concerns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation_id: Option<u64>,
    pub detail: String,
}

impl Issue {
    pub fn new(kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            image_id: None,
            annotation_id: None,
            detail: detail.into(),
        }
    }

    pub fn with_image(mut self, image_id: u64) -> Self {
        self.image_id = Some(image_id);
        self
    }

    pub fn with_annotation(mut self, annotation_id: u64) -> Self {
        self.annotation_id = Some(annotation_id);
        self
    }

    /// Log the issue at the level matching its severity.
    pub fn log(&self) {
        match self.kind {
            IssueKind::GeometryOutOfBounds => log::debug!("{}", self),
            _ => log::warn!("{}", self),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        match (self.image_id, self.annotation_id) {
            (Some(img), Some(ann)) => write!(f, " (image {}, annotation {})", img, ann)?,
            (Some(img), None) => write!(f, " (image {})", img)?,
            (None, Some(ann)) => write!(f, " (annotation {})", ann)?,
            (None, None) => {}
        }
        write!(f, ": {}", self.detail)
    }
}

/// Count issues by kind, in a stable order.
pub fn count_by_kind(issues: &[Issue]) -> BTreeMap<IssueKind, usize> {
    let mut counts = BTreeMap::new();
    for issue in issues {
        *counts.entry(issue.kind).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_display() {
        let issue = Issue::new(IssueKind::UnsupportedEncoding, "compressed RLE")
            .with_image(4)
            .with_annotation(17);
        assert_eq!(
            issue.to_string(),
            "unsupported encoding (image 4, annotation 17): compressed RLE"
        );

        let issue = Issue::new(IssueKind::MissingSourceAsset, "train/a.jpg").with_image(2);
        assert_eq!(issue.to_string(), "missing source asset (image 2): train/a.jpg");
    }

    #[test]
    fn test_count_by_kind() {
        let issues = vec![
            Issue::new(IssueKind::MalformedAnnotation, "a"),
            Issue::new(IssueKind::UnknownCategory, "b"),
            Issue::new(IssueKind::MalformedAnnotation, "c"),
        ];
        let counts = count_by_kind(&issues);
        assert_eq!(counts[&IssueKind::MalformedAnnotation], 2);
        assert_eq!(counts[&IssueKind::UnknownCategory], 1);
        assert!(!counts.contains_key(&IssueKind::ImageFailure));
    }
}
