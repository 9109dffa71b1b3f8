// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! End-to-end conversion of a small synthetic kidney/cyst export.
//!
//! Builds a COCO document and its source images in a temporary directory,
//! converts it, then reads the nnU-Net output back.

use coco2nnunet::{
    CaseMap, ConversionConfig, Converter, DatasetManifest, IssueKind, VerifyOptions,
    count_by_kind, inspect_label, nnunet::DatasetLayout, verify_dataset,
};
use image::{GrayImage, Rgb, RgbImage};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

const ANNOTATIONS: &str = r#"{
    "info": {"description": "kidney cyst export"},
    "categories": [
        {"id": 1, "name": "cyst", "supercategory": "lesion"},
        {"id": 2, "name": "kidney", "supercategory": "organ"}
    ],
    "images": [
        {"id": 1, "file_name": "scan_001.jpg", "width": 100, "height": 100},
        {"id": 2, "file_name": "scan_002.png", "width": 64, "height": 48},
        {"id": 3, "file_name": "scan_003.png", "width": 32, "height": 32},
        {"id": 4, "file_name": "scan_004.png", "width": 32, "height": 32},
        {"id": 5, "file_name": "scan_005.png"}
    ],
    "annotations": [
        {"id": 11, "image_id": 1, "category_id": 1,
         "segmentation": [[30, 30, 40, 30, 40, 40, 30, 40]]},
        {"id": 10, "image_id": 1, "category_id": 2,
         "segmentation": [[10, 10, 50, 10, 50, 50, 10, 50]]},
        {"id": 20, "image_id": 2, "category_id": 2,
         "segmentation": {"counts": [64, 128, 2880], "size": [48, 64]}},
        {"id": 21, "image_id": 2, "category_id": 1,
         "segmentation": {"counts": "PPYo1", "size": [48, 64]}},
        {"id": 22, "image_id": 2, "category_id": 3,
         "segmentation": [[0, 0, 10, 0, 10, 10, 0, 10]]},
        {"id": 40, "image_id": 4, "category_id": 2,
         "segmentation": [[1, 1, 2, 2]]},
        {"id": 50, "image_id": 5, "category_id": 1,
         "segmentation": [[-5, -5, 8, -5, 8, 8, -5, 8]]},
        {"id": 90, "image_id": 404, "category_id": 1,
         "segmentation": [[0, 0, 4, 0, 4, 4, 0, 4]]}
    ]
}"#;

struct Fixture {
    _dir: TempDir,
    annotations: PathBuf,
    images: PathBuf,
    output: PathBuf,
}

fn write_source(dir: &Path, name: &str, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([40, 80, 120]))
        .save(dir.join(name))
        .unwrap();
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let images = dir.path().join("train");
    std::fs::create_dir_all(&images).unwrap();
    write_source(&images, "scan_001.jpg", 100, 100);
    write_source(&images, "scan_002.png", 64, 48);
    write_source(&images, "scan_003.png", 32, 32);
    // scan_004.png is missing on purpose
    write_source(&images, "scan_005.png", 16, 12);

    let annotations = images.join("_annotations.coco.json");
    std::fs::write(&annotations, ANNOTATIONS).unwrap();
    let output = dir.path().join("Dataset001_KidneyCyst");

    Fixture {
        _dir: dir,
        annotations,
        images,
        output,
    }
}

fn read_label(path: &Path) -> GrayImage {
    image::open(path).unwrap().into_luma8()
}

#[test]
fn test_kidney_cyst_conversion() {
    let fixture = fixture();
    let converter = Converter::new(ConversionConfig::default()).unwrap();
    let summary = converter
        .convert(&fixture.annotations, &fixture.images, &fixture.output, None)
        .unwrap();

    assert_eq!(summary.images_total, 5);
    assert_eq!(summary.converted, 4);
    assert_eq!(summary.failed, 1);

    let kinds = count_by_kind(&summary.issues);
    assert_eq!(kinds.get(&IssueKind::MissingSourceAsset), Some(&1));
    assert_eq!(kinds.get(&IssueKind::UnknownImage), Some(&1));
    assert_eq!(kinds.get(&IssueKind::UnsupportedEncoding), Some(&1));
    assert_eq!(kinds.get(&IssueKind::UnknownCategory), Some(&1));
    assert_eq!(kinds.get(&IssueKind::MissingDimensions), Some(&1));
    assert_eq!(kinds.get(&IssueKind::GeometryOutOfBounds), Some(&1));

    let case_map = CaseMap::load(fixture.output.join("case_map.json")).unwrap();
    assert_eq!(case_map.case_for_image(1), Some("case001"));
    assert_eq!(case_map.case_for_image(2), Some("case002"));
    assert_eq!(case_map.case_for_image(3), Some("case003"));
    assert_eq!(case_map.case_for_image(4), None);
    assert_eq!(case_map.case_for_image(5), Some("case004"));
    assert_eq!(case_map.case_for_file("scan_001.jpg"), Some("case001"));

    let layout = DatasetLayout::new(&fixture.output, &ConversionConfig::default());

    // kidney square with a cyst inside: the cyst wins even though it is
    // listed first in the document
    let label = read_label(&layout.label_path("case001"));
    assert_eq!(label.dimensions(), (100, 100));
    assert_eq!(label.get_pixel(5, 5).0[0], 0);
    assert_eq!(label.get_pixel(20, 20).0[0], 2);
    assert_eq!(label.get_pixel(35, 35).0[0], 1);
    assert_eq!(label.get_pixel(49, 49).0[0], 2);
    assert_eq!(label.get_pixel(50, 50).0[0], 0);
    let histogram = inspect_label(layout.label_path("case001")).unwrap().histogram;
    assert_eq!(
        histogram,
        BTreeMap::from([(0, 10000 - 1600), (1, 100), (2, 1500)])
    );

    // RLE kidney covering rows 1 and 2; compressed cyst and unknown
    // category contribute nothing
    let label = read_label(&layout.label_path("case002"));
    assert_eq!(label.dimensions(), (64, 48));
    assert_eq!(label.get_pixel(0, 0).0[0], 0);
    assert_eq!(label.get_pixel(5, 1).0[0], 2);
    assert_eq!(label.get_pixel(63, 2).0[0], 2);
    assert_eq!(label.get_pixel(0, 3).0[0], 0);

    // unannotated image still becomes an all-background case
    let label = read_label(&layout.label_path("case003"));
    assert!(label.pixels().all(|p| p.0[0] == 0));

    // no declared size: canvas comes from the file, polygon is clipped
    let label = read_label(&layout.label_path("case004"));
    assert_eq!(label.dimensions(), (16, 12));
    assert_eq!(label.get_pixel(0, 0).0[0], 1);
    assert_eq!(label.get_pixel(7, 7).0[0], 1);
    assert_eq!(label.get_pixel(8, 8).0[0], 0);

    let image = image::open(layout.image_path("case001")).unwrap();
    assert_eq!((image.width(), image.height()), (100, 100));

    let manifest = DatasetManifest::read(fixture.output.join("dataset.json")).unwrap();
    assert_eq!(manifest.num_training, 4);
    assert_eq!(manifest.labels.get("cyst"), Some(&1));
    assert_eq!(manifest.labels.get("kidney"), Some(&2));

    let report = verify_dataset(
        &fixture.output,
        &ConversionConfig::default(),
        &VerifyOptions::default(),
    )
    .unwrap();
    assert!(report.is_valid(), "{}", report);
    assert_eq!(report.labels_checked, 4);
}

#[test]
fn test_parallel_and_sequential_agree() {
    let fixture = fixture();
    let parallel_out = fixture.output.with_file_name("parallel");
    let sequential_out = fixture.output.with_file_name("sequential");

    Converter::new(ConversionConfig::default())
        .unwrap()
        .convert(&fixture.annotations, &fixture.images, &parallel_out, None)
        .unwrap();
    let sequential = ConversionConfig {
        parallel: false,
        ..Default::default()
    };
    Converter::new(sequential)
        .unwrap()
        .convert(&fixture.annotations, &fixture.images, &sequential_out, None)
        .unwrap();

    let layout = |root: &Path| DatasetLayout::new(root, &ConversionConfig::default());
    for case_id in ["case001", "case002", "case003", "case004"] {
        let a = read_label(&layout(&parallel_out).label_path(case_id));
        let b = read_label(&layout(&sequential_out).label_path(case_id));
        assert_eq!(a.as_raw(), b.as_raw(), "{} differs", case_id);
    }
    assert_eq!(
        std::fs::read_to_string(parallel_out.join("case_map.json")).unwrap(),
        std::fs::read_to_string(sequential_out.join("case_map.json")).unwrap()
    );
}

#[test]
fn test_priority_is_configurable() {
    let fixture = fixture();
    // kidney over cyst: the inner square disappears
    let config = ConversionConfig {
        priority: vec![1, 2],
        ..Default::default()
    };
    Converter::new(config)
        .unwrap()
        .convert(&fixture.annotations, &fixture.images, &fixture.output, None)
        .unwrap();

    let layout = DatasetLayout::new(&fixture.output, &ConversionConfig::default());
    let histogram = inspect_label(layout.label_path("case001")).unwrap().histogram;
    assert_eq!(histogram, BTreeMap::from([(0, 10000 - 1600), (2, 1600)]));
}

#[test]
fn test_missing_annotation_file() {
    let dir = TempDir::new().unwrap();
    let converter = Converter::new(ConversionConfig::default()).unwrap();
    let result = converter.convert(
        dir.path().join("nope.json"),
        dir.path(),
        dir.path().join("out"),
        None,
    );
    assert!(matches!(result, Err(coco2nnunet::Error::IoError(_))));
}
