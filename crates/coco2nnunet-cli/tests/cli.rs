// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use assert_cmd::Command;
use image::{GrayImage, Luma, RgbImage};
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ANNOTATIONS: &str = r#"{
    "categories": [
        {"id": 1, "name": "cyst"},
        {"id": 2, "name": "kidney"}
    ],
    "images": [
        {"id": 1, "file_name": "scan_001.png", "width": 100, "height": 100},
        {"id": 2, "file_name": "scan_002.png", "width": 100, "height": 100}
    ],
    "annotations": [
        {"id": 1, "image_id": 1, "category_id": 2,
         "segmentation": [[10, 10, 50, 10, 50, 50, 10, 50]]},
        {"id": 2, "image_id": 1, "category_id": 1,
         "segmentation": [[30, 30, 40, 30, 40, 40, 30, 40]]}
    ]
}"#;

/// Command with configuration isolated from the host environment.
fn coco2nnunet(home: &Path) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("coco2nnunet")?;
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("COCO2NNUNET_CONFIG")
        .env_remove("COCO2NNUNET_PRIORITY")
        .env_remove("COCO2NNUNET_SKIP_UNANNOTATED");
    Ok(cmd)
}

fn source_tree(root: &Path) -> Result<(PathBuf, PathBuf), Box<dyn std::error::Error>> {
    let images = root.join("train");
    std::fs::create_dir_all(&images)?;
    RgbImage::new(100, 100).save(images.join("scan_001.png"))?;
    RgbImage::new(100, 100).save(images.join("scan_002.png"))?;
    let annotations = images.join("_annotations.coco.json");
    std::fs::write(&annotations, ANNOTATIONS)?;
    Ok((annotations, images))
}

fn convert(
    home: &Path,
    annotations: &Path,
    images: &Path,
    output: &Path,
) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = coco2nnunet(home)?;
    cmd.arg("convert")
        .arg("--annotations")
        .arg(annotations)
        .arg("--images")
        .arg(images)
        .arg("--output")
        .arg(output);
    Ok(cmd)
}

#[test]
fn test_version() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    coco2nnunet(dir.path())?
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn test_convert_and_verify() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let (annotations, images) = source_tree(dir.path())?;
    let output = dir.path().join("Dataset001_KidneyCyst");
    let report = dir.path().join("report.json");

    convert(dir.path(), &annotations, &images, &output)?
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("=== Conversion Complete ==="))
        .stdout(predicate::str::contains("Processed images:      2"));

    let label = image::open(output.join("labelsTr/case001.png"))?.into_luma8();
    assert_eq!(label.get_pixel(35, 35).0[0], 1);
    assert_eq!(label.get_pixel(20, 20).0[0], 2);
    assert_eq!(label.get_pixel(80, 80).0[0], 0);
    assert!(output.join("imagesTr/case002_0000.png").is_file());

    let summary: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&report)?)?;
    assert_eq!(summary["converted"], 2);
    assert_eq!(summary["label_pixels"]["1"], 100);

    coco2nnunet(dir.path())?
        .arg("verify")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED"));
    Ok(())
}

#[test]
fn test_convert_skip_unannotated_sequential() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let (annotations, images) = source_tree(dir.path())?;
    let output = dir.path().join("out");

    convert(dir.path(), &annotations, &images, &output)?
        .arg("--skip-unannotated")
        .arg("--sequential")
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped (no annotations): 1"));

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("dataset.json"))?)?;
    assert_eq!(manifest["numTraining"], 1);
    Ok(())
}

#[test]
fn test_convert_refuses_existing_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let (annotations, images) = source_tree(dir.path())?;
    let output = dir.path().join("out");

    convert(dir.path(), &annotations, &images, &output)?
        .assert()
        .success();
    convert(dir.path(), &annotations, &images, &output)?
        .assert()
        .failure();
    convert(dir.path(), &annotations, &images, &output)?
        .arg("--force")
        .assert()
        .success();
    Ok(())
}

#[test]
fn test_convert_missing_annotations() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    convert(
        dir.path(),
        &dir.path().join("missing.json"),
        dir.path(),
        &dir.path().join("out"),
    )?
    .assert()
    .failure();
    Ok(())
}

#[test]
fn test_verify_detects_bad_label() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let (annotations, images) = source_tree(dir.path())?;
    let output = dir.path().join("out");
    convert(dir.path(), &annotations, &images, &output)?
        .assert()
        .success();

    GrayImage::from_pixel(100, 100, Luma([42])).save(output.join("labelsTr/case002.png"))?;
    coco2nnunet(dir.path())?
        .arg("verify")
        .arg(&output)
        .assert()
        .failure()
        .stdout(predicate::str::contains("unexpected values [42]"))
        .stdout(predicate::str::contains("FAILED"));
    Ok(())
}

#[test]
fn test_verify_against_annotations() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let (annotations, images) = source_tree(dir.path())?;
    let output = dir.path().join("out");
    convert(dir.path(), &annotations, &images, &output)?
        .assert()
        .success();
    RgbImage::new(100, 100).save(images.join("scan_003.png"))?;

    let verify = |dir: &Path| -> Result<Command, Box<dyn std::error::Error>> {
        let mut cmd = coco2nnunet(dir)?;
        cmd.arg("verify")
            .arg(&output)
            .arg("--annotations")
            .arg(&annotations)
            .arg("--images")
            .arg(&images);
        Ok(cmd)
    };
    verify(dir.path())?
        .assert()
        .success()
        .stdout(predicate::str::contains("Overlay checked: 2"))
        .stdout(predicate::str::contains("scan_003.png"))
        .stdout(predicate::str::contains("PASSED"));

    // kidney-only label where the cyst should be
    GrayImage::from_pixel(100, 100, Luma([2])).save(output.join("labelsTr/case001.png"))?;
    verify(dir.path())?
        .assert()
        .failure()
        .stdout(predicate::str::contains("Overlay mismatches: 1"))
        .stdout(predicate::str::contains("FAILED"));
    Ok(())
}

#[test]
fn test_inspect_uses_case_map() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let (annotations, images) = source_tree(dir.path())?;
    let output = dir.path().join("out");
    convert(dir.path(), &annotations, &images, &output)?
        .assert()
        .success();

    coco2nnunet(dir.path())?
        .arg("inspect")
        .arg(output.join("labelsTr/case001.png"))
        .assert()
        .success()
        .stdout(predicate::str::contains("scan_001.png (image 1)"))
        .stdout(predicate::str::contains("kidney"))
        .stdout(predicate::str::contains("cyst"));
    Ok(())
}

#[test]
fn test_config_file_and_env() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let config = dir.path().join("coco2nnunet.toml");
    std::fs::write(&config, "dataset_name = \"Renal\"\ncase_prefix = \"kid\"\n")?;

    coco2nnunet(dir.path())?
        .arg("--config")
        .arg(&config)
        .arg("config")
        .env("COCO2NNUNET_SKIP_UNANNOTATED", "true")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dataset_name\": \"Renal\""))
        .stdout(predicate::str::contains("\"case_prefix\": \"kid\""))
        .stdout(predicate::str::contains("\"skip_unannotated\": true"));
    Ok(())
}

#[test]
fn test_invalid_config_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let config = dir.path().join("coco2nnunet.toml");
    std::fs::write(&config, "priority = [2, 7]\n")?;

    coco2nnunet(dir.path())?
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .failure();
    Ok(())
}
