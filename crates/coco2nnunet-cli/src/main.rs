// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{Parser, Subcommand};
use coco2nnunet::{
    CaseMap, ConversionConfig, Converter, Error, Progress, VerifyOptions, inspect_label,
    nnunet::CASE_MAP_FILE, verify_dataset,
};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file layered over the user configuration and under
    /// COCO2NNUNET_* environment overrides.
    #[clap(long, env = "COCO2NNUNET_CONFIG")]
    config: Option<PathBuf>,

    /// Converter Command
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Convert a COCO segmentation export into an nnU-Net v2 raw dataset.
    /// Every image record becomes one case with an image in imagesTr and a
    /// single-channel label in labelsTr; dataset.json and case_map.json are
    /// written to the output directory.
    Convert {
        /// COCO annotation JSON file
        #[clap(long)]
        annotations: PathBuf,

        /// Directory holding the source images named by the annotation file
        #[clap(long)]
        images: PathBuf,

        /// nnU-Net dataset directory, e.g. nnUNet_raw/Dataset001_KidneyCyst
        #[clap(long)]
        output: PathBuf,

        /// Leave images without annotations out of the dataset
        #[clap(long)]
        skip_unannotated: bool,

        /// Convert one image at a time instead of in parallel
        #[clap(long)]
        sequential: bool,

        /// Replace the files of a previous run in the output directory
        #[clap(long)]
        force: bool,

        /// Write the conversion summary as JSON to this file
        #[clap(long)]
        report: Option<PathBuf>,
    },
    /// Verify an nnU-Net dataset directory.  Exits with a non-zero status
    /// when any check fails.
    Verify {
        /// nnU-Net dataset directory
        dataset: PathBuf,

        /// Only check the pixel values of the first N labels (0 = all)
        #[clap(long, default_value_t = 0)]
        sample: usize,

        /// COCO annotation file the dataset was converted from; checked
        /// labels are composited again and compared with it
        #[clap(long)]
        annotations: Option<PathBuf>,

        /// Source image directory; lists images no record names
        #[clap(long, requires = "annotations")]
        images: Option<PathBuf>,
    },
    /// Print the pixel value histogram of one or more label files.
    Inspect {
        /// Label files to inspect
        #[clap(required = true)]
        labels: Vec<PathBuf>,

        /// Case map used to name the source image of each label.  Defaults to
        /// case_map.json in the dataset directory of the first label.
        #[clap(long)]
        case_map: Option<PathBuf>,
    },
    /// Print the effective configuration as JSON.
    Config,
}

#[allow(clippy::too_many_arguments)]
fn handle_convert(
    mut config: ConversionConfig,
    annotations: PathBuf,
    images: PathBuf,
    output: PathBuf,
    skip_unannotated: bool,
    sequential: bool,
    force: bool,
    report: Option<PathBuf>,
) -> Result<(), Error> {
    use indicatif::{ProgressBar, ProgressStyle};

    if skip_unannotated {
        config.skip_unannotated = true;
    }
    if sequential {
        config.parallel = false;
    }
    let converter = Converter::new(config)?.with_overwrite(force);

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise} ETA: {eta}] {msg}: {wide_bar:.yellow} {human_pos}/{human_len}",
        )
        .unwrap()
        .progress_chars("█▇▆▅▄▃▂▁  "),
    );
    bar.set_message("Converting");

    let (tx, rx) = mpsc::channel::<Progress>();
    let handle = thread::spawn(move || {
        for progress in rx {
            if progress.total > 0 {
                bar.set_length(progress.total as u64);
                // completion order is not monotonic across workers
                if progress.current as u64 > bar.position() {
                    bar.set_position(progress.current as u64);
                }
            }
        }
        bar.finish_and_clear();
    });

    let result = converter.convert(&annotations, &images, &output, Some(tx));
    let _ = handle.join();
    let summary = result?;

    println!("{}", summary);
    if let Some(path) = report {
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &summary)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        println!("Report:           {}", path.display());
    }
    Ok(())
}

fn handle_verify(
    config: &ConversionConfig,
    dataset: PathBuf,
    options: VerifyOptions,
) -> Result<(), Error> {
    let report = verify_dataset(&dataset, config, &options)?;
    println!("{}", report);
    if !report.is_valid() {
        std::process::exit(1);
    }
    Ok(())
}

fn default_case_map(label: &Path) -> Option<PathBuf> {
    let path = label.parent()?.parent()?.join(CASE_MAP_FILE);
    path.is_file().then_some(path)
}

fn handle_inspect(
    config: &ConversionConfig,
    labels: Vec<PathBuf>,
    case_map: Option<PathBuf>,
) -> Result<(), Error> {
    let case_map_path = case_map.or_else(|| labels.first().and_then(|l| default_case_map(l)));
    let case_map = match case_map_path {
        Some(path) => Some(CaseMap::load(path)?),
        None => None,
    };

    for label in labels {
        let inspection = inspect_label(&label)?;
        println!("{}", inspection.describe(config, case_map.as_ref()));
    }
    Ok(())
}

fn handle_config(config: &ConversionConfig) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ConversionConfig::load(args.config.as_deref())?;
    log::debug!("Effective configuration: {:?}", config);

    match args.cmd {
        Command::Convert {
            annotations,
            images,
            output,
            skip_unannotated,
            sequential,
            force,
            report,
        } => handle_convert(
            config,
            annotations,
            images,
            output,
            skip_unannotated,
            sequential,
            force,
            report,
        ),
        Command::Verify {
            dataset,
            sample,
            annotations,
            images,
        } => handle_verify(
            &config,
            dataset,
            VerifyOptions {
                sample,
                annotations,
                images,
            },
        ),
        Command::Inspect { labels, case_map } => handle_inspect(&config, labels, case_map),
        Command::Config => handle_config(&config),
    }
}
