mod align;
mod config;
mod dataset;
mod ecg_types;
mod edf_write;
mod error;
mod resample;
mod store;
mod wfdb;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use config::DatasetConfig;
use dataset::{DatasetBuilder, Split};
use wfdb::WfdbDirectory;

/// Build inter-patient train/test sets from the MIT-BIH Arrhythmia Database.
#[derive(Parser, Debug)]
#[command(name = "mitdb-dataset", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resample records, align labels and write the split files
    Build {
        #[command(flatten)]
        settings: Settings,

        /// Directory for the split files
        #[arg(long)]
        output: Option<PathBuf>,

        /// Build only this split
        #[arg(long, value_parser = ["train", "test"])]
        split: Option<String>,
    },

    /// Write one processed record as an EDF+ file with beat annotations
    ExportEdf {
        #[command(flatten)]
        settings: Settings,

        #[arg(long)]
        record: String,

        #[arg(long)]
        output: PathBuf,
    },

    /// Print a summary of a written split file
    Inspect { path: PathBuf },
}

#[derive(Args, Debug)]
struct Settings {
    /// JSON file with dataset settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Local WFDB database directory (e.g. an unpacked mitdb)
    #[arg(long)]
    db_dir: Option<PathBuf>,

    /// Sample rate of the resampled signals, in Hz
    #[arg(long)]
    target_rate: Option<f64>,

    /// Signal channel taken from each record
    #[arg(long)]
    channel: Option<usize>,

    /// Annotator suffix of the annotation files
    #[arg(long)]
    annotator: Option<String>,
}

impl Settings {
    fn load(&self) -> Result<DatasetConfig> {
        let mut config = match &self.config {
            Some(path) => DatasetConfig::from_json_file(path)?,
            None => DatasetConfig::default(),
        };
        if let Some(dir) = &self.db_dir {
            config.database_dir = dir.clone();
        }
        if let Some(rate) = self.target_rate {
            config.target_rate = rate;
        }
        if let Some(channel) = self.channel {
            config.channel = channel;
        }
        if let Some(annotator) = &self.annotator {
            config.annotator = annotator.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Build {
            settings,
            output,
            split,
        } => {
            let mut config = settings.load()?;
            if let Some(output) = output {
                config.output_location = output;
            }
            let splits: Vec<Split> = Split::ALL
                .into_iter()
                .filter(|s| split.as_deref().map_or(true, |name| name == s.name()))
                .collect();
            build(&config, &splits)
        }
        Command::ExportEdf {
            settings,
            record,
            output,
        } => {
            let config = settings.load()?;
            let source = record_source(&config);
            let processed = DatasetBuilder::from_config(&source, &config).build_record(&record)?;
            edf_write::write_edf(&output, &processed, config.target_rate)
        }
        Command::Inspect { path } => inspect(&path),
    }
}

fn record_source(config: &DatasetConfig) -> WfdbDirectory {
    WfdbDirectory::new(&config.database_dir).with_annotator(&config.annotator)
}

fn build(config: &DatasetConfig, splits: &[Split]) -> Result<()> {
    let source = record_source(config);

    for &split in splits {
        let dataset = dataset::build_split(&source, config, split)?;
        let path = config.output_location.join(split.file_name());
        store::write_split(&path, &dataset)
            .with_context(|| format!("saving {} set", split.name()))?;
    }
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let dataset = store::read_split(path)?;
    println!(
        "{}: {} records at {} Hz",
        path.display(),
        dataset.records.len(),
        dataset.target_rate
    );
    let rows = dataset
        .record_ids()
        .zip(dataset.signals())
        .zip(dataset.labels());
    for ((record, signal), labels) in rows {
        let duration = signal.len() as f64 / dataset.target_rate;
        println!(
            "  {:>5} {:>8} samples ({:.1} s) {:>6} labels",
            record,
            signal.len(),
            duration,
            labels.len()
        );
    }
    println!("Total labels: {}", dataset.label_count());
    Ok(())
}
