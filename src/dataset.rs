use crate::align::{align_annotations, BeatLabel};
use crate::config::DatasetConfig;
use crate::error::DatasetError;
use crate::resample::resample_signal;
use crate::wfdb::RecordSource;

/// Named partition of the configured records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub const ALL: [Split; 2] = [Split::Train, Split::Test];

    pub fn name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}_set_signals.parquet", self.name())
    }

    pub fn record_ids(self, config: &DatasetConfig) -> &[String] {
        match self {
            Split::Train => &config.train_ids,
            Split::Test => &config.test_ids,
        }
    }
}

/// One record after resampling and label alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    pub record: String,
    /// Lead name of the selected channel, e.g. "MLII".
    pub channel_label: String,
    pub units: String,
    /// Rate of the source signal; label times are computed from it.
    pub source_rate: f64,
    pub signal: Vec<f64>,
    pub labels: Vec<BeatLabel>,
}

/// Records of one split, in configured order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub target_rate: f64,
    pub records: Vec<DatasetRecord>,
}

impl Dataset {
    pub fn signals(&self) -> impl Iterator<Item = &[f64]> {
        self.records.iter().map(|r| r.signal.as_slice())
    }

    pub fn labels(&self) -> impl Iterator<Item = &[BeatLabel]> {
        self.records.iter().map(|r| r.labels.as_slice())
    }

    pub fn record_ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.record.as_str())
    }

    pub fn label_count(&self) -> usize {
        self.records.iter().map(|r| r.labels.len()).sum()
    }
}

/// Fetches, resamples and labels records one at a time.
pub struct DatasetBuilder<'a, S: RecordSource> {
    source: &'a S,
    target_rate: f64,
    channel: usize,
}

impl<'a, S: RecordSource> DatasetBuilder<'a, S> {
    pub fn new(source: &'a S, target_rate: f64, channel: usize) -> Self {
        Self {
            source,
            target_rate,
            channel,
        }
    }

    pub fn from_config(source: &'a S, config: &DatasetConfig) -> Self {
        Self::new(source, config.target_rate, config.channel)
    }

    /// Build a dataset from `record_ids` in order. The first record that
    /// cannot be fetched or processed aborts the build.
    pub fn build(&self, record_ids: &[String]) -> Result<Dataset, DatasetError> {
        let records = record_ids
            .iter()
            .map(|id| self.build_record(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Dataset {
            target_rate: self.target_rate,
            records,
        })
    }

    pub fn build_record(&self, record_id: &str) -> Result<DatasetRecord, DatasetError> {
        log::info!("reading record {}", record_id);
        let source = self
            .source
            .fetch(record_id)
            .map_err(|e| DatasetError::Fetch {
                record: record_id.to_string(),
                source: e,
            })?;

        let missing = || DatasetError::MissingChannel {
            record: record_id.to_string(),
            channel: self.channel,
            available: source.signals.len(),
        };
        let samples = source.signals.get(self.channel).ok_or_else(missing)?;
        let info = source.channels.get(self.channel).ok_or_else(missing)?;
        log::debug!(
            "channel {} ({}): {} {}, digital [{}, {}], physical [{:.3}, {:.3}]",
            self.channel,
            info.label,
            source.sample_rate,
            info.units,
            info.digital_min(),
            info.digital_max(),
            info.physical_min(),
            info.physical_max()
        );

        let signal = resample_signal(samples, source.sample_rate, self.target_rate)?;
        let labels = align_annotations(&source.annotations, source.sample_rate);
        log::info!("{} labels for record {}", labels.len(), record_id);

        Ok(DatasetRecord {
            record: source.record_id,
            channel_label: info.label.clone(),
            units: info.units.clone(),
            source_rate: source.sample_rate,
            signal,
            labels,
        })
    }
}

/// Build one split with its configured record list.
pub fn build_split<S: RecordSource>(
    source: &S,
    config: &DatasetConfig,
    split: Split,
) -> Result<Dataset, DatasetError> {
    config.validate()?;
    log::info!("creating {} set", split.name());
    DatasetBuilder::from_config(source, config).build(split.record_ids(config))
}
