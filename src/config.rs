use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::DatasetError;

/// Inter-patient training records (DS1).
pub const DS1: [&str; 22] = [
    "101", "106", "108", "109", "112", "114", "115", "116", "118", "119", "122", "124", "201",
    "203", "205", "207", "208", "209", "215", "220", "223", "230",
];

/// Inter-patient test records (DS2).
pub const DS2: [&str; 22] = [
    "100", "103", "105", "111", "113", "117", "121", "123", "200", "202", "210", "212", "213",
    "214", "219", "221", "222", "228", "231", "232", "233", "234",
];

pub const TARGET_RATE: f64 = 150.0;

/// Settings for one dataset build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub train_ids: Vec<String>,
    pub test_ids: Vec<String>,
    /// Sample rate of the resampled signals, in Hz.
    pub target_rate: f64,
    /// Directory receiving the split files.
    pub output_location: PathBuf,
    /// Local WFDB database directory.
    pub database_dir: PathBuf,
    /// Signal channel taken from every record. Not corrected for records
    /// whose leads are stored in a different order.
    pub channel: usize,
    /// Annotator suffix of the reference annotation files.
    pub annotator: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            train_ids: DS1.iter().map(|s| s.to_string()).collect(),
            test_ids: DS2.iter().map(|s| s.to_string()).collect(),
            target_rate: TARGET_RATE,
            output_location: PathBuf::from("../datasets/"),
            database_dir: PathBuf::from("mitdb"),
            channel: 0,
            annotator: "atr".to_string(),
        }
    }
}

impl DatasetConfig {
    /// Load from a JSON file; absent fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), DatasetError> {
        if !(self.target_rate.is_finite() && self.target_rate > 0.0) {
            return Err(DatasetError::InvalidRate(self.target_rate));
        }
        if self.train_ids.is_empty() {
            return Err(DatasetError::EmptySplit("train"));
        }
        if self.test_ids.is_empty() {
            return Err(DatasetError::EmptySplit("test"));
        }

        let mut seen = HashSet::new();
        for id in &self.train_ids {
            if !seen.insert(id.as_str()) {
                return Err(DatasetError::DuplicateRecord(id.clone()));
            }
        }
        let train = seen;
        let mut seen = HashSet::new();
        for id in &self.test_ids {
            if train.contains(id.as_str()) {
                return Err(DatasetError::OverlappingSplits(id.clone()));
            }
            if !seen.insert(id.as_str()) {
                return Err(DatasetError::DuplicateRecord(id.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_splits_are_disjoint_and_complete() {
        let config = DatasetConfig::default();
        config.validate().unwrap();

        let train: HashSet<_> = DS1.iter().collect();
        let test: HashSet<_> = DS2.iter().collect();
        assert!(train.is_disjoint(&test));

        let universe: HashSet<&str> = config
            .train_ids
            .iter()
            .chain(&config.test_ids)
            .map(String::as_str)
            .collect();
        assert_eq!(universe.len(), 44);
        let union: HashSet<&str> = DS1.iter().chain(DS2.iter()).copied().collect();
        assert_eq!(universe, union);
    }

    #[test]
    fn rejects_overlap_duplicates_and_bad_rate() {
        let mut config = DatasetConfig::default();
        config.test_ids.push("101".to_string());
        assert!(matches!(
            config.validate(),
            Err(DatasetError::OverlappingSplits(id)) if id == "101"
        ));

        let mut config = DatasetConfig::default();
        config.train_ids.push("106".to_string());
        assert!(matches!(
            config.validate(),
            Err(DatasetError::DuplicateRecord(_))
        ));

        let config = DatasetConfig {
            target_rate: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DatasetError::InvalidRate(_))));

        let config = DatasetConfig {
            test_ids: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DatasetError::EmptySplit("test"))));
    }

    #[test]
    fn json_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "train_ids": ["100"], "test_ids": ["101"], "target_rate": 250.0 }"#,
        )
        .unwrap();
        let config = DatasetConfig::from_json_file(&path).unwrap();
        assert_eq!(config.train_ids, vec!["100"]);
        assert_eq!(config.target_rate, 250.0);
        assert_eq!(config.channel, 0);
        assert_eq!(config.database_dir, PathBuf::from("mitdb"));
        config.validate().unwrap();
    }
}
