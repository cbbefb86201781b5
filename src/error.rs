use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to fetch record {record}")]
    Fetch {
        record: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("sample rate must be positive and finite, got {0}")]
    InvalidRate(f64),

    #[error("cannot resample an empty signal")]
    EmptySignal,

    #[error("record {0} is listed in both train and test splits")]
    OverlappingSplits(String),

    #[error("record {0} is listed more than once")]
    DuplicateRecord(String),

    #[error("split {0} has no records")]
    EmptySplit(&'static str),

    #[error("channel {channel} not present in record {record} ({available} channels)")]
    MissingChannel {
        record: String,
        channel: usize,
        available: usize,
    },
}
