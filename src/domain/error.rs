//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for peaktrail.
#[derive(Debug, thiserror::Error)]
pub enum PeakTrailError {
    #[error("no partition {partition} for {asset}")]
    PartitionNotFound { asset: String, partition: NaiveDate },

    #[error("no kline for {asset} covers {timestamp} in partition {partition}")]
    RecordNotFound {
        asset: String,
        partition: NaiveDate,
        timestamp: i64,
    },

    #[error("kline store for {asset} is empty")]
    EmptyStore { asset: String },

    #[error("timestamp {timestamp} is outside the representable range")]
    InvalidTimestamp { timestamp: i64 },

    #[error("malformed kline row: {reason}")]
    MalformedRow { reason: String },

    #[error("malformed record in {asset} partition {partition}: {reason}")]
    MalformedRecord {
        asset: String,
        partition: NaiveDate,
        reason: String,
    },

    #[error("kline row {open_time}..{close_time} for {asset} overlaps stored data ending at {stored_close_time}")]
    OverlappingRow {
        asset: String,
        open_time: i64,
        close_time: i64,
        stored_close_time: i64,
    },

    #[error("order already acknowledged as {order_id}")]
    OrderAlreadyAcknowledged { order_id: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("exchange error: {reason}")]
    Exchange { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PeakTrailError {
    /// Lookup misses that mean "no kline for this tick" rather than a failure.
    pub fn is_missing_data(&self) -> bool {
        matches!(
            self,
            PeakTrailError::PartitionNotFound { .. } | PeakTrailError::RecordNotFound { .. }
        )
    }
}

impl From<&PeakTrailError> for std::process::ExitCode {
    fn from(err: &PeakTrailError) -> Self {
        let code: u8 = match err {
            PeakTrailError::Io(_) | PeakTrailError::Csv(_) | PeakTrailError::Storage { .. } => 1,
            PeakTrailError::ConfigParse { .. }
            | PeakTrailError::ConfigMissing { .. }
            | PeakTrailError::ConfigInvalid { .. } => 2,
            PeakTrailError::PartitionNotFound { .. }
            | PeakTrailError::RecordNotFound { .. }
            | PeakTrailError::EmptyStore { .. }
            | PeakTrailError::InvalidTimestamp { .. }
            | PeakTrailError::MalformedRow { .. }
            | PeakTrailError::MalformedRecord { .. }
            | PeakTrailError::OverlappingRow { .. }
            | PeakTrailError::OrderAlreadyAcknowledged { .. } => 3,
            PeakTrailError::Exchange { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
