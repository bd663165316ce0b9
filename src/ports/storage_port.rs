//! Partition storage port trait.
//!
//! A `PartitionStorage` holds the day partitions of exactly one asset. Keys are
//! UTC calendar days; how they map to files (or anything else) is up to the adapter.

use crate::domain::error::PeakTrailError;
use chrono::NaiveDate;
use std::io::Write;

pub trait PartitionStorage {
    /// Existing partition keys, ascending.
    fn list_partitions(&self) -> Result<Vec<NaiveDate>, PeakTrailError>;

    /// Size of the partition in bytes, or `None` when it does not exist.
    fn partition_len(&self, key: NaiveDate) -> Result<Option<u64>, PeakTrailError>;

    /// Full partition contents, or `None` when the partition does not exist.
    fn read_partition(&self, key: NaiveDate) -> Result<Option<String>, PeakTrailError>;

    /// Open the partition for appending, creating it empty if missing.
    fn open_append(&self, key: NaiveDate) -> Result<Box<dyn Write>, PeakTrailError>;
}
