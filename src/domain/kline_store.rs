//! Day-partitioned kline series for one asset.
//!
//! Each UTC calendar day is one partition: a CSV header line followed by the
//! klines opening on that day, ascending by `open_time`. Appends only ever extend
//! the newest partition; once a later day is opened the earlier ones are closed.

use chrono::NaiveDate;
use std::io::Write;

use super::error::PeakTrailError;
use super::kline::{partition_key, KlineRecord, RawKlineRow, KLINE_HEADERS};
use crate::ports::storage_port::PartitionStorage;

/// Counters from one `append_incremental` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendStats {
    pub received: usize,
    pub skipped: usize,
    pub written: usize,
    pub partitions_opened: usize,
}

/// The single live writer of a store. Must be finished before another is opened.
struct PartitionWriter {
    key: NaiveDate,
    writer: csv::Writer<Box<dyn Write>>,
    written: usize,
}

impl PartitionWriter {
    fn open(storage: &dyn PartitionStorage, key: NaiveDate) -> Result<Self, PeakTrailError> {
        // a partition left empty by an interrupted append still needs its header
        let needs_header = storage.partition_len(key)?.unwrap_or(0) == 0;
        let sink = storage.open_append(key)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(sink);
        if needs_header {
            writer.write_record(KLINE_HEADERS)?;
        }
        tracing::debug!("Opened partition {} (new: {})", key, needs_header);
        Ok(PartitionWriter {
            key,
            writer,
            written: 0,
        })
    }

    fn write(&mut self, record: &KlineRecord) -> Result<(), PeakTrailError> {
        self.writer.write_record(record.to_fields())?;
        self.written += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<usize, PeakTrailError> {
        self.writer.flush()?;
        tracing::debug!("Closed partition {} after {} records", self.key, self.written);
        Ok(self.written)
    }
}

pub struct KlineStore {
    asset: String,
    storage: Box<dyn PartitionStorage>,
}

impl KlineStore {
    pub fn new(asset: &str, storage: Box<dyn PartitionStorage>) -> Self {
        KlineStore {
            asset: asset.to_string(),
            storage,
        }
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn partitions(&self) -> Result<Vec<NaiveDate>, PeakTrailError> {
        self.storage.list_partitions()
    }

    /// Append exchange rows, skipping anything already stored.
    ///
    /// Rows must be ascending. A row is skipped when its `close_time` is not after
    /// the newest stored (or just written) `close_time`, so re-appending an
    /// overlapping batch is a no-op for the overlap.
    pub fn append_incremental(
        &mut self,
        rows: &[RawKlineRow],
    ) -> Result<AppendStats, PeakTrailError> {
        let mut high_water = self.get_last_close_time()?;
        let mut stats = AppendStats::default();
        let mut open: Option<PartitionWriter> = None;

        let result = self.write_rows(rows, &mut high_water, &mut open, &mut stats);
        let finished = match open.take() {
            Some(writer) => writer.finish().map(|_| ()),
            None => Ok(()),
        };
        result?;
        finished?;

        tracing::info!(
            "Appended {} klines for {} ({} received, {} skipped, {} partitions)",
            stats.written,
            self.asset,
            stats.received,
            stats.skipped,
            stats.partitions_opened
        );
        Ok(stats)
    }

    fn write_rows(
        &self,
        rows: &[RawKlineRow],
        high_water: &mut Option<i64>,
        open: &mut Option<PartitionWriter>,
        stats: &mut AppendStats,
    ) -> Result<(), PeakTrailError> {
        for row in rows {
            stats.received += 1;
            let record = KlineRecord::from_raw(row)?;

            if let Some(stored_close_time) = *high_water {
                if record.close_time <= stored_close_time {
                    stats.skipped += 1;
                    continue;
                }
                if record.open_time <= stored_close_time {
                    return Err(PeakTrailError::OverlappingRow {
                        asset: self.asset.clone(),
                        open_time: record.open_time,
                        close_time: record.close_time,
                        stored_close_time,
                    });
                }
            }

            let key = record.partition_key()?;
            let writer = match open.take() {
                Some(current) if current.key == key => open.insert(current),
                previous => {
                    if let Some(previous) = previous {
                        previous.finish()?;
                    }
                    stats.partitions_opened += 1;
                    open.insert(PartitionWriter::open(self.storage.as_ref(), key)?)
                }
            };
            writer.write(&record)?;

            stats.written += 1;
            *high_water = Some(record.close_time);
        }
        Ok(())
    }

    /// The kline covering `timestamp`. Klines wider than a day live in the
    /// partition of the day they open, so a miss falls back to the last record
    /// of the latest earlier partition.
    pub fn get_at(&self, timestamp: i64) -> Result<KlineRecord, PeakTrailError> {
        let key = partition_key(timestamp)?;
        let content = self.storage.read_partition(key)?;

        if let Some(content) = &content {
            let mut rdr = csv::Reader::from_reader(content.as_bytes());
            for result in rdr.records() {
                let row = result?;
                let record = self.parse_stored(key, &row)?;
                if record.covers(timestamp) {
                    return Ok(record);
                }
            }
        }

        if let Some(record) = self.spanning_record(key, timestamp)? {
            return Ok(record);
        }

        match content {
            Some(_) => Err(PeakTrailError::RecordNotFound {
                asset: self.asset.clone(),
                partition: key,
                timestamp,
            }),
            None => Err(PeakTrailError::PartitionNotFound {
                asset: self.asset.clone(),
                partition: key,
            }),
        }
    }

    fn spanning_record(
        &self,
        key: NaiveDate,
        timestamp: i64,
    ) -> Result<Option<KlineRecord>, PeakTrailError> {
        let Some(earlier) = self
            .storage
            .list_partitions()?
            .into_iter()
            .filter(|k| *k < key)
            .next_back()
        else {
            return Ok(None);
        };
        Ok(self
            .read_records(earlier)?
            .pop()
            .filter(|record| record.covers(timestamp)))
    }

    /// `close_time` of the newest stored kline, `None` for an empty store.
    pub fn get_last_close_time(&self) -> Result<Option<i64>, PeakTrailError> {
        match self.get_last() {
            Ok(record) => Ok(Some(record.close_time)),
            Err(PeakTrailError::EmptyStore { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_first(&self) -> Result<KlineRecord, PeakTrailError> {
        for key in self.storage.list_partitions()? {
            if let Some(record) = self.read_records(key)?.into_iter().next() {
                return Ok(record);
            }
        }
        Err(self.empty())
    }

    pub fn get_last(&self) -> Result<KlineRecord, PeakTrailError> {
        for key in self.storage.list_partitions()?.into_iter().rev() {
            if let Some(record) = self.read_records(key)?.pop() {
                return Ok(record);
            }
        }
        Err(self.empty())
    }

    fn read_records(&self, key: NaiveDate) -> Result<Vec<KlineRecord>, PeakTrailError> {
        let Some(content) = self.storage.read_partition(key)? else {
            return Ok(Vec::new());
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut records = Vec::new();
        for result in rdr.records() {
            let row = result?;
            records.push(self.parse_stored(key, &row)?);
        }
        Ok(records)
    }

    fn parse_stored(
        &self,
        key: NaiveDate,
        row: &csv::StringRecord,
    ) -> Result<KlineRecord, PeakTrailError> {
        KlineRecord::from_fields(row.iter()).map_err(|reason| PeakTrailError::MalformedRecord {
            asset: self.asset.clone(),
            partition: key,
            reason,
        })
    }

    fn empty(&self) -> PeakTrailError {
        PeakTrailError::EmptyStore {
            asset: self.asset.clone(),
        }
    }
}
