//! In-memory partition storage.
//!
//! Clones share the same partitions, so a test can hand one clone to a
//! `KlineStore` and inspect the bytes through another.

use crate::domain::error::PeakTrailError;
use crate::ports::storage_port::PartitionStorage;
use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::rc::Rc;

type Partitions = Rc<RefCell<BTreeMap<NaiveDate, Vec<u8>>>>;

#[derive(Clone, Default)]
pub struct MemoryStorage {
    partitions: Partitions,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a partition's contents.
    pub fn insert(&self, key: NaiveDate, content: &str) {
        self.partitions
            .borrow_mut()
            .insert(key, content.as_bytes().to_vec());
    }

    pub fn contents(&self, key: NaiveDate) -> Option<String> {
        self.partitions
            .borrow()
            .get(&key)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn keys(&self) -> Vec<NaiveDate> {
        self.partitions.borrow().keys().copied().collect()
    }
}

struct MemoryAppender {
    partitions: Partitions,
    key: NaiveDate,
}

impl Write for MemoryAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.partitions
            .borrow_mut()
            .entry(self.key)
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl PartitionStorage for MemoryStorage {
    fn list_partitions(&self) -> Result<Vec<NaiveDate>, PeakTrailError> {
        Ok(self.keys())
    }

    fn partition_len(&self, key: NaiveDate) -> Result<Option<u64>, PeakTrailError> {
        Ok(self
            .partitions
            .borrow()
            .get(&key)
            .map(|bytes| bytes.len() as u64))
    }

    fn read_partition(&self, key: NaiveDate) -> Result<Option<String>, PeakTrailError> {
        Ok(self.contents(key))
    }

    fn open_append(&self, key: NaiveDate) -> Result<Box<dyn Write>, PeakTrailError> {
        self.partitions.borrow_mut().entry(key).or_default();
        Ok(Box::new(MemoryAppender {
            partitions: Rc::clone(&self.partitions),
            key,
        }))
    }
}
