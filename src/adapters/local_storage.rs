//! Local disk partition storage: one `YYYY-MM-DD.csv` file per day under an
//! asset directory.

use crate::domain::error::PeakTrailError;
use crate::ports::storage_port::PartitionStorage;
use chrono::NaiveDate;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub struct LocalDiskStorage {
    dir: PathBuf,
}

impl LocalDiskStorage {
    /// Storage for `asset` under `base_path`, creating the directory if needed.
    pub fn open(base_path: &Path, asset: &str) -> Result<Self, PeakTrailError> {
        let dir = base_path.join(asset);
        fs::create_dir_all(&dir).map_err(|e| PeakTrailError::Storage {
            reason: format!("failed to create {}: {}", dir.display(), e),
        })?;
        Ok(Self { dir })
    }

    /// Storage for an asset directory that already exists; `None` otherwise.
    pub fn open_existing(base_path: &Path, asset: &str) -> Option<Self> {
        let dir = base_path.join(asset);
        dir.is_dir().then_some(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn partition_path(&self, key: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.csv", key.format("%Y-%m-%d")))
    }
}

impl PartitionStorage for LocalDiskStorage {
    fn list_partitions(&self) -> Result<Vec<NaiveDate>, PeakTrailError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| PeakTrailError::Storage {
            reason: format!("failed to read directory {}: {}", self.dir.display(), e),
        })?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PeakTrailError::Storage {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            let Some(stem) = name_str.strip_suffix(".csv") else {
                continue;
            };
            if let Ok(key) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn partition_len(&self, key: NaiveDate) -> Result<Option<u64>, PeakTrailError> {
        let path = self.partition_path(key);
        match fs::metadata(&path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PeakTrailError::Storage {
                reason: format!("failed to stat {}: {}", path.display(), e),
            }),
        }
    }

    fn read_partition(&self, key: NaiveDate) -> Result<Option<String>, PeakTrailError> {
        let path = self.partition_path(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PeakTrailError::Storage {
                reason: format!("failed to read {}: {}", path.display(), e),
            }),
        }
    }

    fn open_append(&self, key: NaiveDate) -> Result<Box<dyn Write>, PeakTrailError> {
        let path = self.partition_path(key);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| PeakTrailError::Storage {
                reason: format!("failed to open {} for append: {}", path.display(), e),
            })?;
        Ok(Box::new(file))
    }
}
