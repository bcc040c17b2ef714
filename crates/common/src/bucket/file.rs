//! Flat bucket files
//!
//! One append-only file per bucket window, named `<timestamp>_01.dat`. Each
//! record is the bincode encoding of `(token, payload)` where `payload` is the
//! propagation copy of the message.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use super::BucketError;
use crate::store::MessageKey;

const FILE_SUFFIX: &str = "_01.dat";

#[derive(Debug, Clone)]
pub struct BucketFiles {
    dir: PathBuf,
}

impl BucketFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, bucket: i64) -> PathBuf {
        self.dir.join(format!("{bucket}{FILE_SUFFIX}"))
    }

    /// Size of the file for `bucket`, `None` if it does not exist
    pub fn size(&self, bucket: i64) -> Option<u64> {
        fs::metadata(self.path_for(bucket))
            .ok()
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len())
    }

    pub fn exists(&self, bucket: i64) -> bool {
        self.size(bucket).is_some()
    }

    /// Append one record, creating the file if needed
    ///
    /// A failed write is rolled back: the file is cut back to its previous
    /// length, or removed if the record would have been its first.
    pub fn append(&self, bucket: i64, token: &MessageKey, payload: &[u8]) -> Result<(), BucketError> {
        self.append_with(bucket, token, payload, |file, record| {
            file.write_all(record)?;
            file.sync_data()
        })
    }

    fn append_with(
        &self,
        bucket: i64,
        token: &MessageKey,
        payload: &[u8],
        write: impl FnOnce(&mut File, &[u8]) -> io::Result<()>,
    ) -> Result<(), BucketError> {
        fs::create_dir_all(&self.dir)?;
        let record = bincode::serialize(&(token, payload))?;
        let path = self.path_for(bucket);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let start = file.metadata()?.len();

        let Err(source) = write(&mut file, &record) else {
            return Ok(());
        };
        let rollback = if start == 0 {
            drop(file);
            fs::remove_file(&path)
        } else {
            file.set_len(start)
        };
        match rollback {
            Ok(()) => Err(source.into()),
            Err(rollback) => {
                tracing::error!(bucket, "torn record left in bucket file: {}", rollback);
                Err(BucketError::TornRecord { source, rollback })
            }
        }
    }

    /// All records in the file for `bucket`, in append order
    pub fn read(&self, bucket: i64) -> Result<Vec<(MessageKey, Vec<u8>)>, BucketError> {
        let bytes = match fs::read(self.path_for(bucket)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let len = bytes.len() as u64;
        let mut cursor = Cursor::new(bytes);
        let mut records = Vec::new();
        while cursor.position() < len {
            let record: (MessageKey, Vec<u8>) = bincode::deserialize_from(&mut cursor)?;
            records.push(record);
        }
        Ok(records)
    }

    /// Timestamps of every bucket file in the directory
    pub fn list(&self) -> Result<Vec<i64>, BucketError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut buckets = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(bucket) = name
                .strip_suffix(FILE_SUFFIX)
                .and_then(|ts| ts.parse::<i64>().ok())
            {
                buckets.push(bucket);
            }
        }
        buckets.sort_unstable();
        Ok(buckets)
    }

    pub fn remove(&self, bucket: i64) -> io::Result<()> {
        fs::remove_file(self.path_for(bucket))
    }
}
