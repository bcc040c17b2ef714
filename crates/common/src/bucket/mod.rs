//! Time-windowed message buckets
//!
//! Every stored message belongs to the bucket of its send time rounded down to
//! the bucket window. [`BucketIndex`] keeps an in-memory summary per bucket
//! (token set, combined hash, last change) and owns the flat bucket files that
//! hold the propagation copies. The index is a cache over the message store
//! and can always be rebuilt from it.

mod file;
mod index;

pub use file::BucketFiles;
pub use index::{
    BucketIndex, BucketMismatch, BucketStat, BucketStats, BucketSummary, DumpReport, FileState,
    MismatchKind,
};

use crate::store::StoreError;

/// Default bucket window, one hour
pub const DEFAULT_BUCKET_WINDOW_SECS: i64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum BucketError {
    #[error("bucket window must be positive, got {0}")]
    InvalidWindow(i64),
    #[error("bucket file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bucket write failed ({source}) and could not be rolled back: {rollback}")]
    TornRecord {
        source: std::io::Error,
        rollback: std::io::Error,
    },
    #[error("bucket record codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("store error during bucket rebuild: {0}")]
    Store(#[from] StoreError),
}

/// Start of the bucket window containing `timestamp`
pub fn bucket_timestamp(timestamp: i64, window: i64) -> i64 {
    timestamp - timestamp.rem_euclid(window)
}
