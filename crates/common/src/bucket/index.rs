use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::Utc;
use parking_lot::Mutex;

use super::{bucket_timestamp, BucketError, BucketFiles};
use crate::store::{MessageKey, MessageStore, Partition};

/// In-memory summary of one bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSummary {
    pub timestamp: i64,
    pub tokens: BTreeSet<MessageKey>,
    /// BLAKE3 over the sorted token set
    pub combined_hash: [u8; 32],
    /// Unix seconds of the last mutation
    pub last_changed: i64,
}

impl BucketSummary {
    fn new(timestamp: i64) -> Self {
        let mut summary = Self {
            timestamp,
            tokens: BTreeSet::new(),
            combined_hash: [0; 32],
            last_changed: 0,
        };
        summary.refresh();
        summary
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn combined_hash_hex(&self) -> String {
        hex::encode(self.combined_hash)
    }

    fn refresh(&mut self) {
        let mut hasher = blake3::Hasher::new();
        for token in &self.tokens {
            hasher.update(token.as_bytes());
        }
        self.combined_hash = *hasher.finalize().as_bytes();
        self.last_changed = Utc::now().timestamp();
    }
}

/// State of the backing file of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// File present, with its size in bytes
    Size(u64),
    /// No tokens and no file
    EmptyBucket,
    /// Tokens but no file
    FileNotFound,
    /// A file for a bucket with no tokens
    Orphaned(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketStat {
    pub timestamp: i64,
    pub messages: usize,
    pub combined_hash: [u8; 32],
    pub last_changed: i64,
    pub file: FileState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketStats {
    pub buckets: Vec<BucketStat>,
    pub total_messages: usize,
    pub total_bytes: u64,
}

impl BucketStats {
    pub fn total_buckets(&self) -> usize {
        self.buckets.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// The bucket has no tokens but a file exists
    FileWithoutTokens,
    /// The bucket has tokens but no file exists
    TokensWithoutFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketMismatch {
    pub timestamp: i64,
    pub tokens: usize,
    pub kind: MismatchKind,
}

/// Outcome of [`BucketIndex::clear_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpReport {
    pub buckets_evicted: usize,
    pub files_removed: usize,
    pub failures: usize,
}

/// Process-wide map from bucket timestamp to [`BucketSummary`]
///
/// Every read and write goes through one mutex, so no caller ever sees a
/// summary halfway through an update.
#[derive(Debug)]
pub struct BucketIndex {
    window: i64,
    files: BucketFiles,
    buckets: Mutex<BTreeMap<i64, BucketSummary>>,
}

impl BucketIndex {
    pub fn new(dir: impl Into<PathBuf>, window: i64) -> Result<Self, BucketError> {
        if window <= 0 {
            return Err(BucketError::InvalidWindow(window));
        }
        Ok(Self {
            window,
            files: BucketFiles::new(dir),
            buckets: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn window(&self) -> i64 {
        self.window
    }

    pub fn files(&self) -> &BucketFiles {
        &self.files
    }

    /// Bucket timestamp for a message key
    pub fn bucket_of(&self, key: &MessageKey) -> i64 {
        bucket_timestamp(key.timestamp(), self.window)
    }

    /// Append the propagation copy of a message to its bucket file and record its token
    ///
    /// Both happen under the index lock; if the file write fails the token is
    /// not recorded.
    pub fn append(&self, token: &MessageKey, payload: &[u8]) -> Result<i64, BucketError> {
        let bucket = self.bucket_of(token);
        let mut buckets = self.buckets.lock();
        self.files.append(bucket, token, payload)?;
        let summary = buckets
            .entry(bucket)
            .or_insert_with(|| BucketSummary::new(bucket));
        summary.tokens.insert(*token);
        summary.refresh();
        Ok(bucket)
    }

    /// Give `bucket` a summary holding every key the store has in its window,
    /// unless it already has one
    ///
    /// Needed after a dump, when a new message lands in a window whose older
    /// messages are still stored. The store is read without the index lock, so
    /// callers must not mutate the store or the index concurrently. Returns
    /// whether a summary was created.
    pub fn seed_from_store(&self, store: &MessageStore, bucket: i64) -> Result<bool, BucketError> {
        if self.buckets.lock().contains_key(&bucket) {
            return Ok(false);
        }
        let tokens: Vec<MessageKey> = stored_keys(store)?
            .into_iter()
            .filter(|key| self.bucket_of(key) == bucket)
            .collect();

        let mut buckets = self.buckets.lock();
        let summary = buckets
            .entry(bucket)
            .or_insert_with(|| BucketSummary::new(bucket));
        summary.tokens.extend(tokens);
        summary.refresh();
        Ok(true)
    }

    pub fn record_insert(&self, bucket: i64, token: MessageKey) {
        let mut buckets = self.buckets.lock();
        let summary = buckets
            .entry(bucket)
            .or_insert_with(|| BucketSummary::new(bucket));
        if summary.tokens.insert(token) {
            summary.refresh();
        }
    }

    /// Forget `token`; the summary itself is kept even once empty
    pub fn record_erase(&self, bucket: i64, token: &MessageKey) -> bool {
        let mut buckets = self.buckets.lock();
        match buckets.get_mut(&bucket) {
            Some(summary) => {
                let removed = summary.tokens.remove(token);
                if removed {
                    summary.refresh();
                }
                removed
            }
            None => false,
        }
    }

    /// Forget many tokens under a single acquisition of the lock
    pub fn record_erase_all<'a>(&self, tokens: impl IntoIterator<Item = &'a MessageKey>) -> usize {
        let mut buckets = self.buckets.lock();
        let mut removed = 0;
        for token in tokens {
            let bucket = self.bucket_of(token);
            if let Some(summary) = buckets.get_mut(&bucket) {
                if summary.tokens.remove(token) {
                    summary.refresh();
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Rebuild every summary from the message store and the bucket files
    ///
    /// Bucket files with no stored messages get an empty summary so the audit
    /// can report them. Returns the number of tokens indexed.
    pub fn rebuild(&self, store: &MessageStore) -> Result<usize, BucketError> {
        let keys = stored_keys(store)?;
        let on_disk = self.files.list()?;

        let mut rebuilt: BTreeMap<i64, BucketSummary> = BTreeMap::new();
        for key in &keys {
            let bucket = self.bucket_of(key);
            rebuilt
                .entry(bucket)
                .or_insert_with(|| BucketSummary::new(bucket))
                .tokens
                .insert(*key);
        }
        for bucket in on_disk {
            rebuilt
                .entry(bucket)
                .or_insert_with(|| BucketSummary::new(bucket));
        }
        for summary in rebuilt.values_mut() {
            summary.refresh();
        }

        let buckets = rebuilt.len();
        *self.buckets.lock() = rebuilt;
        tracing::info!(buckets, tokens = keys.len(), "rebuilt bucket index");
        Ok(keys.len())
    }

    /// Copy of every summary, ordered by timestamp
    pub fn snapshot(&self) -> Vec<BucketSummary> {
        self.buckets.lock().values().cloned().collect()
    }

    pub fn summary(&self, bucket: i64) -> Option<BucketSummary> {
        self.buckets.lock().get(&bucket).cloned()
    }

    pub fn stats(&self) -> BucketStats {
        let buckets = self.buckets.lock();
        let mut stats = BucketStats::default();
        for summary in buckets.values() {
            let file = match (self.files.size(summary.timestamp), summary.is_empty()) {
                (Some(size), false) => FileState::Size(size),
                (Some(size), true) => FileState::Orphaned(size),
                (None, false) => FileState::FileNotFound,
                (None, true) => FileState::EmptyBucket,
            };
            if let FileState::Size(size) | FileState::Orphaned(size) = file {
                stats.total_bytes += size;
            }
            stats.total_messages += summary.len();
            stats.buckets.push(BucketStat {
                timestamp: summary.timestamp,
                messages: summary.len(),
                combined_hash: summary.combined_hash,
                last_changed: summary.last_changed,
                file,
            });
        }
        stats
    }

    /// Report every bucket whose token count disagrees with `file_exists`
    ///
    /// Nothing is repaired.
    pub fn audit_against_files(&self, file_exists: impl Fn(i64) -> bool) -> Vec<BucketMismatch> {
        self.buckets
            .lock()
            .values()
            .filter_map(|summary| {
                let kind = match (summary.is_empty(), file_exists(summary.timestamp)) {
                    (true, true) => MismatchKind::FileWithoutTokens,
                    (false, false) => MismatchKind::TokensWithoutFile,
                    _ => return None,
                };
                Some(BucketMismatch {
                    timestamp: summary.timestamp,
                    tokens: summary.len(),
                    kind,
                })
            })
            .collect()
    }

    /// [`audit_against_files`](Self::audit_against_files) against the real bucket directory
    pub fn audit(&self) -> Vec<BucketMismatch> {
        self.audit_against_files(|bucket| self.files.exists(bucket))
    }

    /// Delete every bucket file and evict every summary
    ///
    /// A file that cannot be removed is logged and its summary is evicted
    /// anyway.
    pub fn clear_all(&self) -> DumpReport {
        let mut buckets = self.buckets.lock();
        let mut targets: BTreeSet<i64> = buckets.keys().copied().collect();
        match self.files.list() {
            Ok(on_disk) => targets.extend(on_disk),
            Err(e) => tracing::warn!("failed to list bucket directory: {}", e),
        }

        let mut report = DumpReport {
            buckets_evicted: buckets.len(),
            ..DumpReport::default()
        };
        for bucket in targets {
            if !self.files.exists(bucket) {
                continue;
            }
            match self.files.remove(bucket) {
                Ok(()) => report.files_removed += 1,
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(bucket, "failed to remove bucket file: {}", e);
                }
            }
        }
        buckets.clear();

        tracing::info!(
            buckets = report.buckets_evicted,
            files = report.files_removed,
            "dumped all buckets"
        );
        report
    }
}

/// Every key in both partitions of the store
fn stored_keys(store: &MessageStore) -> Result<Vec<MessageKey>, BucketError> {
    let handle = store.open()?;
    let txn = handle.begin();
    let mut keys = Vec::new();
    for partition in [Partition::Inbox, Partition::Outbox] {
        for item in txn.iter_prefix(partition) {
            let (key, _) = item?;
            keys.push(key);
        }
    }
    txn.rollback();
    Ok(keys)
}
