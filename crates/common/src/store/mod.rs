//! Persistent message store
//!
//! One sled tree holds both logical partitions, told apart by a two byte key
//! prefix (see [`Partition`]). Access goes through scoped handles:
//!
//! - [`MessageStore::open`] hands out a [`StoreHandle`]; the first handle opens
//!   the database and the last one to be dropped flushes and closes it
//! - [`StoreHandle::begin`] starts a [`Transaction`] that stages writes and
//!   applies them atomically on commit. Only one transaction runs at a time
//!   per store.
//!
//! Reads inside a transaction see committed data only; staged writes become
//! visible once the transaction commits.

mod key;
mod message;
mod txn;

pub use key::{MessageKey, Partition, KEY_SIZE};
pub use message::{StoredMessage, STATUS_UNREAD};
pub use txn::{PrefixIter, Transaction};

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("message store unavailable at {path}: {source}")]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("record codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("invalid message key: {0}")]
    InvalidKey(String),
}

#[derive(Default)]
struct HandleState {
    db: Option<sled::Db>,
    refs: usize,
}

pub struct MessageStore {
    path: PathBuf,
    state: Mutex<HandleState>,
    txn_lock: Mutex<()>,
}

impl std::fmt::Debug for MessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStore")
            .field("path", &self.path)
            .field("open_handles", &self.state.lock().refs)
            .finish()
    }
}

impl MessageStore {
    /// Create a store rooted at `path`; nothing is opened until [`open`](Self::open)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(HandleState::default()),
            txn_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether any handle currently holds the database open
    pub fn is_open(&self) -> bool {
        self.state.lock().db.is_some()
    }

    /// Acquire a handle, opening the database if no other handle has
    pub fn open(&self) -> Result<StoreHandle<'_>, StoreError> {
        let mut state = self.state.lock();
        let db = match &state.db {
            Some(db) => db.clone(),
            None => {
                let db = sled::Config::new()
                    .path(&self.path)
                    .open()
                    .map_err(|source| StoreError::StoreUnavailable {
                        path: self.path.clone(),
                        source,
                    })?;
                tracing::debug!(path = %self.path.display(), "opened message store");
                state.db = Some(db.clone());
                db
            }
        };
        state.refs += 1;

        Ok(StoreHandle {
            store: self,
            db: Some(db),
        })
    }
}

/// A reference-counted view of an open store
pub struct StoreHandle<'s> {
    store: &'s MessageStore,
    // None only while dropping
    db: Option<sled::Db>,
}

impl<'s> StoreHandle<'s> {
    fn db(&self) -> &sled::Db {
        match &self.db {
            Some(db) => db,
            None => unreachable!("store handle used while being released"),
        }
    }

    /// Start a transaction, waiting for any other transaction on this store to finish
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self.db(), self.store.txn_lock.lock())
    }

    pub fn get(&self, key: &MessageKey) -> Result<Option<StoredMessage>, StoreError> {
        self.db()
            .get(key.as_bytes())?
            .map(|bytes| StoredMessage::decode(&bytes))
            .transpose()
    }

    pub fn contains(&self, key: &MessageKey) -> Result<bool, StoreError> {
        Ok(self.db().contains_key(key.as_bytes())?)
    }

    /// Number of messages in `partition`
    pub fn count(&self, partition: Partition) -> Result<usize, StoreError> {
        let mut n = 0;
        for item in self.db().scan_prefix(partition.prefix()) {
            item?;
            n += 1;
        }
        Ok(n)
    }

    /// Write a single message in its own transaction
    pub fn put(&self, key: &MessageKey, message: &StoredMessage) -> Result<(), StoreError> {
        let txn = self.begin();
        txn.put(key, message)?;
        txn.commit()?;
        Ok(())
    }

    /// Erase a single message in its own transaction
    pub fn erase(&self, key: &MessageKey) -> Result<(), StoreError> {
        let txn = self.begin();
        txn.erase(key);
        txn.commit()?;
        Ok(())
    }
}

impl Drop for StoreHandle<'_> {
    fn drop(&mut self) {
        let mut state = self.store.state.lock();
        // release our clone before the last one can be closed
        drop(self.db.take());
        state.refs -= 1;
        if state.refs == 0 {
            if let Some(db) = state.db.take() {
                if let Err(e) = db.flush() {
                    tracing::warn!(path = %self.store.path.display(), "failed to flush message store on close: {}", e);
                }
                tracing::debug!(path = %self.store.path.display(), "closed message store");
            }
        }
    }
}
