use std::cell::{Cell, RefCell};
use std::marker::PhantomData;

use parking_lot::MutexGuard;

use super::{MessageKey, Partition, StoreError, StoredMessage};

/// A unit of atomic mutation on the store
///
/// Writes are staged and applied together by [`commit`](Self::commit).
/// Dropping the transaction, or calling [`rollback`](Self::rollback), throws
/// the staged writes away. The store's transaction lock is held for the whole
/// lifetime of the value.
pub struct Transaction<'h> {
    db: &'h sled::Db,
    batch: RefCell<sled::Batch>,
    staged: Cell<usize>,
    finished: bool,
    _guard: MutexGuard<'h, ()>,
}

impl<'h> Transaction<'h> {
    pub(super) fn new(db: &'h sled::Db, guard: MutexGuard<'h, ()>) -> Self {
        Self {
            db,
            batch: RefCell::new(sled::Batch::default()),
            staged: Cell::new(0),
            finished: false,
            _guard: guard,
        }
    }

    /// Committed value under `key`
    pub fn get(&self, key: &MessageKey) -> Result<Option<StoredMessage>, StoreError> {
        self.db
            .get(key.as_bytes())?
            .map(|bytes| StoredMessage::decode(&bytes))
            .transpose()
    }

    /// Iterate committed messages of `partition` in key order
    ///
    /// The iterator borrows the transaction, so it cannot outlive a commit or
    /// rollback. Calling this again restarts from the first key.
    pub fn iter_prefix(&self, partition: Partition) -> PrefixIter<'_> {
        PrefixIter {
            inner: self.db.scan_prefix(partition.prefix()),
            _txn: PhantomData,
        }
    }

    pub fn put(&self, key: &MessageKey, message: &StoredMessage) -> Result<(), StoreError> {
        let value = message.encode()?;
        self.batch.borrow_mut().insert(key.as_bytes().as_slice(), value);
        self.staged.set(self.staged.get() + 1);
        Ok(())
    }

    pub fn erase(&self, key: &MessageKey) {
        self.batch.borrow_mut().remove(key.as_bytes().as_slice());
        self.staged.set(self.staged.get() + 1);
    }

    /// Number of writes staged so far
    pub fn staged(&self) -> usize {
        self.staged.get()
    }

    /// Apply every staged write atomically and flush to disk
    pub fn commit(mut self) -> Result<usize, StoreError> {
        self.finished = true;
        let staged = self.staged.get();
        if staged == 0 {
            return Ok(0);
        }

        let batch = std::mem::take(&mut *self.batch.borrow_mut());
        self.db.apply_batch(batch)?;
        self.db.flush()?;
        tracing::debug!(writes = staged, "committed store transaction");
        Ok(staged)
    }

    pub fn rollback(mut self) {
        self.finished = true;
        tracing::debug!(writes = self.staged.get(), "rolled back store transaction");
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished && self.staged.get() > 0 {
            tracing::debug!(
                writes = self.staged.get(),
                "store transaction dropped without commit, discarding writes"
            );
        }
    }
}

/// Lazy iterator over one partition, scoped to a [`Transaction`]
pub struct PrefixIter<'t> {
    inner: sled::Iter,
    _txn: PhantomData<&'t ()>,
}

impl Iterator for PrefixIter<'_> {
    type Item = Result<(MessageKey, StoredMessage), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        Some(item.map_err(StoreError::from).and_then(|(key, value)| {
            Ok((
                MessageKey::from_slice(&key)?,
                StoredMessage::decode(&value)?,
            ))
        }))
    }
}
