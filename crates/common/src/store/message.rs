use serde::{Deserialize, Serialize};

use super::StoreError;

/// Status bit set on messages nobody has listed yet
pub const STATUS_UNREAD: u8 = 0x01;

/// A message as persisted in the store
///
/// Only ciphertext is ever stored; `status` is the one field updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Local receipt time, unix seconds
    pub time_received: i64,
    pub status: u8,
    pub addr_from: String,
    pub addr_to: String,
    /// Framed, sealed payload
    pub payload: Vec<u8>,
}

impl StoredMessage {
    pub fn is_unread(&self) -> bool {
        self.status & STATUS_UNREAD != 0
    }

    pub fn mark_read(&mut self) {
        self.status &= !STATUS_UNREAD;
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, StoreError> {
        Ok(bincode::serialize(self)?)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        Ok(bincode::deserialize(bytes)?)
    }
}
