use std::fmt;

use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::crypto::PayloadHeader;

/// Size of a message key in bytes
pub const KEY_SIZE: usize = 18;
/// Leading bytes of the payload hash kept in a key
const HASH_PREFIX_SIZE: usize = KEY_SIZE - 2 - 8;

/// Logical partition of the message store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    Inbox,
    Outbox,
}

impl Partition {
    pub fn prefix(&self) -> &'static [u8; 2] {
        match self {
            Partition::Inbox => b"im",
            Partition::Outbox => b"sm",
        }
    }

    fn from_prefix(prefix: &[u8]) -> Option<Self> {
        match prefix {
            b"im" => Some(Partition::Inbox),
            b"sm" => Some(Partition::Outbox),
            _ => None,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Inbox => f.write_str("inbox"),
            Partition::Outbox => f.write_str("outbox"),
        }
    }
}

/// Composite message key
///
/// ```text
/// [ partition prefix: 2 ][ timestamp: 8 BE ][ payload_hash: 8 ]
/// ```
///
/// Keys sort by partition, then by send time. The same key doubles as the
/// message's token in its bucket.
///
/// The timestamp is the raw two's-complement encoding, so times before 1970
/// sort after every later one. Such times are unsupported; `receive` rejects
/// them and `send` only ever uses the current clock.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageKey([u8; KEY_SIZE]);

impl MessageKey {
    pub fn new(partition: Partition, timestamp: i64, payload_hash: &[u8; 32]) -> Self {
        let mut key = [0u8; KEY_SIZE];
        key[..2].copy_from_slice(partition.prefix());
        key[2..10].copy_from_slice(&timestamp.to_be_bytes());
        key[10..].copy_from_slice(&payload_hash[..HASH_PREFIX_SIZE]);
        Self(key)
    }

    /// Key of a framed payload within `partition`
    pub fn for_payload(partition: Partition, header: &PayloadHeader) -> Self {
        Self::new(partition, header.timestamp, &header.payload_hash)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, StoreError> {
        let key: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| StoreError::InvalidKey(hex::encode(bytes)))?;
        if Partition::from_prefix(&key[..2]).is_none() {
            return Err(StoreError::InvalidKey(hex::encode(bytes)));
        }
        Ok(Self(key))
    }

    pub fn partition(&self) -> Partition {
        // prefix is checked on every construction path
        if self.0[..2] == *Partition::Inbox.prefix() {
            Partition::Inbox
        } else {
            Partition::Outbox
        }
    }

    /// Sender-claimed send time, unix seconds
    pub fn timestamp(&self) -> i64 {
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&self.0[2..10]);
        i64::from_be_bytes(ts)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageKey({})", self.to_hex())
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
