//! The messaging service
//!
//! [`MessageService`] ties the address directory, message store, bucket index
//! and a [`CryptoProvider`](crate::crypto::CryptoProvider) together. One
//! instance owns all process-wide state (the enabled flag, the options, the
//! store handle and the bucket map); callers share it by reference.
//!
//! # Locking
//!
//! Store transactions and bucket index updates are never nested: a mutation
//! commits its store transaction first and updates the index afterwards.

mod error;
mod messaging;
mod views;

pub use error::MessageError;
pub use messaging::{MessageService, MAX_FUTURE_SKEW_SECS};
pub use views::{
    DecryptedMessage, InboxMode, Listing, MessageView, OutboxMode, ReceiveOutcome, Sender,
    SentMessage, ANONYMOUS,
};

use std::path::{Path, PathBuf};

use crate::bucket::DEFAULT_BUCKET_WINDOW_SECS;
use crate::crypto::SecretKey;
use crate::directory::MessagingOptions;

/// Directory name of the message database under a state root
pub const STORE_DIR_NAME: &str = "db";
/// Directory name of the bucket files under a state root
pub const BUCKET_DIR_NAME: &str = "smsgStore";

/// Everything a [`MessageService`] needs besides its collaborators
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub store_path: PathBuf,
    pub bucket_dir: PathBuf,
    pub bucket_window: i64,
    /// Node identity; outbox copies are sealed to it
    pub node_key: SecretKey,
    /// Initial state of the messaging flag
    pub enabled: bool,
    pub options: MessagingOptions,
}

impl ServiceConfig {
    /// Default layout under `root`, messaging disabled
    pub fn new(root: impl AsRef<Path>, node_key: SecretKey) -> Self {
        let root = root.as_ref();
        Self {
            store_path: root.join(STORE_DIR_NAME),
            bucket_dir: root.join(BUCKET_DIR_NAME),
            bucket_window: DEFAULT_BUCKET_WINDOW_SECS,
            node_key,
            enabled: false,
            options: MessagingOptions::default(),
        }
    }
}
