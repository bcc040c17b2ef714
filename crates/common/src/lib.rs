/**
 * Time-windowed message buckets.
 *  In-memory summaries of every bucket, kept
 *  consistent with the message store, plus the
 *  flat files holding propagation copies.
 */
pub mod bucket;
/**
 * Cryptographic types and operations.
 *  - Public and Private key implementations
 *  - Addresses derived from public keys
 *  - Payload framing and message sealing
 */
pub mod crypto;
/**
 * Address directory: capability flags and
 *  public keys for local and remote addresses,
 *  plus the process-wide messaging options.
 */
pub mod directory;
/**
 * The messaging service tying everything
 *  together: send, receive, inbox/outbox
 *  listing and bucket administration.
 */
pub mod service;
/**
 * Persistent message store with inbox and
 *  outbox partitions and scoped transactions.
 */
pub mod store;

pub mod prelude {
    pub use crate::bucket::{BucketIndex, BucketStats, FileState};
    pub use crate::crypto::{
        Address, CryptoError, CryptoProvider, PublicKey, SealedBoxProvider, SecretKey,
    };
    pub use crate::directory::{AddressDirectory, AddressFilter, MessagingOptions};
    pub use crate::service::{
        InboxMode, Listing, MessageError, MessageService, MessageView, OutboxMode,
        ReceiveOutcome, Sender, ServiceConfig, ANONYMOUS,
    };
    pub use crate::store::{MessageKey, MessageStore, Partition};
}
