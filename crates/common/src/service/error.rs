use crate::bucket::BucketError;
use crate::crypto::CryptoError;
use crate::directory::{DirectoryError, OptionError};
use crate::store::{MessageKey, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("secure messaging is disabled")]
    MessagingDisabled,
    #[error("secure messaging is already {0}")]
    AlreadyInRequestedState(&'static str),
    #[error("cannot use sender {address}: {source}")]
    SenderKeyUnresolvable {
        address: String,
        #[source]
        source: DirectoryError,
    },
    #[error("cannot resolve public key for recipient {address}: {source}")]
    RecipientKeyUnresolvable {
        address: String,
        #[source]
        source: DirectoryError,
    },
    #[error("message could not be sealed (code {}): {0}", .0.code())]
    CryptoSealFailed(#[source] CryptoError),
    #[error("invalid payload (code {}): {0}", .0.code())]
    InvalidPayload(#[source] CryptoError),
    #[error("message {0} already exists")]
    DuplicateMessage(MessageKey),
    #[error("message timestamp {timestamp} is out of range (now {now})")]
    TimestampOutOfRange { timestamp: i64, now: i64 },
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Option(#[from] OptionError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("bucket error: {0}")]
    Bucket(#[from] BucketError),
    #[error("bucket append failed ({append}) and the stored message could not be removed: {rollback}")]
    BucketRollbackFailed {
        append: BucketError,
        rollback: StoreError,
    },
}
