pub mod buckets;
pub mod init;
pub mod keys;
pub mod mailbox;
pub mod messaging;
pub mod options;
pub mod send;
pub mod toggle;
pub mod version;

pub use buckets::{Buckets, ScanBuckets};
pub use init::Init;
pub use keys::{AddKey, GetPubkey, LocalKeys, NewAddress};
pub use mailbox::{Inbox, Outbox};
pub use messaging::{DisableMessaging, EnableMessaging};
pub use options::Options;
pub use send::{Receive, SendAnon, SendMessage};
pub use toggle::{ToggleAnon, ToggleReceive};
pub use version::Version;

/// Format unix seconds for display, falling back to the raw number
pub(crate) fn format_time(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
