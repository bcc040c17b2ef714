use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use super::views::{
    DecryptedMessage, InboxMode, Listing, MessageView, OutboxMode, ReceiveOutcome, Sender,
    SentMessage, ANONYMOUS,
};
use super::{MessageError, ServiceConfig};
use crate::bucket::{BucketIndex, BucketMismatch, BucketStats, DumpReport};
use crate::crypto::{
    Address, CryptoError, CryptoProvider, OpenedMessage, PayloadHeader, PublicKey,
    SealedBoxProvider, SecretKey,
};
use crate::directory::{
    AddressDirectory, AddressEntry, AddressFilter, AddressFlags, Addresses, MessagingOptions,
};
use crate::store::{MessageKey, MessageStore, Partition, StoredMessage, STATUS_UNREAD};

/// How far ahead of local time a received message may claim to have been sent
pub const MAX_FUTURE_SKEW_SECS: i64 = 300;

#[derive(Debug)]
pub struct MessageService<P: CryptoProvider = SealedBoxProvider> {
    enabled: AtomicBool,
    /// Serializes every change to the store and the bucket index together.
    /// Taken before the store's transaction lock.
    mutation: Mutex<()>,
    options: RwLock<MessagingOptions>,
    directory: AddressDirectory,
    store: MessageStore,
    buckets: BucketIndex,
    crypto: P,
    node_key: SecretKey,
}

impl MessageService<SealedBoxProvider> {
    pub fn with_sealed_box(
        config: ServiceConfig,
        directory: AddressDirectory,
    ) -> Result<Self, MessageError> {
        Self::new(config, directory, SealedBoxProvider)
    }
}

impl<P: CryptoProvider> MessageService<P> {
    /// Build the service and index whatever the store already holds
    pub fn new(
        config: ServiceConfig,
        directory: AddressDirectory,
        crypto: P,
    ) -> Result<Self, MessageError> {
        let buckets = BucketIndex::new(config.bucket_dir, config.bucket_window)?;
        let service = Self {
            enabled: AtomicBool::new(config.enabled),
            mutation: Mutex::new(()),
            options: RwLock::new(config.options),
            directory,
            store: MessageStore::new(config.store_path),
            buckets,
            crypto,
            node_key: config.node_key,
        };
        service.buckets.rebuild(&service.store)?;
        Ok(service)
    }

    pub fn directory(&self) -> &AddressDirectory {
        &self.directory
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn buckets(&self) -> &BucketIndex {
        &self.buckets
    }

    pub fn crypto(&self) -> &P {
        &self.crypto
    }

    pub fn node_address(&self) -> Address {
        Address::from_public_key(&self.node_key.public())
    }

    /* Messaging state */

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn enable(&self) -> Result<(), MessageError> {
        if self.enabled.swap(true, Ordering::SeqCst) {
            return Err(MessageError::AlreadyInRequestedState("enabled"));
        }
        let _mutation = self.mutation.lock();
        if let Err(e) = self.buckets.rebuild(&self.store) {
            self.enabled.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        tracing::info!("secure messaging enabled");
        Ok(())
    }

    pub fn disable(&self) -> Result<(), MessageError> {
        if !self.enabled.swap(false, Ordering::SeqCst) {
            return Err(MessageError::AlreadyInRequestedState("disabled"));
        }
        tracing::info!("secure messaging disabled");
        Ok(())
    }

    fn ensure_enabled(&self) -> Result<(), MessageError> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(MessageError::MessagingDisabled)
        }
    }

    /* Options */

    pub fn options(&self) -> MessagingOptions {
        *self.options.read()
    }

    pub fn set_option(&self, name: &str, value: bool) -> Result<MessagingOptions, MessageError> {
        let mut options = self.options.write();
        options.set(name, value)?;
        tracing::debug!(option = name, value, "option updated");
        Ok(*options)
    }

    /* Directory */

    pub fn list_addresses(&self, filter: AddressFilter) -> Result<Addresses, MessageError> {
        self.ensure_enabled()?;
        Ok(self.directory.list_addresses(filter))
    }

    pub fn set_receive_flag(&self, address: &str, enabled: bool) -> Result<AddressFlags, MessageError> {
        self.ensure_enabled()?;
        Ok(self.directory.set_receive_flag(address, enabled)?)
    }

    pub fn set_anon_flag(&self, address: &str, enabled: bool) -> Result<AddressFlags, MessageError> {
        self.ensure_enabled()?;
        Ok(self.directory.set_anon_flag(address, enabled)?)
    }

    pub fn add_external_key(&self, address: &str, public_key: &str) -> Result<AddressEntry, MessageError> {
        self.ensure_enabled()?;
        Ok(self.directory.add_external_key(address, public_key)?)
    }

    pub fn resolve_public_key(&self, address: &str) -> Result<PublicKey, MessageError> {
        self.ensure_enabled()?;
        Ok(self.directory.resolve_public_key(address)?)
    }

    /// Generate a wallet address flagged by the current options
    pub fn generate_address(&self, label: &str) -> Result<AddressEntry, MessageError> {
        self.ensure_enabled()?;
        let options = self.options();
        Ok(self.directory.generate_local(label, &options)?)
    }

    /* Sending and receiving */

    /// Seal `text` for `to` and queue it in the outbox
    ///
    /// The returned payload is the propagation copy, sealed to the recipient.
    /// The outbox keeps a second copy sealed to the node key so the message
    /// stays readable locally.
    pub fn send(&self, sender: Sender<'_>, to: &str, text: &str) -> Result<SentMessage, MessageError> {
        self.ensure_enabled()?;

        let sender_key = match sender {
            Sender::Anonymous => None,
            Sender::Address(address) => Some(self.directory.local_secret(address).map_err(
                |source| MessageError::SenderKeyUnresolvable {
                    address: address.to_string(),
                    source,
                },
            )?),
        };
        let recipient = self.directory.resolve_public_key(to).map_err(|source| {
            MessageError::RecipientKeyUnresolvable {
                address: to.to_string(),
                source,
            }
        })?;

        let now = Utc::now().timestamp();
        let payload = self
            .crypto
            .seal(sender_key.as_ref(), &recipient, now, text)
            .map_err(MessageError::CryptoSealFailed)?;
        let local_copy = self
            .crypto
            .seal(sender_key.as_ref(), &self.node_key.public(), now, text)
            .map_err(MessageError::CryptoSealFailed)?;
        let (header, _) = PayloadHeader::parse(&payload).map_err(MessageError::CryptoSealFailed)?;
        let key = MessageKey::for_payload(Partition::Outbox, &header);

        let record = StoredMessage {
            time_received: now,
            status: 0,
            addr_from: sender.as_str().to_string(),
            addr_to: to.to_string(),
            payload: local_copy,
        };
        let _mutation = self.mutation.lock();
        {
            let handle = self.store.open()?;
            let txn = handle.begin();
            if txn.get(&key)?.is_some() {
                return Err(MessageError::DuplicateMessage(key));
            }
            txn.put(&key, &record)?;
            txn.commit()?;
        }
        self.append_to_bucket(&key, &payload)?;

        tracing::debug!(key = %key, to, anonymous = sender_key.is_none(), "message queued");
        Ok(SentMessage { key, payload })
    }

    /// Accept a sealed payload from the network
    pub fn receive(&self, payload: &[u8]) -> Result<ReceiveOutcome, MessageError> {
        self.ensure_enabled()?;

        let (header, _) = PayloadHeader::parse(payload).map_err(MessageError::InvalidPayload)?;
        let now = Utc::now().timestamp();
        // keys order by the big-endian timestamp, which only holds from the epoch on
        if header.timestamp < 0 || header.timestamp > now + MAX_FUTURE_SKEW_SECS {
            return Err(MessageError::TimestampOutOfRange {
                timestamp: header.timestamp,
                now,
            });
        }

        let key = MessageKey::for_payload(Partition::Inbox, &header);
        if self.store.open()?.contains(&key)? {
            return Ok(ReceiveOutcome::Duplicate(key));
        }

        let Some((entry, opened)) = self.find_recipient(payload) else {
            return Ok(ReceiveOutcome::NotForUs);
        };

        let record = StoredMessage {
            time_received: now,
            status: STATUS_UNREAD,
            addr_from: sender_label(&opened),
            addr_to: entry.address.to_string(),
            payload: payload.to_vec(),
        };
        let _mutation = self.mutation.lock();
        {
            let handle = self.store.open()?;
            let txn = handle.begin();
            // another receive of the same payload may have won the race
            if txn.get(&key)?.is_some() {
                return Ok(ReceiveOutcome::Duplicate(key));
            }
            txn.put(&key, &record)?;
            txn.commit()?;
        }
        self.append_to_bucket(&key, payload)?;

        tracing::debug!(key = %key, to = %entry.address, "message received");
        Ok(ReceiveOutcome::Stored(key))
    }

    fn find_recipient(&self, payload: &[u8]) -> Option<(AddressEntry, OpenedMessage)> {
        for (entry, secret) in self.directory.receiving_keys() {
            let Ok(opened) = self.crypto.open(payload, &secret) else {
                continue;
            };
            if opened.from.is_none() && !entry.anon_enabled {
                tracing::debug!(address = %entry.address, "rejecting anonymous message");
                return None;
            }
            return Some((entry, opened));
        }
        None
    }

    /// Record a committed message in its bucket, undoing the store write on failure
    ///
    /// Must run under the mutation lock, in the same critical section as the
    /// commit.
    fn append_to_bucket(&self, key: &MessageKey, payload: &[u8]) -> Result<(), MessageError> {
        let bucket = self.buckets.bucket_of(key);
        let appended = self
            .buckets
            .seed_from_store(&self.store, bucket)
            .and_then(|_| self.buckets.append(key, payload));
        let Err(append) = appended else {
            return Ok(());
        };

        tracing::warn!(key = %key, "bucket append failed, removing message: {}", append);
        self.buckets.record_erase(bucket, key);
        match self.store.open().and_then(|handle| handle.erase(key)) {
            Ok(()) => Err(append.into()),
            Err(rollback) => {
                tracing::error!(key = %key, "could not remove message after failed append: {}", rollback);
                Err(MessageError::BucketRollbackFailed { append, rollback })
            }
        }
    }

    /* Listing */

    pub fn list_inbox(&self, mode: InboxMode) -> Result<Listing, MessageError> {
        self.ensure_enabled()?;
        match mode {
            InboxMode::Clear => self.clear(Partition::Inbox).map(Listing::Cleared),
            InboxMode::All => self.scan_inbox(false),
            InboxMode::Unread => self.scan_inbox(true),
        }
    }

    pub fn list_outbox(&self, mode: OutboxMode) -> Result<Listing, MessageError> {
        self.ensure_enabled()?;
        match mode {
            OutboxMode::Clear => self.clear(Partition::Outbox).map(Listing::Cleared),
            OutboxMode::All => self.scan_outbox(),
        }
    }

    /// List inbox messages; with `unread_only`, list unread ones and mark them read
    ///
    /// Marking is staged in the scanning transaction, so an aborted scan marks
    /// nothing.
    fn scan_inbox(&self, unread_only: bool) -> Result<Listing, MessageError> {
        let handle = self.store.open()?;
        let txn = handle.begin();

        let mut views = Vec::new();
        for item in txn.iter_prefix(Partition::Inbox) {
            let (key, mut stored) = item?;
            if unread_only && !stored.is_unread() {
                continue;
            }
            views.push(self.open_inbox_entry(key, &stored));
            if unread_only {
                stored.mark_read();
                txn.put(&key, &stored)?;
            }
        }
        txn.commit()?;

        Ok(Listing::Messages(views))
    }

    fn open_inbox_entry(&self, key: MessageKey, stored: &StoredMessage) -> MessageView {
        let opened = self
            .directory
            .local_secret(&stored.addr_to)
            .map_err(|_| CryptoError::KeyUnavailable)
            .and_then(|secret| self.crypto.open(&stored.payload, &secret));

        match opened {
            Ok(opened) => MessageView::Decrypted(DecryptedMessage {
                key,
                received: stored.time_received,
                sent: opened.timestamp,
                from: sender_label(&opened),
                to: opened.to.to_string(),
                text: opened.text,
            }),
            Err(e) => {
                tracing::warn!(key = %key, code = e.code(), "could not decrypt inbox message: {}", e);
                MessageView::Undecryptable {
                    key,
                    received: stored.time_received,
                    code: e.code(),
                }
            }
        }
    }

    fn scan_outbox(&self) -> Result<Listing, MessageError> {
        let handle = self.store.open()?;
        let txn = handle.begin();

        let mut views = Vec::new();
        for item in txn.iter_prefix(Partition::Outbox) {
            let (key, stored) = item?;
            let view = match self.crypto.open(&stored.payload, &self.node_key) {
                Ok(opened) => MessageView::Decrypted(DecryptedMessage {
                    key,
                    received: stored.time_received,
                    sent: opened.timestamp,
                    from: sender_label(&opened),
                    to: stored.addr_to.clone(),
                    text: opened.text,
                }),
                Err(e) => {
                    tracing::warn!(key = %key, code = e.code(), "could not decrypt outbox message: {}", e);
                    MessageView::Undecryptable {
                        key,
                        received: stored.time_received,
                        code: e.code(),
                    }
                }
            };
            views.push(view);
        }
        txn.rollback();

        Ok(Listing::Messages(views))
    }

    /// Erase a whole partition; bucket files stay until the next dump
    fn clear(&self, partition: Partition) -> Result<usize, MessageError> {
        let _mutation = self.mutation.lock();
        let mut erased = Vec::new();
        {
            let handle = self.store.open()?;
            let txn = handle.begin();
            for item in txn.iter_prefix(partition) {
                let (key, _) = item?;
                txn.erase(&key);
                erased.push(key);
            }
            txn.commit()?;
        }
        self.buckets.record_erase_all(&erased);

        tracing::info!(%partition, messages = erased.len(), "cleared messages");
        Ok(erased.len())
    }

    /* Buckets */

    pub fn bucket_stats(&self) -> Result<BucketStats, MessageError> {
        self.ensure_enabled()?;
        Ok(self.buckets.stats())
    }

    /// Delete every bucket file and empty the index; stored messages are kept
    pub fn bucket_dump(&self) -> Result<DumpReport, MessageError> {
        self.ensure_enabled()?;
        let _mutation = self.mutation.lock();
        Ok(self.buckets.clear_all())
    }

    pub fn bucket_audit(&self) -> Result<Vec<BucketMismatch>, MessageError> {
        self.ensure_enabled()?;
        Ok(self.buckets.audit())
    }

    /// Rebuild the bucket index, returning the number of tokens indexed
    pub fn rescan_buckets(&self) -> Result<usize, MessageError> {
        self.ensure_enabled()?;
        let _mutation = self.mutation.lock();
        Ok(self.buckets.rebuild(&self.store)?)
    }
}

fn sender_label(opened: &OpenedMessage) -> String {
    opened
        .from
        .as_ref()
        .map(Address::to_string)
        .unwrap_or_else(|| ANONYMOUS.to_string())
}
