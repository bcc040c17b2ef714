//! Shared test utilities for messaging integration tests
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use ::common::bucket::bucket_timestamp;
use ::common::crypto::{
    Address, CryptoError, CryptoProvider, OpenedMessage, PayloadHeader, PublicKey, SecretKey,
    PUBLIC_KEY_SIZE,
};
use ::common::directory::AddressDirectory;
use ::common::service::{MessageService, ServiceConfig};
use ::common::store::{MessageKey, Partition};
use tempfile::TempDir;

/// Route library events to the test harness; filtered with RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Set up an enabled service with the default provider and one wallet address
pub fn setup_test_env() -> (MessageService, String, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let service = MessageService::with_sealed_box(
        enabled_config(&temp_dir),
        AddressDirectory::load(temp_dir.path().join("addresses.json")).unwrap(),
    )
    .unwrap();
    let address = service.generate_address("main").unwrap().address.to_string();
    (service, address, temp_dir)
}

/// Set up an enabled service around a custom provider
pub fn setup_with_provider<P: CryptoProvider>(provider: P) -> (MessageService<P>, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let service = MessageService::new(
        enabled_config(&temp_dir),
        AddressDirectory::in_memory(),
        provider,
    )
    .unwrap();
    (service, temp_dir)
}

pub fn enabled_config(temp_dir: &TempDir) -> ServiceConfig {
    let mut config = ServiceConfig::new(temp_dir.path(), SecretKey::generate());
    config.enabled = true;
    config
}

/// A remote identity: its key, address and base58 public key
pub fn remote_identity() -> (SecretKey, String, String) {
    let key = SecretKey::generate();
    let address = Address::from_public_key(&key.public()).to_string();
    let public = key.public().to_base58();
    (key, address, public)
}

/// Assert that every non-empty bucket holds exactly the keys stored under its window
pub fn assert_buckets_consistent<P: CryptoProvider>(service: &MessageService<P>) {
    let window = service.buckets().window();
    let mut expected: BTreeMap<i64, BTreeSet<MessageKey>> = BTreeMap::new();
    {
        let handle = service.store().open().unwrap();
        let txn = handle.begin();
        for partition in [Partition::Inbox, Partition::Outbox] {
            for item in txn.iter_prefix(partition) {
                let (key, _) = item.unwrap();
                expected
                    .entry(bucket_timestamp(key.timestamp(), window))
                    .or_default()
                    .insert(key);
            }
        }
    }

    let actual: BTreeMap<i64, BTreeSet<MessageKey>> = service
        .buckets()
        .snapshot()
        .into_iter()
        .filter(|summary| !summary.is_empty())
        .map(|summary| (summary.timestamp, summary.tokens))
        .collect();
    assert_eq!(actual, expected);
}

/// Transparent provider for exercising failure paths
///
/// The body is `recipient_pubkey || sender_flag || [sender_pubkey] || text`,
/// unencrypted. Opening fails with `BodyDecode` for any text containing
/// [`UNREADABLE`], and every seal fails while `fail_seal` is set.
#[derive(Debug, Default)]
pub struct PlainProvider {
    pub fail_seal: AtomicBool,
}

pub const UNREADABLE: &str = "#unreadable";

impl PlainProvider {
    pub fn set_fail_seal(&self, fail: bool) {
        self.fail_seal.store(fail, Ordering::SeqCst);
    }
}

impl CryptoProvider for PlainProvider {
    fn seal(
        &self,
        sender: Option<&SecretKey>,
        recipient: &PublicKey,
        timestamp: i64,
        text: &str,
    ) -> Result<Vec<u8>, CryptoError> {
        if self.fail_seal.load(Ordering::SeqCst) {
            return Err(CryptoError::SealFailed);
        }
        let mut body = recipient.to_bytes().to_vec();
        match sender {
            Some(key) => {
                body.push(1);
                body.extend_from_slice(&key.public().to_bytes());
            }
            None => body.push(0),
        }
        body.extend_from_slice(text.as_bytes());
        PayloadHeader::frame(timestamp, &body)
    }

    fn open(&self, payload: &[u8], recipient: &SecretKey) -> Result<OpenedMessage, CryptoError> {
        let (header, body) = PayloadHeader::parse(payload)?;
        if body.len() < PUBLIC_KEY_SIZE + 1 {
            return Err(CryptoError::MalformedPayload);
        }
        if body[..PUBLIC_KEY_SIZE] != recipient.public().to_bytes() {
            return Err(CryptoError::DecryptFailed);
        }

        let (from, rest) = match body[PUBLIC_KEY_SIZE] {
            0 => (None, &body[PUBLIC_KEY_SIZE + 1..]),
            _ => {
                let start = PUBLIC_KEY_SIZE + 1;
                let sender = body
                    .get(start..start + PUBLIC_KEY_SIZE)
                    .ok_or(CryptoError::MalformedPayload)?;
                let sender =
                    PublicKey::try_from(sender).map_err(|_| CryptoError::SignatureInvalid)?;
                (
                    Some(Address::from_public_key(&sender)),
                    &body[start + PUBLIC_KEY_SIZE..],
                )
            }
        };
        let text = String::from_utf8(rest.to_vec()).map_err(|_| CryptoError::BodyDecode)?;
        if text.contains(UNREADABLE) {
            return Err(CryptoError::BodyDecode);
        }

        Ok(OpenedMessage {
            timestamp: header.timestamp,
            from,
            to: Address::from_public_key(&recipient.public()),
            text,
        })
    }
}
