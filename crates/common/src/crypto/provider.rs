//! The sealing boundary between the message service and the cryptography
//!
//! The service only ever sees [`CryptoProvider`]: it hands over keys it has
//! resolved through the address directory and gets back framed payloads or
//! opened messages. Failures come back as [`CryptoError`], a closed set of
//! variants with stable numeric codes that per-item error placeholders carry.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use super::address::Address;
use super::keys::{PublicKey, SecretKey, PUBLIC_KEY_SIZE};
use super::payload::PayloadHeader;
use super::secret::Secret;

/// Key derivation context for message body keys
const SEAL_CONTEXT: &str = "smsg 2024-01 sealed message body key";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("malformed payload")]
    MalformedPayload,
    #[error("unsupported payload version {0}")]
    UnsupportedVersion(u8),
    #[error("payload hash mismatch")]
    HashMismatch,
    #[error("key agreement failed")]
    KeyAgreement,
    #[error("decryption failed")]
    DecryptFailed,
    #[error("message body could not be decoded")]
    BodyDecode,
    #[error("sender signature is invalid")]
    SignatureInvalid,
    #[error("sealing failed")]
    SealFailed,
    #[error("no local key available for message")]
    KeyUnavailable,
}

impl CryptoError {
    /// Stable numeric code, reported in place of undecryptable messages
    pub fn code(&self) -> u32 {
        match self {
            CryptoError::MalformedPayload => 1,
            CryptoError::UnsupportedVersion(_) => 2,
            CryptoError::HashMismatch => 3,
            CryptoError::KeyAgreement => 4,
            CryptoError::DecryptFailed => 5,
            CryptoError::BodyDecode => 6,
            CryptoError::SignatureInvalid => 7,
            CryptoError::SealFailed => 8,
            CryptoError::KeyUnavailable => 9,
        }
    }
}

/// A successfully opened message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedMessage {
    /// Sender-claimed send time, unix seconds
    pub timestamp: i64,
    /// Verified sender address, `None` for anonymous messages
    pub from: Option<Address>,
    /// Address of the key that opened the message
    pub to: Address,
    pub text: String,
}

/// Seals and opens message payloads
///
/// Implementations must produce payloads framed with [`PayloadHeader`]; the
/// store keys messages off the header.
pub trait CryptoProvider: Send + Sync + Debug + 'static {
    /// Seal `text` for `recipient`, signed by `sender` unless anonymous
    fn seal(
        &self,
        sender: Option<&SecretKey>,
        recipient: &PublicKey,
        timestamp: i64,
        text: &str,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Open a payload with the recipient's secret key
    fn open(&self, payload: &[u8], recipient: &SecretKey) -> Result<OpenedMessage, CryptoError>;
}

#[derive(Serialize, Deserialize)]
struct SealedBody {
    timestamp: i64,
    sender: Option<[u8; PUBLIC_KEY_SIZE]>,
    signature: Option<Vec<u8>>,
    text: String,
}

fn signing_message(timestamp: i64, recipient: &PublicKey, text: &str) -> Vec<u8> {
    let mut msg = Vec::with_capacity(8 + PUBLIC_KEY_SIZE + text.len());
    msg.extend_from_slice(&timestamp.to_be_bytes());
    msg.extend_from_slice(&recipient.to_bytes());
    msg.extend_from_slice(text.as_bytes());
    msg
}

fn body_key(shared: &[u8; 32], ephemeral: &PublicKey, recipient: &PublicKey) -> Secret {
    let mut material = Vec::with_capacity(32 + 2 * PUBLIC_KEY_SIZE);
    material.extend_from_slice(shared);
    material.extend_from_slice(&ephemeral.to_bytes());
    material.extend_from_slice(&recipient.to_bytes());
    Secret::derive(SEAL_CONTEXT, &material)
}

/// Default provider: ephemeral X25519 agreement + ChaCha20-Poly1305
///
/// # Body Format
///
/// ```text
/// [ ephemeral_pubkey: 32 ][ nonce || encrypted(hash || bincode(body)) || tag ]
/// ```
///
/// The ephemeral key is thrown away after sealing, so a sender cannot open
/// its own sealed copy; the service keeps a second copy sealed to the node
/// key for that.
#[derive(Debug, Clone, Copy, Default)]
pub struct SealedBoxProvider;

impl CryptoProvider for SealedBoxProvider {
    fn seal(
        &self,
        sender: Option<&SecretKey>,
        recipient: &PublicKey,
        timestamp: i64,
        text: &str,
    ) -> Result<Vec<u8>, CryptoError> {
        let ephemeral = SecretKey::generate();
        let ephemeral_public = ephemeral.public();
        let recipient_x25519 = recipient
            .to_x25519()
            .map_err(|_| CryptoError::KeyAgreement)?;
        let shared = ephemeral.to_x25519().diffie_hellman(&recipient_x25519);
        let secret = body_key(shared.as_bytes(), &ephemeral_public, recipient);

        let (sender_key, signature) = match sender {
            Some(key) => {
                let sig = key.sign(&signing_message(timestamp, recipient, text));
                (Some(key.public().to_bytes()), Some(sig.to_bytes().to_vec()))
            }
            None => (None, None),
        };
        let sealed = SealedBody {
            timestamp,
            sender: sender_key,
            signature,
            text: text.to_string(),
        };
        let encoded = bincode::serialize(&sealed).map_err(|_| CryptoError::SealFailed)?;
        let ciphertext = secret
            .encrypt(&encoded)
            .map_err(|_| CryptoError::SealFailed)?;

        let mut body = Vec::with_capacity(PUBLIC_KEY_SIZE + ciphertext.len());
        body.extend_from_slice(&ephemeral_public.to_bytes());
        body.extend_from_slice(&ciphertext);
        PayloadHeader::frame(timestamp, &body)
    }

    fn open(&self, payload: &[u8], recipient: &SecretKey) -> Result<OpenedMessage, CryptoError> {
        let (header, body) = PayloadHeader::parse(payload)?;
        if body.len() < PUBLIC_KEY_SIZE {
            return Err(CryptoError::MalformedPayload);
        }

        let ephemeral = PublicKey::try_from(&body[..PUBLIC_KEY_SIZE])
            .map_err(|_| CryptoError::KeyAgreement)?;
        let ephemeral_x25519 = ephemeral
            .to_x25519()
            .map_err(|_| CryptoError::KeyAgreement)?;
        let shared = recipient.to_x25519().diffie_hellman(&ephemeral_x25519);
        let recipient_public = recipient.public();
        let secret = body_key(shared.as_bytes(), &ephemeral, &recipient_public);

        let plaintext = secret
            .decrypt(&body[PUBLIC_KEY_SIZE..])
            .map_err(|_| CryptoError::DecryptFailed)?;
        let sealed: SealedBody =
            bincode::deserialize(&plaintext).map_err(|_| CryptoError::BodyDecode)?;
        if sealed.timestamp != header.timestamp {
            return Err(CryptoError::MalformedPayload);
        }

        let from = match (sealed.sender, sealed.signature) {
            (None, None) => None,
            (Some(sender), Some(signature)) => {
                let sender =
                    PublicKey::from_bytes(&sender).map_err(|_| CryptoError::SignatureInvalid)?;
                let signature = ed25519_dalek::Signature::from_slice(&signature)
                    .map_err(|_| CryptoError::SignatureInvalid)?;
                sender
                    .verify(
                        &signing_message(sealed.timestamp, &recipient_public, &sealed.text),
                        &signature,
                    )
                    .map_err(|_| CryptoError::SignatureInvalid)?;
                Some(Address::from_public_key(&sender))
            }
            _ => return Err(CryptoError::SignatureInvalid),
        };

        Ok(OpenedMessage {
            timestamp: sealed.timestamp,
            from,
            to: Address::from_public_key(&recipient_public),
            text: sealed.text,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_seal_open_signed() {
        let alice = SecretKey::generate();
        let bob = SecretKey::generate();
        let provider = SealedBoxProvider;

        let payload = provider
            .seal(Some(&alice), &bob.public(), 1_700_000_000, "hi bob")
            .unwrap();
        let opened = provider.open(&payload, &bob).unwrap();

        assert_eq!(opened.text, "hi bob");
        assert_eq!(opened.timestamp, 1_700_000_000);
        assert_eq!(opened.from, Some(Address::from_public_key(&alice.public())));
        assert_eq!(opened.to, Address::from_public_key(&bob.public()));
    }

    #[test]
    fn test_seal_open_anonymous() {
        let bob = SecretKey::generate();
        let provider = SealedBoxProvider;

        let payload = provider.seal(None, &bob.public(), 5, "who am i").unwrap();
        let opened = provider.open(&payload, &bob).unwrap();
        assert_eq!(opened.from, None);
        assert_eq!(opened.text, "who am i");
    }

    #[test]
    fn test_open_with_wrong_key() {
        let bob = SecretKey::generate();
        let eve = SecretKey::generate();
        let provider = SealedBoxProvider;

        let payload = provider.seal(None, &bob.public(), 5, "private").unwrap();
        let err = provider.open(&payload, &eve).unwrap_err();
        assert_eq!(err, CryptoError::DecryptFailed);
        assert_eq!(err.code(), 5);
    }

    #[test]
    fn test_open_rejects_corrupt_header() {
        let bob = SecretKey::generate();
        let provider = SealedBoxProvider;

        let mut payload = provider.seal(None, &bob.public(), 5, "private").unwrap();
        let last = payload.len() - 1;
        payload[last] ^= 0xFF;
        assert_eq!(
            provider.open(&payload, &bob).unwrap_err(),
            CryptoError::HashMismatch
        );
    }

    #[test]
    fn test_codes_are_distinct() {
        let all = [
            CryptoError::MalformedPayload,
            CryptoError::UnsupportedVersion(0),
            CryptoError::HashMismatch,
            CryptoError::KeyAgreement,
            CryptoError::DecryptFailed,
            CryptoError::BodyDecode,
            CryptoError::SignatureInvalid,
            CryptoError::SealFailed,
            CryptoError::KeyUnavailable,
        ];
        let mut codes: Vec<u32> = all.iter().map(CryptoError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
