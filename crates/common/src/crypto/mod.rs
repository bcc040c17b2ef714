//! Cryptographic primitives for secure messaging
//!
//! - **Identity**: Ed25519 keypairs; the public half is exchanged in its
//!   compressed 32-byte form, base58 encoded
//! - **Addresses**: checksummed base58 hashes of public keys
//! - **Sealing**: ephemeral X25519 key agreement + ChaCha20-Poly1305, behind
//!   the [`CryptoProvider`] trait so the message service never touches
//!   primitives directly
//! - **Framing**: a fixed header carrying the send time and the BLAKE3 hash of
//!   the sealed body
//!
//! # Sealing
//!
//! To seal a message for a recipient:
//! 1. Generate an ephemeral Ed25519 keypair
//! 2. Convert both the ephemeral secret and the recipient's key to X25519
//! 3. Perform ECDH and derive a body key from the shared secret with BLAKE3
//! 4. Encrypt the signed (or anonymous) body with ChaCha20-Poly1305
//! 5. Frame `ephemeral_pubkey || ciphertext` behind the payload header
//!
//! The recipient repeats the agreement with its own secret key and the
//! ephemeral public key found at the start of the body.

mod address;
mod keys;
mod payload;
mod provider;
mod secret;

pub use address::{Address, AddressError, ADDRESS_VERSION};
pub use ed25519_dalek::Signature;
pub use keys::{KeyError, PublicKey, SecretKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
pub use payload::{PayloadHeader, HEADER_SIZE, PAYLOAD_VERSION};
pub use provider::{CryptoError, CryptoProvider, OpenedMessage, SealedBoxProvider};
pub use secret::{Secret, SecretError, BLAKE3_HASH_SIZE};

#[cfg(test)]
pub(crate) use keys::off_curve_bytes;
