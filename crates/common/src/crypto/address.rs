//! Account addresses derived from public keys
//!
//! An address is the base58 encoding of
//! `version (1) || blake3(pubkey)[..20] || checksum (4)`, where the checksum is
//! the first four bytes of `blake3(version || hash)`. Knowing an address alone
//! is not enough to encrypt to it; the matching public key has to be learned
//! separately and is checked against the address when it is registered.

use std::fmt;
use std::str::FromStr;

use super::keys::PublicKey;

/// Version byte prefixed to every address
pub const ADDRESS_VERSION: u8 = 0x19;
/// Size of the key hash embedded in an address
pub const ADDRESS_HASH_SIZE: usize = 20;
/// Size of the trailing checksum
pub const CHECKSUM_SIZE: usize = 4;
/// Decoded size of an address
pub const ADDRESS_SIZE: usize = 1 + ADDRESS_HASH_SIZE + CHECKSUM_SIZE;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address is not valid base58")]
    Encoding,
    #[error("address has wrong length: expected {ADDRESS_SIZE} bytes, got {0}")]
    Length(usize),
    #[error("address has unknown version byte {0:#04x}")]
    Version(u8),
    #[error("address checksum mismatch")]
    Checksum,
}

/// A validated account address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    encoded: String,
    hash: [u8; ADDRESS_HASH_SIZE],
}

fn checksum(version: u8, hash: &[u8; ADDRESS_HASH_SIZE]) -> [u8; CHECKSUM_SIZE] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[version]);
    hasher.update(hash);
    let digest = hasher.finalize();
    let mut out = [0u8; CHECKSUM_SIZE];
    out.copy_from_slice(&digest.as_bytes()[..CHECKSUM_SIZE]);
    out
}

fn key_hash(key: &PublicKey) -> [u8; ADDRESS_HASH_SIZE] {
    let digest = blake3::hash(&key.to_bytes());
    let mut out = [0u8; ADDRESS_HASH_SIZE];
    out.copy_from_slice(&digest.as_bytes()[..ADDRESS_HASH_SIZE]);
    out
}

impl Address {
    /// Derive the address owned by `key`
    pub fn from_public_key(key: &PublicKey) -> Self {
        let hash = key_hash(key);
        let mut raw = Vec::with_capacity(ADDRESS_SIZE);
        raw.push(ADDRESS_VERSION);
        raw.extend_from_slice(&hash);
        raw.extend_from_slice(&checksum(ADDRESS_VERSION, &hash));
        Self {
            encoded: bs58::encode(raw).into_string(),
            hash,
        }
    }

    /// Parse and validate an encoded address
    pub fn parse(encoded: &str) -> Result<Self, AddressError> {
        let raw = bs58::decode(encoded)
            .into_vec()
            .map_err(|_| AddressError::Encoding)?;
        if raw.len() != ADDRESS_SIZE {
            return Err(AddressError::Length(raw.len()));
        }
        if raw[0] != ADDRESS_VERSION {
            return Err(AddressError::Version(raw[0]));
        }

        let mut hash = [0u8; ADDRESS_HASH_SIZE];
        hash.copy_from_slice(&raw[1..1 + ADDRESS_HASH_SIZE]);
        if raw[1 + ADDRESS_HASH_SIZE..] != checksum(raw[0], &hash) {
            return Err(AddressError::Checksum);
        }

        Ok(Self {
            encoded: encoded.to_string(),
            hash,
        })
    }

    /// Whether `key` is the key this address was derived from
    pub fn matches(&self, key: &PublicKey) -> bool {
        self.hash == key_hash(key)
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl FromStr for Address {
    type Err = AddressError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
