//! Payload framing shared by every [`CryptoProvider`](super::CryptoProvider)
//!
//! # Wire Format
//!
//! ```text
//! [ version: 1 ][ timestamp: 8 BE ][ payload_hash: 32 ][ body_len: 4 BE ][ body: body_len ]
//! ```
//!
//! `payload_hash` is the BLAKE3 hash of `body`. The header is checked before
//! any key material is touched, so a corrupted or truncated payload is rejected
//! cheaply. The store derives message keys from `timestamp` and the leading
//! bytes of `payload_hash`.

use super::provider::CryptoError;
use super::secret::BLAKE3_HASH_SIZE;

/// Current payload format version
pub const PAYLOAD_VERSION: u8 = 1;
/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 1 + 8 + BLAKE3_HASH_SIZE + 4;

/// Parsed payload header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    pub version: u8,
    /// Sender-claimed send time, unix seconds
    pub timestamp: i64,
    pub payload_hash: [u8; BLAKE3_HASH_SIZE],
    pub body_len: u32,
}

impl PayloadHeader {
    /// Frame `body` behind a freshly computed header
    pub fn frame(timestamp: i64, body: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let body_len = u32::try_from(body.len()).map_err(|_| CryptoError::SealFailed)?;
        let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
        out.push(PAYLOAD_VERSION);
        out.extend_from_slice(&timestamp.to_be_bytes());
        out.extend_from_slice(blake3::hash(body).as_bytes());
        out.extend_from_slice(&body_len.to_be_bytes());
        out.extend_from_slice(body);
        Ok(out)
    }

    /// Parse and verify a payload, returning its header and body
    ///
    /// # Errors
    ///
    /// - [`CryptoError::MalformedPayload`] if the payload is truncated or its
    ///   length disagrees with the header
    /// - [`CryptoError::UnsupportedVersion`] for an unknown version byte
    /// - [`CryptoError::HashMismatch`] if the body does not hash to `payload_hash`
    pub fn parse(payload: &[u8]) -> Result<(Self, &[u8]), CryptoError> {
        if payload.len() < HEADER_SIZE {
            return Err(CryptoError::MalformedPayload);
        }

        let version = payload[0];
        if version != PAYLOAD_VERSION {
            return Err(CryptoError::UnsupportedVersion(version));
        }

        let mut ts = [0u8; 8];
        ts.copy_from_slice(&payload[1..9]);
        let mut payload_hash = [0u8; BLAKE3_HASH_SIZE];
        payload_hash.copy_from_slice(&payload[9..9 + BLAKE3_HASH_SIZE]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&payload[9 + BLAKE3_HASH_SIZE..HEADER_SIZE]);

        let header = Self {
            version,
            timestamp: i64::from_be_bytes(ts),
            payload_hash,
            body_len: u32::from_be_bytes(len),
        };

        let body = &payload[HEADER_SIZE..];
        if body.len() != header.body_len as usize {
            return Err(CryptoError::MalformedPayload);
        }
        if blake3::hash(body).as_bytes() != &header.payload_hash {
            return Err(CryptoError::HashMismatch);
        }

        Ok((header, body))
    }
}
