//! Address directory
//!
//! Maps addresses to capability flags and public keys. Two kinds of entries
//! live here:
//!
//! - **wallet** entries, owned by this node: they carry a secret key and may
//!   receive messages
//! - **external** entries, registered with `add_external_key`: public key
//!   only, usable as send targets
//!
//! Listing order is insertion order. When the directory is backed by a file,
//! every mutation is written through before it becomes visible; a failed write
//! leaves the directory exactly as it was.

mod options;

pub use options::{MessagingOptions, OptionError, NEW_ADDRESS_ANON, NEW_ADDRESS_RECV};

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::crypto::{Address, AddressError, KeyError, PublicKey, SecretKey, PUBLIC_KEY_SIZE};

/// Current on-disk directory format version
const DIRECTORY_FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("address not found: {0}")]
    AddressNotFound(String),
    #[error("invalid address {address}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: AddressError,
    },
    #[error("no public key on file for {0}")]
    KeyNotFound(String),
    #[error("public key on file for {0} is not a valid compressed key")]
    KeyNotUsable(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(#[source] KeyError),
    #[error("public key does not belong to address {0}")]
    PublicKeyAddressMismatch(String),
    #[error("address already present: {0}")]
    AddressAlreadyPresent(String),
    #[error("directory file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("directory file is corrupt: {0}")]
    Corrupt(String),
}

/// Which entries `list_addresses` yields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFilter {
    All,
    /// Entries that accept incoming messages
    ReceiveEnabled,
    /// Entries owned by this node
    Wallet,
}

/// Combined flag state returned by the flag setters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressFlags {
    pub receive_enabled: bool,
    pub anon_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressEntry {
    pub address: Address,
    pub label: String,
    pub receive_enabled: bool,
    pub anon_enabled: bool,
    /// Whether this node holds the secret key
    pub owned: bool,
}

impl AddressEntry {
    pub fn flags(&self) -> AddressFlags {
        AddressFlags {
            receive_enabled: self.receive_enabled,
            anon_enabled: self.anon_enabled,
        }
    }

    fn matches(&self, filter: AddressFilter) -> bool {
        match filter {
            AddressFilter::All => true,
            AddressFilter::ReceiveEnabled => self.receive_enabled,
            AddressFilter::Wallet => self.owned,
        }
    }
}

#[derive(Debug, Clone)]
struct Record {
    entry: AddressEntry,
    /// Raw compressed key bytes as registered; not necessarily a valid point
    public_key: [u8; PUBLIC_KEY_SIZE],
    secret: Option<SecretKey>,
}

/// A snapshot of matching entries
///
/// Iterating is lazy and can be repeated; the snapshot does not change when
/// the directory does.
#[derive(Debug, Clone)]
pub struct Addresses {
    entries: Vec<AddressEntry>,
    filter: AddressFilter,
}

impl Addresses {
    pub fn iter(&self) -> impl Iterator<Item = &AddressEntry> + '_ {
        let filter = self.filter;
        self.entries.iter().filter(move |entry| entry.matches(filter))
    }
}

impl<'a> IntoIterator for &'a Addresses {
    type Item = &'a AddressEntry;
    type IntoIter = Box<dyn Iterator<Item = &'a AddressEntry> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[derive(Serialize, Deserialize)]
struct DirectoryFile {
    version: u32,
    entries: Vec<EntryFile>,
}

#[derive(Serialize, Deserialize)]
struct EntryFile {
    address: String,
    label: String,
    receive_enabled: bool,
    anon_enabled: bool,
    public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret_key: Option<String>,
}

impl From<&Record> for EntryFile {
    fn from(record: &Record) -> Self {
        Self {
            address: record.entry.address.to_string(),
            label: record.entry.label.clone(),
            receive_enabled: record.entry.receive_enabled,
            anon_enabled: record.entry.anon_enabled,
            public_key: bs58::encode(record.public_key).into_string(),
            secret_key: record.secret.as_ref().map(SecretKey::to_hex),
        }
    }
}

impl TryFrom<EntryFile> for Record {
    type Error = DirectoryError;

    fn try_from(file: EntryFile) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| DirectoryError::Corrupt(format!("{what} for {}", file.address));
        let address = Address::parse(&file.address).map_err(|_| corrupt("bad address"))?;
        let raw = bs58::decode(&file.public_key)
            .into_vec()
            .map_err(|_| corrupt("bad public key encoding"))?;
        let public_key: [u8; PUBLIC_KEY_SIZE] = raw
            .as_slice()
            .try_into()
            .map_err(|_| corrupt("bad public key length"))?;
        let secret = file
            .secret_key
            .as_deref()
            .map(SecretKey::from_hex)
            .transpose()
            .map_err(|_| corrupt("bad secret key"))?;
        if let Some(secret) = &secret {
            if secret.public().to_bytes() != public_key {
                return Err(corrupt("secret key does not match public key"));
            }
        }

        Ok(Self {
            entry: AddressEntry {
                address,
                label: file.label,
                receive_enabled: file.receive_enabled,
                anon_enabled: file.anon_enabled,
                owned: secret.is_some(),
            },
            public_key,
            secret,
        })
    }
}

#[derive(Debug, Default)]
pub struct AddressDirectory {
    records: RwLock<Vec<Record>>,
    path: Option<PathBuf>,
}

impl AddressDirectory {
    /// A directory that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the directory from `path`, starting empty if the file does not exist yet
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, DirectoryError> {
        let path = path.into();
        let records = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let file: DirectoryFile =
                serde_json::from_str(&raw).map_err(|e| DirectoryError::Corrupt(e.to_string()))?;
            if file.version != DIRECTORY_FORMAT_VERSION {
                return Err(DirectoryError::Corrupt(format!(
                    "unsupported directory format version {}",
                    file.version
                )));
            }
            file.entries
                .into_iter()
                .map(Record::try_from)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        tracing::debug!(path = %path.display(), entries = records.len(), "loaded address directory");
        Ok(Self {
            records: RwLock::new(records),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the current entries to the backing file, if any
    pub fn save(&self) -> Result<(), DirectoryError> {
        self.persist(&self.records.read())
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn get(&self, address: &str) -> Option<AddressEntry> {
        self.records
            .read()
            .iter()
            .find(|record| record.entry.address.as_str() == address)
            .map(|record| record.entry.clone())
    }

    pub fn list_addresses(&self, filter: AddressFilter) -> Addresses {
        let entries = self
            .records
            .read()
            .iter()
            .map(|record| record.entry.clone())
            .collect();
        Addresses { entries, filter }
    }

    pub fn set_receive_flag(
        &self,
        address: &str,
        enabled: bool,
    ) -> Result<AddressFlags, DirectoryError> {
        self.update_entry(address, |entry| entry.receive_enabled = enabled)
    }

    pub fn set_anon_flag(&self, address: &str, enabled: bool) -> Result<AddressFlags, DirectoryError> {
        self.update_entry(address, |entry| entry.anon_enabled = enabled)
    }

    /// Look up the public key for `address`
    ///
    /// Keys owned by this node are consulted before external entries.
    pub fn resolve_public_key(&self, address: &str) -> Result<PublicKey, DirectoryError> {
        let parsed = parse_address(address)?;
        let records = self.records.read();

        let owned = records
            .iter()
            .filter_map(|record| record.secret.as_ref().map(|secret| (record, secret)))
            .find(|(record, _)| record.entry.address == parsed);
        if let Some((_, secret)) = owned {
            return Ok(secret.public());
        }

        let external = records
            .iter()
            .find(|record| record.secret.is_none() && record.entry.address == parsed)
            .ok_or_else(|| DirectoryError::KeyNotFound(address.to_string()))?;
        PublicKey::from_bytes(&external.public_key)
            .map_err(|_| DirectoryError::KeyNotUsable(address.to_string()))
    }

    /// Register the public key of a remote address
    ///
    /// The new entry can be sent to but never receives.
    pub fn add_external_key(
        &self,
        address: &str,
        public_key: &str,
    ) -> Result<AddressEntry, DirectoryError> {
        let parsed = parse_address(address)?;
        let key = PublicKey::from_base58(public_key).map_err(DirectoryError::InvalidPublicKey)?;
        if !parsed.matches(&key) {
            return Err(DirectoryError::PublicKeyAddressMismatch(address.to_string()));
        }

        let entry = AddressEntry {
            address: parsed,
            label: String::new(),
            receive_enabled: false,
            anon_enabled: false,
            owned: false,
        };
        self.insert(Record {
            entry: entry.clone(),
            public_key: key.to_bytes(),
            secret: None,
        })?;

        tracing::debug!(address = %entry.address, "registered external key");
        Ok(entry)
    }

    /// Generate a new wallet address, flagged according to `options`
    pub fn generate_local(
        &self,
        label: &str,
        options: &MessagingOptions,
    ) -> Result<AddressEntry, DirectoryError> {
        self.import_local(label, SecretKey::generate(), options)
    }

    /// Add an existing secret key as a wallet address
    pub fn import_local(
        &self,
        label: &str,
        secret: SecretKey,
        options: &MessagingOptions,
    ) -> Result<AddressEntry, DirectoryError> {
        let public_key = secret.public();
        let entry = AddressEntry {
            address: Address::from_public_key(&public_key),
            label: label.to_string(),
            receive_enabled: options.new_address_recv,
            anon_enabled: options.new_address_anon,
            owned: true,
        };
        self.insert(Record {
            entry: entry.clone(),
            public_key: public_key.to_bytes(),
            secret: Some(secret),
        })?;

        tracing::info!(address = %entry.address, "added wallet address");
        Ok(entry)
    }

    /// The secret key of a wallet address
    pub fn local_secret(&self, address: &str) -> Result<SecretKey, DirectoryError> {
        let records = self.records.read();
        let record = records
            .iter()
            .find(|record| record.entry.address.as_str() == address)
            .ok_or_else(|| DirectoryError::AddressNotFound(address.to_string()))?;
        record
            .secret
            .clone()
            .ok_or_else(|| DirectoryError::KeyNotFound(address.to_string()))
    }

    /// Wallet entries that accept incoming messages, with their secret keys
    pub fn receiving_keys(&self) -> Vec<(AddressEntry, SecretKey)> {
        self.records
            .read()
            .iter()
            .filter(|record| record.entry.receive_enabled)
            .filter_map(|record| {
                record
                    .secret
                    .clone()
                    .map(|secret| (record.entry.clone(), secret))
            })
            .collect()
    }

    fn insert(&self, record: Record) -> Result<(), DirectoryError> {
        self.mutate(|records| {
            if records
                .iter()
                .any(|existing| existing.entry.address == record.entry.address)
            {
                return Err(DirectoryError::AddressAlreadyPresent(
                    record.entry.address.to_string(),
                ));
            }
            records.push(record);
            Ok(())
        })
    }

    fn update_entry(
        &self,
        address: &str,
        f: impl FnOnce(&mut AddressEntry),
    ) -> Result<AddressFlags, DirectoryError> {
        self.mutate(|records| {
            let record = records
                .iter_mut()
                .find(|record| record.entry.address.as_str() == address)
                .ok_or_else(|| DirectoryError::AddressNotFound(address.to_string()))?;
            f(&mut record.entry);
            Ok(record.entry.flags())
        })
    }

    /// Apply `f` to a copy of the records, persist it, then publish it
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Vec<Record>) -> Result<T, DirectoryError>,
    ) -> Result<T, DirectoryError> {
        let mut records = self.records.write();
        let mut staged = records.clone();
        let out = f(&mut staged)?;
        self.persist(&staged)?;
        *records = staged;
        Ok(out)
    }

    fn persist(&self, records: &[Record]) -> Result<(), DirectoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let file = DirectoryFile {
            version: DIRECTORY_FORMAT_VERSION,
            entries: records.iter().map(EntryFile::from).collect(),
        };
        let json =
            serde_json::to_string_pretty(&file).map_err(|e| DirectoryError::Corrupt(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    #[cfg(test)]
    fn insert_raw_external(&self, address: Address, public_key: [u8; PUBLIC_KEY_SIZE]) {
        self.records.write().push(Record {
            entry: AddressEntry {
                address,
                label: String::new(),
                receive_enabled: false,
                anon_enabled: false,
                owned: false,
            },
            public_key,
            secret: None,
        });
    }
}

fn parse_address(address: &str) -> Result<Address, DirectoryError> {
    Address::parse(address).map_err(|source| DirectoryError::InvalidAddress {
        address: address.to_string(),
        source,
    })
}
