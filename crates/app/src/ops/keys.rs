use clap::Args;
use common::directory::{AddressEntry, AddressFilter};
use common::prelude::{MessageError, MessageService};

use crate::op::{Op, OpContext};
use crate::state::StateError;

/// Parse a listing filter: `whitelist` (receive enabled), `all` or `wallet`
pub fn parse_key_filter(filter: &str) -> Result<AddressFilter, String> {
    match filter {
        "whitelist" => Ok(AddressFilter::ReceiveEnabled),
        "all" => Ok(AddressFilter::All),
        "wallet" => Ok(AddressFilter::Wallet),
        other => Err(format!(
            "unknown filter '{}', expected whitelist, all or wallet",
            other
        )),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KeysError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Messaging(#[from] MessageError),
}

#[derive(Args, Debug, Clone)]
pub struct LocalKeys {
    /// whitelist | all | wallet
    #[arg(default_value = "whitelist", value_parser = parse_key_filter)]
    pub filter: AddressFilter,
}

fn format_entry(
    service: &MessageService,
    entry: &AddressEntry,
    filter: AddressFilter,
) -> Option<String> {
    let public_key = match service.resolve_public_key(entry.address.as_str()) {
        Ok(key) => key.to_base58(),
        Err(e) => {
            tracing::warn!(address = %entry.address, "skipping entry: {}", e);
            return None;
        }
    };

    let info = match filter {
        AddressFilter::Wallet => {
            return Some(format!(
                "{} - {} - {}",
                entry.address, public_key, entry.label
            ))
        }
        AddressFilter::All => format!(
            "Receive {}, Anon {}",
            if entry.receive_enabled { "on" } else { "off" },
            if entry.anon_enabled { "on" } else { "off" }
        ),
        AddressFilter::ReceiveEnabled => {
            format!("Anon {}", if entry.anon_enabled { "on" } else { "off" })
        }
    };
    Some(format!(
        "{} - {} {} - {}",
        entry.address, public_key, info, entry.label
    ))
}

#[async_trait::async_trait]
impl Op for LocalKeys {
    type Error = KeysError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (_, service) = ctx.service()?;
        let addresses = service.list_addresses(self.filter)?;

        let mut lines: Vec<String> = addresses
            .iter()
            .filter_map(|entry| format_entry(&service, entry, self.filter))
            .collect();
        let count = lines.len();
        lines.push(match self.filter {
            AddressFilter::Wallet => format!("{} keys listed from wallet.", count),
            _ => format!("{} keys listed.", count),
        });
        Ok(lines.join("\n"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct NewAddress {
    /// Label for the new address
    #[arg(long, default_value = "")]
    pub label: String,
}

#[async_trait::async_trait]
impl Op for NewAddress {
    type Error = KeysError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (_, service) = ctx.service()?;
        let entry = service.generate_address(&self.label)?;
        let public_key = service.resolve_public_key(entry.address.as_str())?;
        Ok(format!(
            "{} - {} Receive {}, Anon {}",
            entry.address,
            public_key.to_base58(),
            if entry.receive_enabled { "on" } else { "off" },
            if entry.anon_enabled { "on" } else { "off" }
        ))
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddKey {
    pub address: String,

    /// Base58 encoded public key
    pub public_key: String,
}

#[async_trait::async_trait]
impl Op for AddKey {
    type Error = KeysError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (_, service) = ctx.service()?;
        let entry = service.add_external_key(&self.address, &self.public_key)?;
        Ok(format!("Public key added for {}.", entry.address))
    }
}

#[derive(Args, Debug, Clone)]
pub struct GetPubkey {
    pub address: String,
}

#[async_trait::async_trait]
impl Op for GetPubkey {
    type Error = KeysError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (_, service) = ctx.service()?;
        let public_key = service.resolve_public_key(&self.address)?;
        Ok(format!("{} {}", self.address, public_key.to_base58()))
    }
}
