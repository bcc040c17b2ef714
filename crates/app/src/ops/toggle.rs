use clap::Args;
use common::directory::AddressFlags;
use common::prelude::MessageError;

use crate::op::{Op, OpContext};
use crate::state::StateError;

/// Parse a toggle operation: `+`, `on`, `add`, `a` switch on; `-`, `off`,
/// `rem`, `r` switch off
pub fn parse_toggle(op: &str) -> Result<bool, String> {
    match op {
        "+" | "on" | "add" | "a" => Ok(true),
        "-" | "off" | "rem" | "r" => Ok(false),
        other => Err(format!(
            "unknown operation '{}', expected one of + - on off add rem a r",
            other
        )),
    }
}

#[derive(Args, Debug, Clone)]
pub struct ToggleReceive {
    /// Operation: + on add a | - off rem r
    #[arg(value_parser = parse_toggle, action = clap::ArgAction::Set, allow_hyphen_values = true)]
    pub enable: bool,

    pub address: String,
}

#[derive(Args, Debug, Clone)]
pub struct ToggleAnon {
    /// Operation: + on add a | - off rem r
    #[arg(value_parser = parse_toggle, action = clap::ArgAction::Set, allow_hyphen_values = true)]
    pub enable: bool,

    pub address: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ToggleError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Messaging(#[from] MessageError),
}

fn format_flags(address: &str, flags: AddressFlags) -> String {
    format!(
        "{} Receive {}, Anon {}",
        address,
        if flags.receive_enabled { "on" } else { "off" },
        if flags.anon_enabled { "on" } else { "off" }
    )
}

#[async_trait::async_trait]
impl Op for ToggleReceive {
    type Error = ToggleError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (_, service) = ctx.service()?;
        let flags = service.set_receive_flag(&self.address, self.enable)?;
        Ok(format_flags(&self.address, flags))
    }
}

#[async_trait::async_trait]
impl Op for ToggleAnon {
    type Error = ToggleError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (_, service) = ctx.service()?;
        let flags = service.set_anon_flag(&self.address, self.enable)?;
        Ok(format_flags(&self.address, flags))
    }
}
