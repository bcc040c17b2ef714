use clap::Args;
use common::prelude::{InboxMode, Listing, MessageError, MessageView, OutboxMode};

use super::format_time;
use crate::op::{Op, OpContext};
use crate::state::StateError;

/// Parse an inbox mode: `all`, `unread` or `clear`
pub fn parse_inbox_mode(mode: &str) -> Result<InboxMode, String> {
    match mode {
        "all" => Ok(InboxMode::All),
        "unread" => Ok(InboxMode::Unread),
        "clear" => Ok(InboxMode::Clear),
        other => Err(format!(
            "unknown mode '{}', expected all, unread or clear",
            other
        )),
    }
}

/// Parse an outbox mode: `all` or `clear`
pub fn parse_outbox_mode(mode: &str) -> Result<OutboxMode, String> {
    match mode {
        "all" => Ok(OutboxMode::All),
        "clear" => Ok(OutboxMode::Clear),
        other => Err(format!("unknown mode '{}', expected all or clear", other)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Messaging(#[from] MessageError),
}

fn format_view(view: &MessageView) -> String {
    match view {
        MessageView::Decrypted(message) => format!(
            "Received: {}\nSent: {}\nFrom: {}\nTo: {}\nText: {}",
            format_time(message.received),
            format_time(message.sent),
            message.from,
            message.to,
            message.text
        ),
        MessageView::Undecryptable {
            key,
            received,
            code,
        } => format!(
            "Received: {}\nMessage {} could not be decrypted, error code {}",
            format_time(*received),
            key,
            code
        ),
    }
}

/// Render a listing the way both boxes print it
pub(crate) fn format_listing(listing: &Listing, noun: &str) -> String {
    match listing {
        Listing::Cleared(count) => format!("Deleted {} messages.", count),
        Listing::Messages(messages) => {
            let mut blocks: Vec<String> = messages.iter().map(format_view).collect();
            blocks.push(format!("{} {} messages shown.", messages.len(), noun));
            blocks.join("\n\n")
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct Inbox {
    /// all | unread | clear
    #[arg(default_value = "unread", value_parser = parse_inbox_mode)]
    pub mode: InboxMode,
}

#[async_trait::async_trait]
impl Op for Inbox {
    type Error = MailboxError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (_, service) = ctx.service()?;
        let listing = service.list_inbox(self.mode)?;
        let noun = match self.mode {
            InboxMode::Unread => "unread",
            _ => "inbox",
        };
        Ok(format_listing(&listing, noun))
    }
}

#[derive(Args, Debug, Clone)]
pub struct Outbox {
    /// all | clear
    #[arg(default_value = "all", value_parser = parse_outbox_mode)]
    pub mode: OutboxMode,
}

#[async_trait::async_trait]
impl Op for Outbox {
    type Error = MailboxError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (_, service) = ctx.service()?;
        let listing = service.list_outbox(self.mode)?;
        Ok(format_listing(&listing, "outbox"))
    }
}
