use clap::Args;
use common::prelude::{MessageError, ReceiveOutcome, Sender};
use common::service::SentMessage;

use crate::op::{Op, OpContext};
use crate::state::StateError;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Messaging(#[from] MessageError),
}

fn format_sent(sent: &SentMessage) -> String {
    format!(
        "Sent message {}\n{}",
        sent.key,
        hex::encode(&sent.payload)
    )
}

#[derive(Args, Debug, Clone)]
pub struct SendMessage {
    /// Sending address from the wallet, or "anon"
    pub from: String,

    pub to: String,

    pub text: String,
}

#[async_trait::async_trait]
impl Op for SendMessage {
    type Error = SendError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (_, service) = ctx.service()?;
        let sent = service.send(Sender::parse(&self.from), &self.to, &self.text)?;
        Ok(format_sent(&sent))
    }
}

#[derive(Args, Debug, Clone)]
pub struct SendAnon {
    pub to: String,

    pub text: String,
}

#[async_trait::async_trait]
impl Op for SendAnon {
    type Error = SendError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (_, service) = ctx.service()?;
        let sent = service.send(Sender::Anonymous, &self.to, &self.text)?;
        Ok(format_sent(&sent))
    }
}

#[derive(Args, Debug, Clone)]
pub struct Receive {
    /// Hex encoded payload, as printed by send
    pub payload: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Messaging(#[from] MessageError),
    #[error("payload is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

#[async_trait::async_trait]
impl Op for Receive {
    type Error = ReceiveError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let payload = hex::decode(self.payload.trim())?;
        let (_, service) = ctx.service()?;

        Ok(match service.receive(&payload)? {
            ReceiveOutcome::Stored(key) => format!("Stored message {}", key),
            ReceiveOutcome::Duplicate(key) => format!("Already have message {}", key),
            ReceiveOutcome::NotForUs => {
                "Message is not addressed to any receiving address.".to_string()
            }
        })
    }
}
