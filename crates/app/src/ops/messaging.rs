use clap::Args;
use common::prelude::MessageError;

use crate::op::{Op, OpContext};
use crate::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct EnableMessaging;

#[derive(Args, Debug, Clone)]
pub struct DisableMessaging;

#[derive(Debug, thiserror::Error)]
pub enum MessagingToggleError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Messaging(#[from] MessageError),
}

/// Flip the messaging flag through the service and persist the result
async fn set_enabled(ctx: &OpContext, enabled: bool) -> Result<String, MessagingToggleError> {
    let (mut state, service) = ctx.service()?;
    if enabled {
        service.enable()?;
    } else {
        service.disable()?;
    }

    state.config.messaging_enabled = service.is_enabled();
    state.save_config()?;

    Ok(format!(
        "Secure messaging {}.",
        if enabled { "enabled" } else { "disabled" }
    ))
}

#[async_trait::async_trait]
impl Op for EnableMessaging {
    type Error = MessagingToggleError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        set_enabled(ctx, true).await
    }
}

#[async_trait::async_trait]
impl Op for DisableMessaging {
    type Error = MessagingToggleError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        set_enabled(ctx, false).await
    }
}
