use clap::Args;
use common::prelude::MessageError;

use crate::op::{Op, OpContext};
use crate::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Set {
    /// Option name, e.g. newAddressRecv or newAddressAnon
    pub name: String,

    #[arg(action = clap::ArgAction::Set)]
    pub value: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SetOptionError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Messaging(#[from] MessageError),
}

#[async_trait::async_trait]
impl Op for Set {
    type Error = SetOptionError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (mut state, service) = ctx.service()?;
        let options = service.set_option(&self.name, self.value)?;

        state.config.options = options;
        state.save_config()?;

        Ok(super::format_options(&options.list()))
    }
}
