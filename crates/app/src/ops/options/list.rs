use clap::Args;

use crate::op::{Op, OpContext};
use crate::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct List;

#[async_trait::async_trait]
impl Op for List {
    type Error = StateError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        Ok(super::format_options(&state.config.options.list()))
    }
}
