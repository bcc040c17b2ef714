use clap::{Args, Subcommand};

pub mod list;
pub mod set;

use crate::op::Op;

crate::command_enum! {
    (List, list::List),
    (Set, set::Set),
}

pub type OptionsCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Options {
    #[command(subcommand)]
    pub command: OptionsCommand,
}

#[async_trait::async_trait]
impl Op for Options {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}

/// Render options one per line, as `name = value`
pub(crate) fn format_options(options: &[(&str, bool)]) -> String {
    options
        .iter()
        .map(|(name, value)| format!("{} = {}", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}
