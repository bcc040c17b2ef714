pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "smsg")]
#[command(about = "Encrypted store-and-forward messaging", version)]
pub struct Args {
    /// Path to the smsg state directory (defaults to ~/.smsg)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
