mod args;
mod logging;
mod op;
mod ops;
mod state;
mod version;

use args::Args;
use clap::{Parser, Subcommand};
use op::Op;
use ops::{
    AddKey, Buckets, DisableMessaging, EnableMessaging, GetPubkey, Inbox, Init, LocalKeys,
    NewAddress, Options, Outbox, Receive, ScanBuckets, SendAnon, SendMessage, ToggleAnon,
    ToggleReceive, Version,
};

command_enum! {
    (Init, Init),
    (Version, Version),
    (EnableMessaging, EnableMessaging),
    (DisableMessaging, DisableMessaging),
    (Options, Options),
    (LocalKeys, LocalKeys),
    (ToggleReceive, ToggleReceive),
    (ToggleAnon, ToggleAnon),
    (NewAddress, NewAddress),
    (AddKey, AddKey),
    (GetPubkey, GetPubkey),
    (Send, SendMessage),
    (SendAnon, SendAnon),
    (Receive, Receive),
    (Inbox, Inbox),
    (Outbox, Outbox),
    (Buckets, Buckets),
    (ScanBuckets, ScanBuckets),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let ctx = op::OpContext::new(args.config_path);

    // Before init there is no config yet; fall back to defaults
    let config = ctx.state().map(|state| state.config).unwrap_or_default();
    let guards = logging::init_logging(config.tracing_level(), config.log_dir.as_deref());
    version::report_build_info();

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            tracing::debug!("command failed: {:?}", e);
            eprintln!("Error: {}", e);
            1
        }
    };

    // flush the non-blocking log writers before exiting
    drop(guards);
    std::process::exit(code);
}
