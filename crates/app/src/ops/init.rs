use clap::Args;

use crate::state::{AppConfig, AppState};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Turn secure messaging on right away
    #[arg(long)]
    pub enable: bool,

    /// Default log level (overridable with RUST_LOG)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Bucket window in seconds
    #[arg(long, default_value_t = common::bucket::DEFAULT_BUCKET_WINDOW_SECS)]
    pub bucket_window: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
    #[error("bucket window must be positive, got {0}")]
    InvalidWindow(i64),
}

#[async_trait::async_trait]
impl crate::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        if self.bucket_window <= 0 {
            return Err(InitError::InvalidWindow(self.bucket_window));
        }
        let config = AppConfig {
            messaging_enabled: self.enable,
            log_level: self.log_level.clone(),
            bucket_window_secs: self.bucket_window,
            ..AppConfig::default()
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;
        let node_address = common::crypto::Address::from_public_key(&state.load_key()?.public());

        let output = format!(
            "Initialized smsg directory at: {}\n\
             - Key: {}\n\
             - Node address: {}\n\
             - Addresses: {}\n\
             - Database: {}\n\
             - Buckets: {}\n\
             - Config: {}\n\
             - Messaging: {}",
            state.smsg_dir.display(),
            state.key_path.display(),
            node_address,
            state.directory_path.display(),
            state.store_path.display(),
            state.bucket_dir.display(),
            state.config_path.display(),
            if state.config.messaging_enabled {
                "enabled"
            } else {
                "disabled"
            }
        );

        Ok(output)
    }
}
