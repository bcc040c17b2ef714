use std::fmt;

/// Build metadata baked in by `build.rs`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub repo_version: &'static str,
    pub build_profile: &'static str,
    pub build_timestamp: &'static str,
    pub rust_version: &'static str,
    pub build_target: &'static str,
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        repo_version: env!("REPO_VERSION"),
        build_profile: env!("BUILD_PROFILE"),
        build_timestamp: env!("BUILD_TIMESTAMP"),
        rust_version: env!("RUST_VERSION"),
        build_target: env!("BUILD_TARGET"),
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "smsg {} ({})\n\
             - Profile: {}\n\
             - Built: {}\n\
             - Rust: {}\n\
             - Target: {}",
            self.version,
            self.repo_version,
            self.build_profile,
            self.build_timestamp,
            self.rust_version,
            self.build_target
        )
    }
}

/// Log the build metadata once at startup
pub fn report_build_info() {
    let build = build_info();

    tracing::debug!(
        build_profile = build.build_profile,
        version = build.version,
        repo_version = build.repo_version,
        "smsg starting up"
    );
}
