// Top-level error of a hook run and the exit codes it maps to. The
// recording pipeline only looks at the exit status, so every failure
// class gets its own code.

use crate::api::ApiError;
use std::path::PathBuf;
use std::process::ExitCode;

// 0 is success, 2 is left to clap for option parsing errors.
pub const EXIT_CONFIG: u8 = 3;
pub const EXIT_METADATA: u8 = 4;
pub const EXIT_CONNECT: u8 = 5;
pub const EXIT_TIMEOUT: u8 = 6;
pub const EXIT_TRANSPORT: u8 = 7;
pub const EXIT_REJECTED: u8 = 8;

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("configuration error: {0:#}")]
    Config(anyhow::Error),

    #[error("failed to read metadata file {}: {source}", .path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl HookError {
    pub fn exit_code(&self) -> u8 {
        match self {
            HookError::Config(_) => EXIT_CONFIG,
            HookError::Metadata { .. } => EXIT_METADATA,
            HookError::Api(err) => match err {
                ApiError::InvalidToken | ApiError::InvalidUrl { .. } | ApiError::Client(_) => {
                    EXIT_CONFIG
                }
                ApiError::Connect(_) => EXIT_CONNECT,
                ApiError::Timeout(_) => EXIT_TIMEOUT,
                ApiError::Transport(_) => EXIT_TRANSPORT,
                ApiError::Unauthorized { .. } | ApiError::NotFound | ApiError::Rejected { .. } => {
                    EXIT_REJECTED
                }
            },
        }
    }
}

impl From<&HookError> for ExitCode {
    fn from(err: &HookError) -> Self {
        ExitCode::from(err.exit_code())
    }
}
