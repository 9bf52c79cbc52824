use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown network `{0}`")]
    UnknownNetwork(String),
    #[error("network `{0}` has no randomness coordinator configured")]
    MissingCoordinator(String),
    #[error("network `{network}`: {reason}")]
    InvalidConfig {
        network: String,
        reason: &'static str,
    },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed network table: {0}")]
    Json(#[from] serde_json::Error),
}
