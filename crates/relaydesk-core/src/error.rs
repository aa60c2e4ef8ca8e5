//! Error type shared by the relay crates

use crate::types::ClientId;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The socket behind a registered connection went away mid-send.
    #[error("connection to client {0} is closed")]
    ConnectionClosed(ClientId),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
