//! Error taxonomy for the connectivity subsystem

use devlink_shared::codec::CodecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectivityError {
    /// Start was called without a usable credential
    #[error("No device credential available")]
    NoCredential,

    /// Network-level failure; counted as a failed heartbeat
    #[error("Transport I/O error: {0}")]
    TransportIo(String),

    /// Server replied with a non-success status
    #[error("Server returned HTTP {0}")]
    HttpStatus(u16),

    /// Malformed payload from the server
    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),
}

impl From<reqwest::Error> for ConnectivityError {
    fn from(e: reqwest::Error) -> Self {
        ConnectivityError::TransportIo(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConnectivityError>;
