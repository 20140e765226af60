//! Reasons a request chain is abandoned.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use super::ChainState;
use crate::resolver::ResolveError;

/// Terminal failure of one request chain.
///
/// These never leave the chain: they are handed to the
/// [`ChainReporter`](crate::reporter::ChainReporter) and the completion
/// callback is dropped uninvoked.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Resolution failed or produced no endpoint.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The first resolved endpoint refused or could not be reached.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint the connection targeted.
        endpoint: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The connect step completed but left no open socket.
    #[error("connection is not open")]
    NotOpen,
    /// Writing the request failed.
    #[error("failed to write request: {0}")]
    Write(#[source] io::Error),
    /// Reading the response failed.
    #[error("failed to read response: {0}")]
    Read(#[source] io::Error),
}

impl ChainError {
    /// Stage the chain was in when it failed.
    #[must_use]
    pub const fn stage(&self) -> ChainState {
        match self {
            Self::Resolve(_) => ChainState::Resolving,
            Self::Connect { .. } | Self::NotOpen => ChainState::Connecting,
            Self::Write(_) => ChainState::Writing,
            Self::Read(_) => ChainState::Reading,
        }
    }
}
