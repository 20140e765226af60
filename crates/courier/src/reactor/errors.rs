//! Error types for reactor construction.

use std::io;

use thiserror::Error;

/// Errors raised while creating an [`EventLoop`](super::EventLoop).
#[derive(Debug, Error)]
pub enum ReactorError {
    /// The operating system refused to create the readiness selector.
    #[error("failed to create readiness selector: {source}")]
    Selector {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The cross-thread wake-up channel could not be registered.
    #[error("failed to register loop waker: {source}")]
    Waker {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}
