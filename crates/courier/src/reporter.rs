//! Structured diagnostics for request chains.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::connection::ConnectionId;
use crate::dispatch::{ChainError, DISPATCH_TARGET};

/// Observer notified as each request chain progresses.
///
/// Every hook is keyed by the chain's connection identity. Hooks run on the
/// thread driving the event loop and must not block.
pub trait ChainReporter: Send + Sync {
    /// A connection was allocated and resolution of `target` is starting.
    fn connection_created(&self, id: ConnectionId, target: SocketAddr);

    /// Resolution produced `endpoint`, which is about to be connected.
    fn endpoint_resolved(&self, id: ConnectionId, endpoint: SocketAddr);

    /// The connection is open and `bytes` of request are being written.
    fn request_writing(&self, id: ConnectionId, bytes: usize);

    /// The request was written and the response is being read.
    fn response_reading(&self, id: ConnectionId);

    /// The response was read in full and handed to the caller.
    fn response_delivered(&self, id: ConnectionId, bytes: usize);

    /// The chain was abandoned.
    fn chain_failed(&self, id: ConnectionId, error: &ChainError);
}

impl<T> ChainReporter for Arc<T>
where
    T: ChainReporter + ?Sized,
{
    fn connection_created(&self, id: ConnectionId, target: SocketAddr) {
        (**self).connection_created(id, target);
    }

    fn endpoint_resolved(&self, id: ConnectionId, endpoint: SocketAddr) {
        (**self).endpoint_resolved(id, endpoint);
    }

    fn request_writing(&self, id: ConnectionId, bytes: usize) {
        (**self).request_writing(id, bytes);
    }

    fn response_reading(&self, id: ConnectionId) {
        (**self).response_reading(id);
    }

    fn response_delivered(&self, id: ConnectionId, bytes: usize) {
        (**self).response_delivered(id, bytes);
    }

    fn chain_failed(&self, id: ConnectionId, error: &ChainError) {
        (**self).chain_failed(id, error);
    }
}

/// Default reporter that records chain progress using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredChainReporter;

impl StructuredChainReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ChainReporter for StructuredChainReporter {
    fn connection_created(&self, id: ConnectionId, target: SocketAddr) {
        tracing::info!(
            target: DISPATCH_TARGET,
            event = "connection_created",
            connection_id = %id,
            target_endpoint = %target,
            "created connection"
        );
    }

    fn endpoint_resolved(&self, id: ConnectionId, endpoint: SocketAddr) {
        tracing::debug!(
            target: DISPATCH_TARGET,
            event = "endpoint_resolved",
            connection_id = %id,
            endpoint = %endpoint,
            "resolved endpoint"
        );
    }

    fn request_writing(&self, id: ConnectionId, bytes: usize) {
        tracing::debug!(
            target: DISPATCH_TARGET,
            event = "request_writing",
            connection_id = %id,
            bytes,
            "writing request"
        );
    }

    fn response_reading(&self, id: ConnectionId) {
        tracing::debug!(
            target: DISPATCH_TARGET,
            event = "response_reading",
            connection_id = %id,
            "reading response"
        );
    }

    fn response_delivered(&self, id: ConnectionId, bytes: usize) {
        tracing::info!(
            target: DISPATCH_TARGET,
            event = "response_delivered",
            connection_id = %id,
            bytes,
            "response delivered"
        );
    }

    fn chain_failed(&self, id: ConnectionId, error: &ChainError) {
        tracing::error!(
            target: DISPATCH_TARGET,
            event = "chain_failed",
            connection_id = %id,
            stage = %error.stage(),
            error = %error,
            "request chain abandoned"
        );
    }
}
