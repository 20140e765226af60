//! Test double for [`ChainReporter`] that records chain progress.

use std::net::SocketAddr;
use std::sync::Mutex;

use crate::connection::ConnectionId;
use crate::dispatch::{ChainError, ChainState};
use crate::reporter::ChainReporter;

/// Structured chain events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// A connection was allocated.
    Created(ConnectionId),
    /// The first endpoint was chosen.
    Resolved(ConnectionId, SocketAddr),
    /// The request started going out.
    Writing(ConnectionId, usize),
    /// The response started coming in.
    Reading(ConnectionId),
    /// The response was delivered.
    Delivered(ConnectionId, usize),
    /// The chain was abandoned.
    Failed {
        /// Chain identity.
        id: ConnectionId,
        /// Stage that failed.
        stage: ChainState,
        /// Rendered error.
        message: String,
    },
}

impl ChainEvent {
    /// Identity of the chain that emitted the event.
    pub const fn id(&self) -> ConnectionId {
        match self {
            Self::Created(id)
            | Self::Resolved(id, _)
            | Self::Writing(id, _)
            | Self::Reading(id)
            | Self::Delivered(id, _)
            | Self::Failed { id, .. } => *id,
        }
    }
}

/// Records chain events for assertions.
#[derive(Debug, Default)]
pub struct RecordingChainReporter {
    events: Mutex<Vec<ChainEvent>>,
}

impl RecordingChainReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<ChainEvent> {
        self.events
            .lock()
            .expect("chain reporter mutex poisoned")
            .clone()
    }

    /// Events emitted by one chain, in order.
    pub fn events_for(&self, id: ConnectionId) -> Vec<ChainEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.id() == id)
            .collect()
    }

    /// Identities in the order their connections were created.
    pub fn created(&self) -> Vec<ConnectionId> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ChainEvent::Created(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Failures recorded so far.
    pub fn failures(&self) -> Vec<ChainEvent> {
        self.events()
            .into_iter()
            .filter(|event| matches!(event, ChainEvent::Failed { .. }))
            .collect()
    }

    fn record(&self, event: ChainEvent) {
        self.events
            .lock()
            .expect("chain reporter mutex poisoned")
            .push(event);
    }
}

impl ChainReporter for RecordingChainReporter {
    fn connection_created(&self, id: ConnectionId, _target: SocketAddr) {
        self.record(ChainEvent::Created(id));
    }

    fn endpoint_resolved(&self, id: ConnectionId, endpoint: SocketAddr) {
        self.record(ChainEvent::Resolved(id, endpoint));
    }

    fn request_writing(&self, id: ConnectionId, bytes: usize) {
        self.record(ChainEvent::Writing(id, bytes));
    }

    fn response_reading(&self, id: ConnectionId) {
        self.record(ChainEvent::Reading(id));
    }

    fn response_delivered(&self, id: ConnectionId, bytes: usize) {
        self.record(ChainEvent::Delivered(id, bytes));
    }

    fn chain_failed(&self, id: ConnectionId, error: &ChainError) {
        self.record(ChainEvent::Failed {
            id,
            stage: error.stage(),
            message: error.to_string(),
        });
    }
}
