//! Handles that influence the loop's lifetime from outside a handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mio::Waker;
use tracing::{debug, warn};

use super::REACTOR_TARGET;
use super::event_loop::WeakEventLoop;

/// Shared halt flag plus the waker that interrupts a blocked poll.
#[derive(Debug)]
pub(super) struct StopSignal {
    stopped: AtomicBool,
    waker: Waker,
}

impl StopSignal {
    pub(super) const fn new(waker: Waker) -> Self {
        Self {
            stopped: AtomicBool::new(false),
            waker,
        }
    }

    pub(super) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(super) fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(target: REACTOR_TARGET, "event loop stop requested");
        if let Err(error) = self.waker.wake() {
            warn!(
                target: REACTOR_TARGET,
                error = %error,
                "failed to wake blocked event loop"
            );
        }
    }
}

/// Thread-safe handle that halts an [`EventLoop`](super::EventLoop).
///
/// This is the only loop handle that may cross threads. Stopping is terminal:
/// handlers still queued or parked on I/O are abandoned.
#[derive(Debug, Clone)]
pub struct StopHandle {
    signal: Arc<StopSignal>,
}

impl StopHandle {
    pub(super) const fn new(signal: Arc<StopSignal>) -> Self {
        Self { signal }
    }

    /// Requests the loop to halt and wakes it if it is blocked waiting for I/O.
    pub fn stop(&self) {
        self.signal.stop();
    }

    /// Returns true once a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.signal.is_stopped()
    }
}

/// Keeps [`EventLoop::run`](super::EventLoop::run) alive while no work is pending.
///
/// Without a guard `run` returns as soon as the ready queue is empty and no
/// continuation waits on I/O. Dropping the guard, or calling
/// [`WorkGuard::reset`], releases it.
#[derive(Debug)]
#[must_use = "the loop is only kept alive while the guard exists"]
pub struct WorkGuard {
    event_loop: Option<WeakEventLoop>,
}

impl WorkGuard {
    pub(super) const fn new(event_loop: WeakEventLoop) -> Self {
        Self {
            event_loop: Some(event_loop),
        }
    }

    /// Releases the guard early. Further calls do nothing.
    pub fn reset(&mut self) {
        if let Some(event_loop) = self.event_loop.take().and_then(|weak| weak.upgrade()) {
            event_loop.release_guard();
        }
    }

    /// Returns true while the guard still holds the loop open.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.event_loop.is_some()
    }
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        self.reset();
    }
}
