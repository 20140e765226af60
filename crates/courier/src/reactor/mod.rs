//! Single-threaded reactor driving every request chain.
//!
//! The loop owns a [`mio::Poll`] instance, a FIFO of posted work and a table
//! of continuations parked until their socket becomes ready. Handlers never
//! run concurrently: whichever thread calls [`EventLoop::run`],
//! [`EventLoop::run_one`] or [`EventLoop::poll_for`] executes them one at a
//! time.

mod errors;
mod event_loop;
mod guard;

pub use self::errors::ReactorError;
pub use self::event_loop::{EventLoop, LoopState, WeakEventLoop};
pub use self::guard::{StopHandle, WorkGuard};

const REACTOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::reactor");
