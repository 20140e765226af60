//! Single-threaded asynchronous TCP request dispatcher.
//!
//! A [`Dispatcher`] accepts opaque textual requests for one fixed remote
//! endpoint. Each request runs as its own chain on a single-threaded
//! [`EventLoop`]: the IP literal target is resolved, a fresh
//! [`Connection`] is opened, the request is written verbatim and the
//! response is read until the peer closes. The caller's completion callback
//! then receives the payload. Failures end the chain quietly and are only
//! observable through the [`ChainReporter`].
//!
//! The [`http`] module offers optional request construction and response
//! parsing for callers speaking HTTP/1.1 over the dispatcher.

pub mod connection;
pub mod dispatch;
pub mod http;
pub mod reactor;
pub mod reporter;
pub mod resolver;
pub mod telemetry;


pub use connection::{Connection, ConnectionId};
pub use dispatch::{ChainError, ChainState, Dispatcher, DispatcherBuilder, ResponseCallback};
pub use reactor::{EventLoop, LoopState, StopHandle, WorkGuard};
pub use reporter::{ChainReporter, StructuredChainReporter};
pub use resolver::{AddressFamily, Query, ResolveError, Resolver};
