//! The request dispatcher.
//!
//! A [`Dispatcher`] owns one [`EventLoop`] and a fixed remote target. Each
//! call to [`Dispatcher::post_request`] schedules a request chain (resolve,
//! connect, write, read, deliver) and then drives the loop for at most the
//! configured fairness quota of ready work before returning, so requests
//! posted back to back make interleaved progress.

mod chain;
mod errors;

use std::cell::Cell;
use std::net::IpAddr;
use std::rc::Rc;
use std::sync::Arc;

use courier_config::{Config, DEFAULT_FAIRNESS_QUOTA};

use crate::connection::ConnectionId;
use crate::reactor::{EventLoop, ReactorError, StopHandle, WeakEventLoop};
use crate::reporter::{ChainReporter, StructuredChainReporter};
use crate::resolver::{Query, Resolver};

use self::chain::RequestChain;
pub use self::errors::ChainError;

/// Tracing target for request chain diagnostics.
pub const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Completion handler receiving the raw response, decoded lossily as UTF-8.
pub type ResponseCallback = Box<dyn FnOnce(String)>;

/// Progress of one request chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChainState {
    /// Waiting for the resolver.
    Resolving,
    /// Waiting for the connect to complete.
    Connecting,
    /// Sending the request bytes.
    Writing,
    /// Accumulating the response until the peer closes.
    Reading,
    /// The response was delivered.
    Done,
    /// The chain was abandoned after an error.
    Failed,
}

#[derive(Debug, Clone)]
struct IdentityCounter {
    next: Rc<Cell<ConnectionId>>,
}

impl IdentityCounter {
    fn new() -> Self {
        Self {
            next: Rc::new(Cell::new(ConnectionId::FIRST)),
        }
    }

    fn allocate(&self) -> ConnectionId {
        let id = self.next.get();
        self.next.set(id.successor());
        id
    }

    fn peek(&self) -> ConnectionId {
        self.next.get()
    }
}

struct ChainContext {
    event_loop: WeakEventLoop,
    resolver: Resolver,
    target: Query,
    identities: IdentityCounter,
    reporter: Arc<dyn ChainReporter>,
}

impl ChainContext {
    fn is_stopped(&self) -> bool {
        self.event_loop
            .upgrade()
            .is_none_or(|event_loop| event_loop.is_stopped())
    }
}

/// Configures and builds a [`Dispatcher`].
pub struct DispatcherBuilder {
    target: Query,
    reporter: Arc<dyn ChainReporter>,
    fairness_quota: usize,
}

impl DispatcherBuilder {
    /// Starts a builder for requests sent to `target`.
    #[must_use]
    pub fn new(target: Query) -> Self {
        Self {
            target,
            reporter: Arc::new(StructuredChainReporter::new()),
            fairness_quota: DEFAULT_FAIRNESS_QUOTA,
        }
    }

    /// Replaces the default `tracing` reporter.
    #[must_use]
    pub fn reporter<R>(mut self, reporter: R) -> Self
    where
        R: ChainReporter + 'static,
    {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Ready units of work executed after each post. Zero is raised to one.
    #[must_use]
    pub fn fairness_quota(mut self, quota: usize) -> Self {
        self.fairness_quota = quota.max(1);
        self
    }

    /// Applies the settings carried by `config`.
    #[must_use]
    pub fn config(self, config: &Config) -> Self {
        self.fairness_quota(config.fairness_quota())
    }

    /// Creates the event loop and the dispatcher that owns it.
    pub fn build(self) -> Result<Dispatcher, ReactorError> {
        let event_loop = EventLoop::new()?;
        let context = ChainContext {
            event_loop: event_loop.downgrade(),
            resolver: Resolver::new(&event_loop),
            target: self.target,
            identities: IdentityCounter::new(),
            reporter: self.reporter,
        };
        Ok(Dispatcher {
            event_loop,
            context: Rc::new(context),
            fairness_quota: self.fairness_quota,
        })
    }
}

/// Asynchronous client bound to one remote address and port.
///
/// ```no_run
/// use std::net::{IpAddr, Ipv4Addr};
///
/// use courier::dispatch::Dispatcher;
///
/// # fn main() -> Result<(), courier::reactor::ReactorError> {
/// let dispatcher = Dispatcher::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080)?;
/// dispatcher.post_with("GET / HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n", |response| {
///     println!("{response}");
/// });
/// dispatcher.run();
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher {
    event_loop: EventLoop,
    context: Rc<ChainContext>,
    fairness_quota: usize,
}

impl Dispatcher {
    /// Builds a dispatcher for `address:port` with default settings.
    pub fn new(address: IpAddr, port: u16) -> Result<Self, ReactorError> {
        Self::builder(Query::new(address, port)).build()
    }

    /// Starts a [`DispatcherBuilder`] for `target`.
    #[must_use]
    pub fn builder(target: Query) -> DispatcherBuilder {
        DispatcherBuilder::new(target)
    }

    /// Schedules a request and returns after at most the fairness quota of
    /// ready work.
    ///
    /// `request` is written verbatim. `callback`, when present, receives the
    /// whole response once the peer closes the connection. It is never
    /// invoked if any stage fails or the loop is stopped first.
    pub fn post_request(&self, request: impl Into<String>, callback: Option<ResponseCallback>) {
        let context = Rc::clone(&self.context);
        let bytes = request.into().into_bytes();
        self.event_loop
            .post(move || RequestChain::begin(context, bytes, callback));
        self.event_loop.poll_for(self.fairness_quota);
    }

    /// Schedules a request whose response is discarded.
    pub fn post(&self, request: impl Into<String>) {
        self.post_request(request, None);
    }

    /// Schedules a request whose response is handed to `callback`.
    pub fn post_with<F>(&self, request: impl Into<String>, callback: F)
    where
        F: FnOnce(String) + 'static,
    {
        self.post_request(request, Some(Box::new(callback)));
    }

    /// Drives the loop until every chain has finished or the loop is stopped.
    pub fn run(&self) -> usize {
        self.event_loop.run()
    }

    /// Runs at most one unit of work, blocking until one is ready.
    ///
    /// Returns zero once every chain has finished or the loop is stopped.
    pub fn run_one(&self) -> usize {
        self.event_loop.run_one()
    }

    /// Halts the loop, abandoning unfinished chains.
    pub fn stop(&self) {
        self.event_loop.stop();
    }

    /// Returns a [`Send`] handle that stops the loop from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.event_loop.stop_handle()
    }

    /// The loop driving every chain of this dispatcher.
    #[must_use]
    pub const fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// Fixed remote target.
    #[must_use]
    pub fn target(&self) -> Query {
        self.context.target
    }

    /// Ready units of work executed after each post.
    #[must_use]
    pub const fn fairness_quota(&self) -> usize {
        self.fairness_quota
    }

    /// Identity the next created connection will receive.
    #[must_use]
    pub fn next_connection_id(&self) -> ConnectionId {
        self.context.identities.peek()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Dispatcher")
            .field("target", &self.context.target)
            .field("fairness_quota", &self.fairness_quota)
            .field("next_connection_id", &self.next_connection_id())
            .field("event_loop", &self.event_loop)
            .finish_non_exhaustive()
    }
}
