//! The event loop proper.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Interest, Poll, Registry, Token, Waker};
use tracing::{trace, warn};

use super::guard::{StopHandle, StopSignal, WorkGuard};
use super::{REACTOR_TARGET, ReactorError};

const WAKE_TOKEN: Token = Token(usize::MAX);
const EVENT_CAPACITY: usize = 256;

type Work = Box<dyn FnOnce()>;

/// Observable lifecycle of an [`EventLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LoopState {
    /// Neither driving the loop nor executing a handler.
    Idle,
    /// `run`/`run_one` is driving the loop, including while it waits for
    /// readiness, or a handler is executing.
    Running,
    /// `stop` was observed; nothing will execute again.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    Block,
    Never,
}

struct Shared {
    poll: RefCell<Poll>,
    events: RefCell<Events>,
    registry: Registry,
    ready: RefCell<VecDeque<Work>>,
    parked: RefCell<HashMap<Token, Work>>,
    next_token: Cell<usize>,
    guards: Cell<usize>,
    depth: Cell<usize>,
    signal: Arc<StopSignal>,
}

/// Cloneable, single-threaded handle to a reactor.
///
/// Clones share the same queues. Handlers stored inside the loop must only
/// hold a [`WeakEventLoop`], otherwise the loop keeps itself alive.
#[derive(Clone)]
pub struct EventLoop {
    shared: Rc<Shared>,
}

/// Non-owning handle used by handlers parked inside the loop.
#[derive(Clone, Default)]
pub struct WeakEventLoop {
    shared: Weak<Shared>,
}

impl WeakEventLoop {
    /// Upgrades to a strong handle while the loop is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<EventLoop> {
        self.shared.upgrade().map(|shared| EventLoop { shared })
    }
}

impl fmt::Debug for WeakEventLoop {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WeakEventLoop")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("EventLoop")
            .field("state", &self.state())
            .field("ready", &self.shared.ready.borrow().len())
            .field("parked", &self.shared.parked.borrow().len())
            .field("guards", &self.shared.guards.get())
            .finish()
    }
}

impl EventLoop {
    /// Creates an idle loop with an empty queue.
    pub fn new() -> Result<Self, ReactorError> {
        let poll = Poll::new().map_err(|source| ReactorError::Selector { source })?;
        let registry = poll
            .registry()
            .try_clone()
            .map_err(|source| ReactorError::Selector { source })?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN)
            .map_err(|source| ReactorError::Waker { source })?;
        Ok(Self {
            shared: Rc::new(Shared {
                poll: RefCell::new(poll),
                events: RefCell::new(Events::with_capacity(EVENT_CAPACITY)),
                registry,
                ready: RefCell::new(VecDeque::new()),
                parked: RefCell::new(HashMap::new()),
                next_token: Cell::new(0),
                guards: Cell::new(0),
                depth: Cell::new(0),
                signal: Arc::new(StopSignal::new(waker)),
            }),
        })
    }

    /// Returns a handle that does not keep the loop alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakEventLoop {
        WeakEventLoop {
            shared: Rc::downgrade(&self.shared),
        }
    }

    /// Enqueues `work` behind everything already posted.
    ///
    /// Work posted after [`EventLoop::stop`] is dropped without running.
    pub fn post<F>(&self, work: F)
    where
        F: FnOnce() + 'static,
    {
        if self.is_stopped() {
            trace!(target: REACTOR_TARGET, "discarding work posted after stop");
            return;
        }
        self.shared.ready.borrow_mut().push_back(Box::new(work));
    }

    /// Runs handlers until the loop runs out of work or is stopped.
    ///
    /// Blocks the calling thread while continuations wait for I/O. Returns the
    /// number of handlers executed.
    pub fn run(&self) -> usize {
        let _scope = RunningScope::enter(&self.shared.depth);
        let mut executed = 0;
        while self.execute_one(Wait::Block) {
            executed += 1;
        }
        executed
    }

    /// Runs at most one handler, blocking until one is ready.
    ///
    /// Returns zero when the loop is stopped or has no outstanding work.
    pub fn run_one(&self) -> usize {
        let _scope = RunningScope::enter(&self.shared.depth);
        usize::from(self.execute_one(Wait::Block))
    }

    /// Runs at most `quota` handlers that are ready now, never blocking.
    ///
    /// This is the fairness valve used after each posted request: callers get
    /// control back after a bounded amount of work even while other chains
    /// still have I/O outstanding.
    pub fn poll_for(&self, quota: usize) -> usize {
        let mut executed = 0;
        while executed < quota && self.execute_one(Wait::Never) {
            executed += 1;
        }
        executed
    }

    /// Runs at most one ready handler without blocking.
    pub fn poll_one(&self) -> usize {
        self.poll_for(1)
    }

    /// Halts the loop. Queued and parked handlers are abandoned.
    pub fn stop(&self) {
        self.shared.signal.stop();
    }

    /// Returns a [`Send`] handle that can stop the loop from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(Arc::clone(&self.shared.signal))
    }

    /// Returns true once a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.signal.is_stopped()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        if self.is_stopped() {
            LoopState::Stopped
        } else if self.shared.depth.get() > 0 {
            LoopState::Running
        } else {
            LoopState::Idle
        }
    }

    /// Keeps [`EventLoop::run`] from returning while no work is outstanding.
    pub fn work_guard(&self) -> WorkGuard {
        self.shared.guards.set(self.shared.guards.get() + 1);
        WorkGuard::new(self.downgrade())
    }

    /// Returns true while handlers are queued, parked on I/O, or guarded.
    #[must_use]
    pub fn has_work(&self) -> bool {
        self.has_ready() || self.has_parked() || self.shared.guards.get() > 0
    }

    /// Registers an I/O source for readiness notifications.
    pub fn register<S>(&self, source: &mut S, interest: Interest) -> io::Result<Token>
    where
        S: Source + ?Sized,
    {
        let token = Token(self.shared.next_token.get());
        self.shared.next_token.set(token.0 + 1);
        self.shared.registry.register(source, token, interest)?;
        Ok(token)
    }

    /// Removes an I/O source and discards any continuation parked on it.
    pub fn deregister<S>(&self, source: &mut S, token: Token) -> io::Result<()>
    where
        S: Source + ?Sized,
    {
        let stale = self.shared.parked.borrow_mut().remove(&token);
        drop(stale);
        self.shared.registry.deregister(source)
    }

    /// Parks `work` until the source registered under `token` reports readiness.
    ///
    /// A parked continuation counts as outstanding work: `run` keeps waiting
    /// for it.
    pub fn await_ready<F>(&self, token: Token, work: F)
    where
        F: FnOnce() + 'static,
    {
        if self.is_stopped() {
            return;
        }
        let replaced = self.shared.parked.borrow_mut().insert(token, Box::new(work));
        drop(replaced);
    }

    pub(super) fn release_guard(&self) {
        let guards = self.shared.guards.get();
        self.shared.guards.set(guards.saturating_sub(1));
    }

    fn has_ready(&self) -> bool {
        !self.shared.ready.borrow().is_empty()
    }

    fn has_parked(&self) -> bool {
        !self.shared.parked.borrow().is_empty()
    }

    fn execute_one(&self, wait: Wait) -> bool {
        loop {
            if self.is_stopped() {
                return false;
            }
            let next = self.shared.ready.borrow_mut().pop_front();
            if let Some(work) = next {
                self.execute(work);
                return true;
            }
            if !self.has_work() {
                return false;
            }
            let timeout = match wait {
                Wait::Block => None,
                Wait::Never => Some(Duration::ZERO),
            };
            if let Err(error) = self.dispatch_readiness(timeout) {
                warn!(
                    target: REACTOR_TARGET,
                    error = %error,
                    "readiness poll failed"
                );
                return false;
            }
            if wait == Wait::Never && !self.has_ready() {
                return false;
            }
        }
    }

    fn execute(&self, work: Work) {
        let _scope = RunningScope::enter(&self.shared.depth);
        work();
    }

    fn dispatch_readiness(&self, timeout: Option<Duration>) -> io::Result<()> {
        let woken: Vec<Token> = {
            let mut events = self.shared.events.borrow_mut();
            match self.shared.poll.borrow_mut().poll(&mut events, timeout) {
                Ok(()) => {}
                Err(error) if error.kind() == io::ErrorKind::Interrupted => return Ok(()),
                Err(error) => return Err(error),
            }
            events
                .iter()
                .map(mio::event::Event::token)
                .filter(|token| *token != WAKE_TOKEN)
                .collect()
        };
        for token in woken {
            let resumed = self.shared.parked.borrow_mut().remove(&token);
            if let Some(work) = resumed {
                self.shared.ready.borrow_mut().push_back(work);
            }
        }
        Ok(())
    }
}

struct RunningScope<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> RunningScope<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for RunningScope<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}
