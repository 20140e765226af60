//! BDD test world: owns the peer, dispatcher, reporter and delivered
//! responses for the dispatch scenarios.

use std::cell::RefCell;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::dispatch::Dispatcher;
use crate::http::{HttpRequest, Method};
use crate::resolver::Query;

use super::peer::{SilentPeer, TestPeer, unused_port};
use super::reporter::{ChainEvent, RecordingChainReporter};

const POLL_ATTEMPTS: usize = 2_000;
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    pub reporter: Arc<RecordingChainReporter>,
    pub responses: Rc<RefCell<Vec<String>>>,
    dispatcher: Option<Dispatcher>,
    peer: Option<TestPeer>,
    silent_peer: Option<SilentPeer>,
    target: Option<SocketAddr>,
    pub peer_requests: Vec<String>,
}

impl TestWorld {
    /// Builds an empty world.
    pub fn new() -> Self {
        Self {
            reporter: Arc::new(RecordingChainReporter::default()),
            responses: Rc::new(RefCell::new(Vec::new())),
            dispatcher: None,
            peer: None,
            silent_peer: None,
            target: None,
            peer_requests: Vec::new(),
        }
    }

    /// Starts a peer answering `connections` requests with `reply`.
    pub fn start_peer(&mut self, reply: &str, connections: usize) {
        let peer = TestPeer::replying(reply, connections);
        self.target = Some(peer.address());
        self.peer = Some(peer);
    }

    /// Starts a peer that never answers.
    pub fn start_silent_peer(&mut self) {
        let peer = SilentPeer::spawn();
        self.target = Some(peer.address());
        self.silent_peer = Some(peer);
    }

    /// Points the world at a port without a listener.
    pub fn target_unused_port(&mut self) {
        self.target = Some(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            unused_port(),
        ));
    }

    /// Builds the dispatcher for the current target.
    pub fn build_dispatcher(&mut self, fairness_quota: usize) {
        let target = self.target.expect("a target must be chosen first");
        let dispatcher = Dispatcher::builder(Query::new(target.ip(), target.port()))
            .reporter(Arc::clone(&self.reporter))
            .fairness_quota(fairness_quota)
            .build()
            .expect("build dispatcher");
        self.dispatcher = Some(dispatcher);
    }

    /// The dispatcher under test.
    pub fn dispatcher(&self) -> &Dispatcher {
        self.dispatcher.as_ref().expect("dispatcher not built")
    }

    /// Renders a GET request for `path` against the current target.
    pub fn request_for(&self, path: &str) -> String {
        let target = self.target.expect("a target must be chosen first");
        HttpRequest::for_target(Method::Get, target.ip(), target.port(), path).to_wire()
    }

    /// Posts a GET for `path` whose response is recorded.
    pub fn post_with_callback(&self, path: &str) {
        let sink = Rc::clone(&self.responses);
        self.dispatcher()
            .post_with(self.request_for(path), move |response| {
                sink.borrow_mut().push(response);
            });
    }

    /// Posts a GET for `path` without a callback.
    pub fn post_without_callback(&self, path: &str) {
        self.dispatcher().post(self.request_for(path));
    }

    /// Drives the loop until it runs out of work.
    pub fn run(&self) -> usize {
        self.dispatcher().run()
    }

    /// Polls without blocking until `event` is recorded.
    pub fn poll_until(&self, event: &ChainEvent) {
        for _ in 0..POLL_ATTEMPTS {
            if self.reporter.events().contains(event) {
                return;
            }
            self.dispatcher().event_loop().poll_one();
            thread::sleep(POLL_INTERVAL);
        }
        panic!("event {event:?} never recorded: {:?}", self.reporter.events());
    }

    /// Joins every peer and records the requests they saw.
    pub fn finish_peers(&mut self) {
        if let Some(peer) = self.peer.take() {
            self.peer_requests.extend(peer.requests());
        }
        if let Some(peer) = self.silent_peer.take() {
            self.peer_requests.push(peer.release());
        }
    }

    /// Number of delivered responses.
    pub fn delivered(&self) -> usize {
        self.responses.borrow().len()
    }
}

/// Fixture constructing a fresh [`TestWorld`].
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
