//! The per-request continuation.
//!
//! A chain is boxed and moved from one unit of loop work to the next. Each
//! stage either advances synchronously, parks the box on its socket, or
//! reaches a terminal state where the connection is closed exactly once.

use std::net::SocketAddr;
use std::rc::Rc;
use std::task::Poll;

use crate::connection::{Connection, ConnectionId, is_end_of_stream};
use crate::resolver::{Endpoints, ResolveError};

use super::{ChainContext, ChainError, ChainState, ResponseCallback};

enum Step {
    Advance,
    Suspend,
    Deliver,
    Fail(ChainError),
    Halt,
}

pub(super) struct RequestChain {
    context: Rc<ChainContext>,
    connection: Connection,
    endpoint: SocketAddr,
    request: Vec<u8>,
    written: usize,
    response: Vec<u8>,
    callback: Option<ResponseCallback>,
    state: ChainState,
}

impl RequestChain {
    /// Allocates the connection and starts resolving the target.
    pub(super) fn begin(
        context: Rc<ChainContext>,
        request: Vec<u8>,
        callback: Option<ResponseCallback>,
    ) {
        let id = context.identities.allocate();
        let connection = Connection::new(id, context.event_loop.clone());
        let target = context.target;
        context.reporter.connection_created(id, target.socket_addr());
        let resolver = context.resolver.clone();
        let chain = Box::new(Self {
            context,
            connection,
            endpoint: target.socket_addr(),
            request,
            written: 0,
            response: Vec::new(),
            callback,
            state: ChainState::Resolving,
        });
        resolver.async_resolve(target, move |outcome| chain.on_resolved(outcome));
    }

    const fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    fn on_resolved(mut self: Box<Self>, outcome: Result<Endpoints, ResolveError>) {
        let first = match outcome {
            Ok(mut endpoints) => endpoints.next(),
            Err(error) => return self.fail(error.into()),
        };
        let Some(endpoint) = first else {
            let target = self.context.target;
            return self.fail(
                ResolveError::NoEndpoints {
                    query: target,
                    family: target.family(),
                }
                .into(),
            );
        };
        self.endpoint = endpoint;
        self.context.reporter.endpoint_resolved(self.id(), endpoint);
        if let Err(source) = self.connection.start(endpoint) {
            return self.fail(ChainError::Connect { endpoint, source });
        }
        self.state = ChainState::Connecting;
        self.resume();
    }

    fn resume(mut self: Box<Self>) {
        loop {
            if self.context.is_stopped() {
                return;
            }
            match self.step() {
                Step::Advance => {}
                Step::Suspend => return self.suspend(),
                Step::Deliver => return self.deliver(),
                Step::Fail(error) => return self.fail(error),
                Step::Halt => return,
            }
        }
    }

    fn step(&mut self) -> Step {
        match self.state {
            ChainState::Connecting => self.step_connect(),
            ChainState::Writing => self.step_write(),
            ChainState::Reading => self.step_read(),
            ChainState::Resolving | ChainState::Done | ChainState::Failed => Step::Halt,
        }
    }

    fn step_connect(&mut self) -> Step {
        match self.connection.poll_connected() {
            Poll::Pending => Step::Suspend,
            Poll::Ready(Err(source)) => Step::Fail(ChainError::Connect {
                endpoint: self.endpoint,
                source,
            }),
            Poll::Ready(Ok(_)) if !self.connection.is_open() => Step::Fail(ChainError::NotOpen),
            Poll::Ready(Ok(_)) => {
                self.context
                    .reporter
                    .request_writing(self.id(), self.request.len());
                self.state = ChainState::Writing;
                Step::Advance
            }
        }
    }

    fn step_write(&mut self) -> Step {
        match self.connection.poll_write(&self.request, &mut self.written) {
            Poll::Pending => Step::Suspend,
            Poll::Ready(Err(error)) if !is_end_of_stream(&error) => {
                Step::Fail(ChainError::Write(error))
            }
            Poll::Ready(_) => {
                self.context.reporter.response_reading(self.id());
                self.state = ChainState::Reading;
                Step::Advance
            }
        }
    }

    fn step_read(&mut self) -> Step {
        match self.connection.poll_read(&mut self.response) {
            Poll::Pending => Step::Suspend,
            Poll::Ready(Err(error)) if !is_end_of_stream(&error) => {
                Step::Fail(ChainError::Read(error))
            }
            Poll::Ready(_) => Step::Deliver,
        }
    }

    fn suspend(self: Box<Self>) {
        let readiness = self.connection.readiness();
        match readiness {
            Some(readiness) => readiness.wait(move || self.resume()),
            None => self.fail(ChainError::NotOpen),
        }
    }

    fn deliver(mut self: Box<Self>) {
        self.state = ChainState::Done;
        self.connection.close();
        self.context
            .reporter
            .response_delivered(self.id(), self.response.len());
        let body = String::from_utf8_lossy(&self.response).into_owned();
        if let Some(callback) = self.callback.take() {
            callback(body);
        }
    }

    fn fail(mut self: Box<Self>, error: ChainError) {
        self.state = ChainState::Failed;
        self.connection.close();
        self.callback = None;
        self.context.reporter.chain_failed(self.id(), &error);
    }
}
