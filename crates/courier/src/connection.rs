//! A single outbound TCP connection and its non-blocking I/O steps.
//!
//! Each step returns [`Poll::Pending`] when the socket would block; the owner
//! then parks itself with [`Connection::await_ready`] and retries the same
//! step once the reactor reports readiness.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::task::Poll;

use mio::net::TcpStream;
use mio::{Interest, Token};
use tracing::debug;

use crate::reactor::{EventLoop, WeakEventLoop};

const READ_CHUNK: usize = 4096;
const CONNECTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::connection");

/// Identity assigned to a connection by its dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Identity handed to the first connection of a dispatcher.
    pub const FIRST: Self = Self(1);

    /// Wraps a raw identity.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identity.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The identity issued after this one.
    #[must_use]
    pub const fn successor(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Returns true for the end-of-stream condition that chains tolerate.
#[must_use]
pub fn is_end_of_stream(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::UnexpectedEof
}

struct Socket {
    stream: TcpStream,
    token: Token,
}

/// One socket plus the identity it was created under.
///
/// The socket is never shared: only the request chain owning the connection
/// reads or writes it. Once closed, a connection stays closed.
pub struct Connection {
    id: ConnectionId,
    event_loop: WeakEventLoop,
    socket: Option<Socket>,
    closed: bool,
}

impl Connection {
    /// Creates an unconnected connection bound to `event_loop`.
    #[must_use]
    pub const fn new(id: ConnectionId, event_loop: WeakEventLoop) -> Self {
        Self {
            id,
            event_loop,
            socket: None,
            closed: false,
        }
    }

    /// The identity assigned at creation.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns true while the connection owns a socket.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Reactor token of the socket, once started.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.socket.as_ref().map(|socket| socket.token)
    }

    /// Begins a non-blocking connect to `endpoint`.
    ///
    /// Completion is observed through [`Connection::poll_connected`].
    pub fn start(&mut self, endpoint: SocketAddr) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection already closed",
            ));
        }
        if self.socket.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "connection already started",
            ));
        }
        let event_loop = self.event_loop.upgrade().ok_or_else(|| {
            io::Error::other("event loop no longer exists")
        })?;
        let mut stream = TcpStream::connect(endpoint)?;
        let token = event_loop.register(&mut stream, Interest::READABLE | Interest::WRITABLE)?;
        self.socket = Some(Socket { stream, token });
        Ok(())
    }

    /// Reports whether the connect started by [`Connection::start`] finished.
    pub fn poll_connected(&mut self) -> Poll<io::Result<SocketAddr>> {
        let stream = match self.stream() {
            Ok(stream) => stream,
            Err(error) => return Poll::Ready(Err(error)),
        };
        match stream.take_error() {
            Ok(Some(error)) | Err(error) => return Poll::Ready(Err(error)),
            Ok(None) => {}
        }
        match stream.peer_addr() {
            Ok(peer) => Poll::Ready(Ok(peer)),
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::NotConnected | io::ErrorKind::WouldBlock
                ) =>
            {
                Poll::Pending
            }
            Err(error) => Poll::Ready(Err(error)),
        }
    }

    /// Writes `data` from offset `written` onwards, advancing the offset.
    ///
    /// The bytes go out exactly as given; no framing is added.
    pub fn poll_write(&mut self, data: &[u8], written: &mut usize) -> Poll<io::Result<()>> {
        let stream = match self.stream() {
            Ok(stream) => stream,
            Err(error) => return Poll::Ready(Err(error)),
        };
        while let Some(remaining) = data.get(*written..).filter(|rest| !rest.is_empty()) {
            match stream.write(remaining) {
                Ok(0) => return Poll::Ready(Err(io::ErrorKind::WriteZero.into())),
                Ok(count) => *written += count,
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Poll::Pending,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Poll::Ready(Err(error)),
            }
        }
        Poll::Ready(Ok(()))
    }

    /// Appends everything the peer sends to `buffer` until it closes.
    ///
    /// Peer close is success regardless of how much was received.
    pub fn poll_read(&mut self, buffer: &mut Vec<u8>) -> Poll<io::Result<()>> {
        let stream = match self.stream() {
            Ok(stream) => stream,
            Err(error) => return Poll::Ready(Err(error)),
        };
        let mut chunk = [0_u8; READ_CHUNK];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => return Poll::Ready(Ok(())),
                Ok(count) => buffer.extend_from_slice(chunk.get(..count).unwrap_or_default()),
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Poll::Pending,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Poll::Ready(Err(error)),
            }
        }
    }

    /// Returns the handle used to wait for this socket's next readiness.
    ///
    /// `None` when there is no socket or the loop is gone.
    #[must_use]
    pub fn readiness(&self) -> Option<Readiness> {
        let token = self.token()?;
        let event_loop = self.event_loop.upgrade()?;
        Some(Readiness { event_loop, token })
    }

    /// Parks `resume` until the socket reports readiness.
    ///
    /// Returns false, dropping `resume`, when there is nothing to wait on.
    pub fn await_ready<F>(&self, resume: F) -> bool
    where
        F: FnOnce() + 'static,
    {
        self.readiness()
            .map(|readiness| readiness.wait(resume))
            .is_some()
    }

    /// Releases the socket. Calling it again does nothing.
    pub fn close(&mut self) {
        self.closed = true;
        let Some(mut socket) = self.socket.take() else {
            return;
        };
        if let Some(event_loop) = self.event_loop.upgrade()
            && let Err(error) = event_loop.deregister(&mut socket.stream, socket.token)
        {
            debug!(
                target: CONNECTION_TARGET,
                connection_id = %self.id,
                error = %error,
                "failed to deregister socket"
            );
        }
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.socket
            .as_mut()
            .map(|socket| &mut socket.stream)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "connection is not open"))
    }
}

/// Pending wait on one socket, detached from the [`Connection`] borrow.
///
/// Lets an owner move itself into the continuation it parks.
#[derive(Debug)]
pub struct Readiness {
    event_loop: EventLoop,
    token: Token,
}

impl Readiness {
    /// Parks `resume` until the socket is ready.
    pub fn wait<F>(self, resume: F)
    where
        F: FnOnce() + 'static,
    {
        self.event_loop.await_ready(self.token, resume);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Connection")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .field("closed", &self.closed)
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
