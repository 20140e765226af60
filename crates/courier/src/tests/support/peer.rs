//! In-process TCP peers standing in for remote servers.

use std::io::{Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";
const BULK_STALL: Duration = Duration::from_millis(100);

/// Peer that answers a fixed number of connections with one canned reply.
///
/// Each connection has its request read up to the blank line, receives the
/// reply and is then closed by the peer.
pub struct TestPeer {
    address: SocketAddr,
    handle: JoinHandle<Vec<String>>,
}

impl TestPeer {
    /// Starts a peer on an ephemeral IPv4 loopback port.
    pub fn replying(reply: &str, connections: usize) -> Self {
        Self::replying_on(IpAddr::V4(Ipv4Addr::LOCALHOST), reply, connections)
            .expect("bind test peer")
    }

    /// Starts a peer on `address`, or `None` when the host cannot bind it.
    pub fn replying_on(address: IpAddr, reply: &str, connections: usize) -> Option<Self> {
        let listener = TcpListener::bind((address, 0)).ok()?;
        let address = listener.local_addr().expect("test peer address");
        let reply = reply.as_bytes().to_vec();
        let handle = thread::spawn(move || {
            (0..connections)
                .map(|_| {
                    let (mut stream, _) = listener.accept().expect("accept connection");
                    let request = read_request(&mut stream);
                    stream.write_all(&reply).expect("write reply");
                    request
                })
                .collect()
        });
        Some(Self { address, handle })
    }

    /// Where the peer listens.
    pub const fn address(&self) -> SocketAddr {
        self.address
    }

    /// Waits for every expected connection and returns the requests seen.
    pub fn requests(self) -> Vec<String> {
        self.handle.join().expect("test peer panicked")
    }
}

/// Peer that accepts one connection, reads the request, and never answers.
pub struct SilentPeer {
    address: SocketAddr,
    release: Sender<()>,
    handle: JoinHandle<String>,
}

impl SilentPeer {
    /// Starts a silent peer on an ephemeral loopback port.
    pub fn spawn() -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind silent peer");
        let address = listener.local_addr().expect("silent peer address");
        let (release, released) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept connection");
            let request = read_request(&mut stream);
            released.recv().ok();
            request
        });
        Self {
            address,
            release,
            handle,
        }
    }

    /// Where the peer listens.
    pub const fn address(&self) -> SocketAddr {
        self.address
    }

    /// Lets the peer close its connection, returning the request it read.
    ///
    /// Only call this once a connection has been accepted.
    pub fn release(self) -> String {
        drop(self.release);
        self.handle.join().expect("silent peer panicked")
    }
}

/// Peer that stalls before draining a request of known length, then answers
/// with a reply of arbitrary size and closes.
///
/// The stall lets a large request fill the socket buffers so the writer has
/// to wait for writability.
pub struct BulkPeer {
    address: SocketAddr,
    handle: JoinHandle<Vec<u8>>,
}

impl BulkPeer {
    /// Starts a bulk peer on an ephemeral loopback port.
    pub fn spawn(request_len: usize, reply: Vec<u8>) -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind bulk peer");
        let address = listener.local_addr().expect("bulk peer address");
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept connection");
            thread::sleep(BULK_STALL);
            let mut request = vec![0_u8; request_len];
            stream.read_exact(&mut request).expect("read whole request");
            stream.write_all(&reply).expect("write reply");
            request
        });
        Self { address, handle }
    }

    /// Where the peer listens.
    pub const fn address(&self) -> SocketAddr {
        self.address
    }

    /// Waits for the exchange and returns the request bytes received.
    pub fn received(self) -> Vec<u8> {
        self.handle.join().expect("bulk peer panicked")
    }
}

/// A loopback port nothing listens on.
pub fn unused_port() -> u16 {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind probe listener");
    listener.local_addr().expect("probe address").port()
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut request = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(count) => {
                request.extend_from_slice(chunk.get(..count).unwrap_or_default());
                if request
                    .windows(HEAD_TERMINATOR.len())
                    .any(|window| window == HEAD_TERMINATOR)
                {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&request).into_owned()
}
