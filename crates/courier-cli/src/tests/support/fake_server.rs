//! Loopback HTTP server answering every connection with one canned reply.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const STALL_LIMIT: Duration = Duration::from_secs(5);

pub(crate) struct FakeServer {
    port: u16,
    handle: JoinHandle<Vec<String>>,
}

impl FakeServer {
    /// Starts a server that answers `connections` requests then exits.
    pub(crate) fn replying(reply: &str, connections: usize) -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind fake server");
        let port = listener.local_addr().expect("fake server address").port();
        let reply = reply.as_bytes().to_vec();
        let handle = thread::spawn(move || {
            (0..connections)
                .map(|_| {
                    let (mut stream, _) = listener.accept().expect("accept request");
                    let request = read_head(&mut stream);
                    stream.write_all(&reply).expect("write reply");
                    request
                })
                .collect()
        });
        Self { port, handle }
    }

    pub(crate) const fn port(&self) -> u16 {
        self.port
    }

    /// Waits for every expected connection and returns the request heads.
    pub(crate) fn requests(self) -> Vec<String> {
        self.handle.join().expect("fake server panicked")
    }
}

/// Server that answers three connections but holds the second one open until
/// released, or until a generous limit passes.
pub(crate) struct StallingServer {
    port: u16,
    release: Sender<()>,
    handle: JoinHandle<bool>,
}

impl StallingServer {
    pub(crate) fn replying(reply: &str) -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind stalling server");
        let port = listener.local_addr().expect("stalling server address").port();
        let reply = reply.as_bytes().to_vec();
        let (release, released) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let mut answer = |stream: &mut TcpStream| {
                read_head(stream);
                stream.write_all(&reply).expect("write reply");
            };
            let (mut first, _) = listener.accept().expect("accept first");
            answer(&mut first);
            drop(first);
            let (mut held, _) = listener.accept().expect("accept second");
            let (mut third, _) = listener.accept().expect("accept third");
            answer(&mut third);
            drop(third);
            let on_time = released.recv_timeout(STALL_LIMIT).is_ok();
            answer(&mut held);
            on_time
        });
        Self {
            port,
            release,
            handle,
        }
    }

    pub(crate) const fn port(&self) -> u16 {
        self.port
    }

    /// Handle that lets the held connection finish.
    pub(crate) fn releaser(&self) -> Sender<()> {
        self.release.clone()
    }

    /// True when the held connection was released before the limit.
    pub(crate) fn released_on_time(self) -> bool {
        self.handle.join().expect("stalling server panicked")
    }
}

pub(crate) fn unused_port() -> u16 {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .and_then(|listener| listener.local_addr())
        .expect("probe port")
        .port()
}

fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0_u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte) {
            Ok(1) => head.extend_from_slice(&byte),
            _ => break,
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}
