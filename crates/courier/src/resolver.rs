//! Endpoint resolution for IP literals.
//!
//! The dispatcher only ever targets literal addresses, so resolution never
//! performs a name lookup: the address family is read straight off the
//! literal's syntax and candidate endpoints are filtered to that family.
//! Resolution still completes asynchronously on the event loop so that it is
//! a suspension point like every other stage of a request chain.

use std::fmt;
use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::vec;

use thiserror::Error;

use crate::reactor::{EventLoop, WeakEventLoop};

/// Address family implied by an IP literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum AddressFamily {
    /// Dotted-quad IPv4 literal.
    #[strum(serialize = "ipv4")]
    V4,
    /// Colon-separated IPv6 literal.
    #[strum(serialize = "ipv6")]
    V6,
}

impl AddressFamily {
    /// Derives the family from the literal's syntax.
    #[must_use]
    pub const fn of(address: &IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }

    /// Returns true when `endpoint` belongs to this family.
    #[must_use]
    pub const fn contains(self, endpoint: &SocketAddr) -> bool {
        matches!(
            (self, endpoint),
            (Self::V4, SocketAddr::V4(_)) | (Self::V6, SocketAddr::V6(_))
        )
    }
}

/// Address, port and family hint handed to the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Query {
    address: IpAddr,
    port: u16,
    family: AddressFamily,
}

impl Query {
    /// Builds a query whose family hint matches `address`.
    #[must_use]
    pub const fn new(address: IpAddr, port: u16) -> Self {
        Self {
            address,
            port,
            family: AddressFamily::of(&address),
        }
    }

    /// Parses an IP literal. Host names are rejected.
    pub fn parse(address: &str, port: u16) -> Result<Self, ResolveError> {
        let parsed = address
            .parse::<IpAddr>()
            .map_err(|source| ResolveError::InvalidLiteral {
                input: address.to_owned(),
                source,
            })?;
        Ok(Self::new(parsed, port))
    }

    /// Target address.
    #[must_use]
    pub const fn address(&self) -> IpAddr {
        self.address
    }

    /// Target port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Family hint derived from the address literal.
    #[must_use]
    pub const fn family(&self) -> AddressFamily {
        self.family
    }

    /// The query as a socket address.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.socket_addr())
    }
}

/// Candidate endpoints produced by one resolution, consumed once.
#[derive(Debug)]
pub struct Endpoints {
    candidates: vec::IntoIter<SocketAddr>,
}

impl Iterator for Endpoints {
    type Item = SocketAddr;

    fn next(&mut self) -> Option<Self::Item> {
        self.candidates.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.candidates.size_hint()
    }
}

impl ExactSizeIterator for Endpoints {}

/// Errors raised while resolving a [`Query`].
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The address is not an IPv4 or IPv6 literal.
    #[error("'{input}' is not an IP address literal: {source}")]
    InvalidLiteral {
        /// Text that failed to parse.
        input: String,
        /// Parser diagnostic.
        #[source]
        source: AddrParseError,
    },
    /// Resolution succeeded but produced no endpoint of the hinted family.
    #[error("no {family} endpoints resolved for {query}")]
    NoEndpoints {
        /// Query being resolved.
        query: Query,
        /// Family the candidates were filtered to.
        family: AddressFamily,
    },
}

/// Resolver shared by every request a dispatcher issues.
#[derive(Debug, Clone)]
pub struct Resolver {
    event_loop: WeakEventLoop,
}

impl Resolver {
    /// Creates a resolver that completes on `event_loop`.
    #[must_use]
    pub fn new(event_loop: &EventLoop) -> Self {
        Self {
            event_loop: event_loop.downgrade(),
        }
    }

    /// Resolves `query` on the calling thread.
    ///
    /// Needs no event loop, so it is available without a resolver instance.
    pub fn resolve(query: &Query) -> Result<Endpoints, ResolveError> {
        resolve_literal(query)
    }

    /// Schedules resolution of `query` and later hands the outcome to `handler`.
    ///
    /// Resolution runs as one unit of work and the handler as another, so the
    /// loop may interleave other chains in between. If the loop is stopped or
    /// dropped first, the handler never runs.
    pub fn async_resolve<F>(&self, query: Query, handler: F)
    where
        F: FnOnce(Result<Endpoints, ResolveError>) + 'static,
    {
        let Some(event_loop) = self.event_loop.upgrade() else {
            return;
        };
        let completion_loop = self.event_loop.clone();
        event_loop.post(move || {
            let outcome = resolve_literal(&query);
            if let Some(completion) = completion_loop.upgrade() {
                completion.post(move || handler(outcome));
            }
        });
    }
}

fn resolve_literal(query: &Query) -> Result<Endpoints, ResolveError> {
    let family = query.family();
    let candidates: Vec<SocketAddr> = std::iter::once(query.socket_addr())
        .filter(|endpoint| family.contains(endpoint))
        .collect();
    if candidates.is_empty() {
        return Err(ResolveError::NoEndpoints {
            query: *query,
            family,
        });
    }
    Ok(Endpoints {
        candidates: candidates.into_iter(),
    })
}
