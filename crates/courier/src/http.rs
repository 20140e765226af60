//! Minimal HTTP/1.1 framing for callers of the dispatcher.
//!
//! The dispatcher moves opaque bytes. These helpers build a request to post
//! and interpret the payload a completion callback receives.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use courier_config::ConnectionHeader;
use strum::{Display, EnumString};
use thiserror::Error;

const MAX_HEADERS: usize = 64;
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Request methods the demo client can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Method {
    /// `GET`
    #[default]
    #[strum(serialize = "GET")]
    Get,
    /// `POST`
    #[strum(serialize = "POST")]
    Post,
}

/// An HTTP/1.1 request rendered to its exact wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    method: Method,
    target: String,
    headers: Vec<(String, String)>,
    connection: ConnectionHeader,
    body: Option<String>,
}

impl HttpRequest {
    /// Starts a request for `target` with no headers and `Connection: close`.
    #[must_use]
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Vec::new(),
            connection: ConnectionHeader::default(),
            body: None,
        }
    }

    /// A request carrying the `Host`, `User-Agent` and `Accept` fields a
    /// server expects from a client.
    #[must_use]
    pub fn for_target(method: Method, address: IpAddr, port: u16, target: &str) -> Self {
        Self::new(method, target)
            .header("Host", SocketAddr::new(address, port).to_string())
            .header("User-Agent", USER_AGENT)
            .header("Accept", "*/*")
    }

    /// Appends a header field. Fields are written in insertion order.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the `Connection` field.
    #[must_use]
    pub const fn connection(mut self, connection: ConnectionHeader) -> Self {
        self.connection = connection;
        self
    }

    /// Attaches a body; `Content-Length` is derived from it.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Request method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request target.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Renders the request line, header block and body.
    #[must_use]
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} {} HTTP/1.1\r\n", self.method, self.target)?;
        for (name, value) in &self.headers {
            write!(formatter, "{name}: {value}\r\n")?;
        }
        write!(formatter, "Connection: {}\r\n", self.connection.as_str())?;
        if let Some(body) = &self.body {
            write!(formatter, "Content-Length: {}\r\n", body.len())?;
        }
        formatter.write_str("\r\n")?;
        if let Some(body) = &self.body {
            formatter.write_str(body)?;
        }
        Ok(())
    }
}

/// Errors raised while interpreting a response payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HttpParseError {
    /// The payload ended before the header block did.
    #[error("response head is incomplete")]
    Incomplete,
    /// The status line or a header field is malformed.
    #[error("malformed response: {0}")]
    Malformed(#[from] httparse::Error),
    /// `Content-Length` is not a decimal byte count.
    #[error("invalid Content-Length '{0}'")]
    ContentLength(String),
}

/// A parsed HTTP/1.x response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    version: u8,
    status: u16,
    reason: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl HttpResponse {
    /// Parses a payload delivered by the dispatcher.
    pub fn parse(payload: &str) -> Result<Self, HttpParseError> {
        let mut fields = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut response = httparse::Response::new(&mut fields);
        let head_len = match response.parse(payload.as_bytes())? {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => return Err(HttpParseError::Incomplete),
        };
        let (Some(version), Some(status)) = (response.version, response.code) else {
            return Err(HttpParseError::Incomplete);
        };
        let headers = response
            .headers
            .iter()
            .map(|field| {
                (
                    field.name.to_owned(),
                    String::from_utf8_lossy(field.value).into_owned(),
                )
            })
            .collect();
        let parsed = Self {
            version,
            status,
            reason: response.reason.unwrap_or_default().to_owned(),
            headers,
            body: payload.get(head_len..).unwrap_or_default().to_owned(),
        };
        parsed.content_length()?;
        Ok(parsed)
    }

    /// Minor HTTP version (`1` for HTTP/1.1).
    #[must_use]
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// Status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Reason phrase, possibly empty.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Header fields in the order received.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of the named header, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Everything after the header block.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Declared body length, if any.
    pub fn content_length(&self) -> Result<Option<usize>, HttpParseError> {
        self.header("Content-Length")
            .map(|value| {
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| HttpParseError::ContentLength(value.to_owned()))
            })
            .transpose()
    }

    /// Returns false when the body is shorter than its declared length.
    ///
    /// A response without `Content-Length` is delimited by the peer closing
    /// the connection and is therefore always complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match self.content_length() {
            Ok(Some(expected)) => self.body.len() >= expected,
            Ok(None) => true,
            Err(_) => false,
        }
    }

    /// One-line summary: status, reason and header count.
    #[must_use]
    pub fn summary(&self) -> String {
        let reason = if self.reason.is_empty() {
            String::new()
        } else {
            format!(" {}", self.reason)
        };
        format!(
            "HTTP/1.{} {}{reason} ({} headers)",
            self.version,
            self.status,
            self.headers.len()
        )
    }
}
