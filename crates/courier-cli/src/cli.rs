//! Command-line argument definitions for the `courier` binary.

use clap::{Parser, ValueEnum};
use courier::http::Method;

/// How delivered responses are printed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Print each payload exactly as received.
    #[default]
    Raw,
    /// Parse each payload as HTTP and print its status line and body.
    Summary,
}

/// Issues one HTTP request several times through the asynchronous dispatcher.
#[derive(Parser, Debug)]
#[command(name = "courier", version)]
pub(crate) struct Cli {
    /// Request method, `get` or `post` in any letter case.
    #[arg(long, default_value_t = Method::Get, value_parser = clap::value_parser!(Method))]
    pub(crate) method: Method,
    /// Request body; adds a `Content-Length` header.
    #[arg(long)]
    pub(crate) body: Option<String>,
    /// Number of times the request is posted. The last post discards its
    /// response when more than one is issued.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) requests: u32,
    /// Controls how delivered responses are printed.
    #[arg(long, value_enum, default_value_t = OutputFormat::Raw)]
    pub(crate) output: OutputFormat,
    /// IPv4 or IPv6 literal of the server.
    #[arg(value_name = "ADDRESS")]
    pub(crate) address: String,
    /// Server port.
    #[arg(value_name = "PORT")]
    pub(crate) port: u16,
    /// Request target, for example `/index.html`.
    #[arg(value_name = "TARGET")]
    pub(crate) target: String,
}
