//! `Connection` header policy for generated HTTP requests.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Value of the `Connection` header written into generated requests.
///
/// `upgrade` is not accepted; responses are read until the peer closes.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum ConnectionHeader {
    /// Ask the peer to keep the connection open after responding.
    KeepAlive,
    /// Ask the peer to close once the response is written.
    #[default]
    Close,
}

impl ConnectionHeader {
    /// Header value as written on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeepAlive => "keep-alive",
            Self::Close => "close",
        }
    }
}

/// Errors encountered while parsing a [`ConnectionHeader`] from text.
pub type ConnectionHeaderParseError = strum::ParseError;
