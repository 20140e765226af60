//! Shared configuration for the courier dispatcher and its command-line demo.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, then a
//! TOML file named by `--config-path`, then `COURIER_*` environment variables,
//! then command-line flags. The binaries only ever see the merged [`Config`].

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod connection;
mod defaults;
mod logging;

pub use connection::{ConnectionHeader, ConnectionHeaderParseError};
pub use defaults::{
    DEFAULT_FAIRNESS_QUOTA, DEFAULT_LOG_FILTER, default_connection_header, default_fairness_quota,
    default_log_filter, default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Merged runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "COURIER")]
pub struct Config {
    /// Filter expression handed to the tracing subscriber.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for structured logs.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Ready units of work executed after each posted request.
    #[ortho_config(default = defaults::DEFAULT_FAIRNESS_QUOTA)]
    pub fairness_quota: usize,
    /// `Connection` header sent with generated HTTP requests.
    #[ortho_config(default = defaults::default_connection_header())]
    pub connection_header: ConnectionHeader,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            fairness_quota: DEFAULT_FAIRNESS_QUOTA,
            connection_header: default_connection_header(),
        }
    }
}

impl Config {
    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Fairness quota, never below one.
    #[must_use]
    pub fn fairness_quota(&self) -> usize {
        self.fairness_quota.max(1)
    }

    /// Connection header policy for generated requests.
    #[must_use]
    pub const fn connection_header(&self) -> ConnectionHeader {
        self.connection_header
    }
}
