use crate::connection::ConnectionHeader;
use crate::logging::LogFormat;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Ready units of work drained after each posted request.
pub const DEFAULT_FAIRNESS_QUOTA: usize = 1;

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format. The demo is interactive, so keep lines readable.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default fairness quota.
#[must_use]
pub const fn default_fairness_quota() -> usize {
    DEFAULT_FAIRNESS_QUOTA
}

/// Requests ask the peer to close so the response ends at end-of-stream.
#[must_use]
pub const fn default_connection_header() -> ConnectionHeader {
    ConnectionHeader::Close
}
