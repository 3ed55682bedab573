//! Error types.
//!
//! Fetch failures are data, not panics: stores and managers capture them in their state and
//! render paths show them. Configuration problems are reported when a config is built.

use snafu::Snafu;

/// A failed page or chunk fetch.
///
/// `Clone` because one de-duplicated fetch hands the same outcome to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum FetchError {
    /// The request never produced a response (offline, timeout, aborted).
    #[snafu(display("Network error: {message}"))]
    Network { message: String },

    /// The server answered with a failure status.
    #[snafu(display("Server error {status}: {message}"))]
    Server { status: u16, message: String },
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        FetchError::Network {
            message: message.into(),
        }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        FetchError::Server {
            status,
            message: message.into(),
        }
    }
}

/// Rejected view configuration.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("item_size must be positive"))]
    InvalidItemSize,

    #[snafu(display("chunk_size must be positive"))]
    InvalidChunkSize,

    #[snafu(display("max_cached_chunks must be positive"))]
    InvalidMaxCachedChunks,

    #[snafu(display("page_size must be positive"))]
    InvalidPageSize,

    #[snafu(display("TOML parse error: {source}"))]
    Parse { source: toml::de::Error },
}

impl From<toml::de::Error> for ConfigError {
    fn from(source: toml::de::Error) -> Self {
        ConfigError::Parse { source }
    }
}

/// Crate-level error.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Fetch failed: {source}"))]
    Fetch { source: FetchError },

    #[snafu(display("Invalid config: {source}"))]
    Config { source: ConfigError },

    /// Some chunks of a range could not be loaded; `source` is the first failure.
    #[snafu(display("{failed} chunk(s) failed to load: {source}"))]
    PartialRange { failed: usize, source: FetchError },
}

impl From<FetchError> for Error {
    fn from(source: FetchError) -> Self {
        Error::Fetch { source }
    }
}

impl From<ConfigError> for Error {
    fn from(source: ConfigError) -> Self {
        Error::Config { source }
    }
}

/// Result type alias for convenience
pub type Result<T, E = Error> = std::result::Result<T, E>;
