//! Error types for the GSI HTTP listener.

use std::net::SocketAddr;

/// Errors surfaced synchronously by [`GsiServer::start`](crate::GsiServer::start)
/// and [`GsiServer::stop`](crate::GsiServer::stop). Never retried internally.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind failed on {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configured bind address is not usable.
    #[error(transparent)]
    Config(#[from] gsi_core::ConfigError),

    /// `start` was called while the server is running.
    #[error("server is already running")]
    AlreadyRunning,

    /// `stop` was called while the server is not running.
    #[error("server is not running")]
    NotRunning,
}

/// Why one request could not be read off a connection.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// A body-bearing request carried no `Content-Length`.
    ///
    /// The connection is dropped without a response.
    #[error("body-bearing request without content-length")]
    MissingContentLength,

    /// The request line or a header is not valid HTTP/1.x.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// The declared body exceeds the configured limit.
    #[error("request body of {declared} bytes exceeds the {limit} byte limit")]
    BodyTooLarge {
        /// `Content-Length` sent by the client.
        declared: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// The socket failed or timed out.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}
