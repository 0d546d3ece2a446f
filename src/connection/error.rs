use thiserror::Error;

/// Errors surfaced by the connection driver and its handle.
///
/// Failures inside the state machine itself never escape; they are
/// funneled into `disconnect` and show up as state transitions.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Network I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The driver task is gone; the connection was torn down.
    #[error("connection closed")]
    Closed,

    /// The remote violated the transfer handshake.
    #[error("protocol error: {0}")]
    Protocol(String),
}
