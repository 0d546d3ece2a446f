//! Per-source connection state machine and socket driver.
//!
//! One [`PeerConnection`] represents one attempt to exchange bytes with
//! one source. It is a synchronous state machine: timers and socket
//! callbacks feed it events, it invokes coordinator callbacks directly,
//! and socket side effects come back as [`Command`]s for the caller to
//! execute. [`ConnectionDriver`] is the tokio task that owns the socket,
//! the three timers, and the control channel, and executes those
//! commands.

mod driver;
mod error;
mod machine;
mod response;

pub use driver::{ConnectionDriver, ConnectionHandle};
pub use error::ConnectionError;
pub use machine::{Command, ConnectionState, PeerConnection, PersistedConnection, TransferRange};
pub use response::ResponseKind;
