//! rswarm - a multi-source swarm transfer engine
//!
//! This library implements the per-source half of a swarm download: a
//! connection state machine that negotiates partial-range transfers with
//! one remote source, and a re-query service that searches an overlay
//! network for replacement sources when a swarm runs dry.
//!
//! # Modules
//!
//! - [`source`] - Source identity, content matching, file name hygiene
//! - [`connection`] - Per-source connection state machine and socket driver
//! - [`discovery`] - Overlay re-query for additional sources
//! - [`swarm`] - Coordinator interface and swarm registry
//! - [`overlay`] - Consumed overlay-network capability
//! - [`policy`] - Retry, admission-control, and watchdog tuning

pub mod connection;
pub mod discovery;
pub mod overlay;
pub mod policy;
pub mod source;
pub mod swarm;

pub use connection::{
    Command, ConnectionDriver, ConnectionError, ConnectionHandle, ConnectionState, PeerConnection,
    PersistedConnection, ResponseKind, TransferRange,
};
pub use discovery::SourceDiscovery;
pub use overlay::Overlay;
pub use policy::{BandwidthClass, TransferPolicy};
pub use source::{
    identity_matches, normalize_name, sanitize_name, ContentHash, ContentIdentity, PeerSource,
};
pub use swarm::{ConnectionId, SwarmCoordinator, SwarmId, SwarmRegistry};
