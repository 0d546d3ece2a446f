//! Consumed overlay-network capability.
//!
//! The engine never speaks the overlay wire protocol itself. It asks an
//! [`Overlay`] implementation to search hubs for a content hash and to
//! request reverse connections from firewalled sources; results come back
//! through [`crate::discovery::SourceDiscovery`].

use std::net::SocketAddr;

use crate::source::{ContentHash, PeerSource};

/// Abstract search and push capability of the overlay network.
pub trait Overlay: Send + Sync {
    /// Hubs the overlay currently knows about.
    fn known_hubs(&self) -> Vec<SocketAddr>;

    /// Issues a search for sources of `hash` against one hub.
    fn search(&self, hub: SocketAddr, hash: &ContentHash);

    /// Asks the overlay to have a firewalled source connect back to us.
    fn request_push(&self, source: &PeerSource);

    /// Best-effort liveness check for a transfer sitting in a remote
    /// upload queue.
    fn queue_probe(&self, _source: &PeerSource) {}
}
