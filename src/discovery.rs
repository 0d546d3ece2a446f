//! Overlay re-query for additional swarm sources.
//!
//! When a swarm runs low on usable sources, discovery re-searches the
//! overlay network for more. Hits come back through [`SourceDiscovery::on_match`],
//! which routes them to the matching swarm after deduplication and file
//! name hygiene. Discovery is best-effort throughout: a swarm that cannot
//! be re-queried, an overlay without hubs, or a malformed candidate is
//! skipped quietly and never surfaces as an error.

use std::net::SocketAddr;
use std::sync::Arc;

use rand::Rng as _;
use tracing::debug;

use crate::overlay::Overlay;
use crate::source::{identity_matches, sanitize_name, ContentIdentity, PeerSource};
use crate::swarm::{SwarmId, SwarmRegistry};

/// Re-searches the overlay network for sources of in-progress swarms.
pub struct SourceDiscovery {
    registry: Arc<SwarmRegistry>,
    overlay: Arc<dyn Overlay>,
}

impl SourceDiscovery {
    pub fn new(registry: Arc<SwarmRegistry>, overlay: Arc<dyn Overlay>) -> Self {
        Self { registry, overlay }
    }

    /// Issues a re-search for one swarm against a single randomly chosen
    /// hub.
    ///
    /// One hub, not all of them: a stalled swarm re-queries often, and
    /// spraying every known hub each time would flood the overlay.
    /// Hash-less swarms cannot be re-queried and are skipped.
    pub fn find_more_sources(&self, swarm_id: SwarmId) {
        let Some(swarm) = self.registry.get(swarm_id) else {
            return;
        };
        if !swarm.is_active() {
            return;
        }
        let ContentIdentity::Hash(hash) = swarm.identity() else {
            debug!(swarm = %swarm_id, "swarm has no content hash, cannot re-query");
            return;
        };

        let hubs = self.overlay.known_hubs();
        if hubs.is_empty() {
            debug!(swarm = %swarm_id, "no known hubs to re-query");
            return;
        }
        let hub = hubs[rand::rng().random_range(0..hubs.len())];
        debug!(swarm = %swarm_id, %hub, %hash, "re-querying hub for sources");
        self.overlay.search(hub, &hash);
    }

    /// A hub just became reachable; opportunistically piggy-back a random
    /// in-progress swarm's search onto it.
    pub fn on_new_hub(&self, hub: SocketAddr) {
        let hashes: Vec<_> = self
            .registry
            .active_swarms()
            .into_iter()
            .filter_map(|(_, swarm)| match swarm.identity() {
                ContentIdentity::Hash(hash) => Some(hash),
                ContentIdentity::NameSize { .. } => None,
            })
            .collect();
        if hashes.is_empty() {
            return;
        }
        let hash = &hashes[rand::rng().random_range(0..hashes.len())];
        debug!(%hub, %hash, "piggy-backing re-query onto new hub");
        self.overlay.search(hub, hash);
    }

    /// A search hit arrived; route it to the swarm it belongs to.
    ///
    /// The candidate is matched by identity, dropped if its host is
    /// already a member of the swarm, sanitized, and appended as a new
    /// source. At most one swarm receives it.
    pub fn on_match(&self, mut candidate: PeerSource) {
        for (swarm_id, swarm) in self.registry.active_swarms() {
            if !identity_matches(&swarm.identity(), swarm.declared_size(), &candidate) {
                continue;
            }
            if swarm
                .known_hosts()
                .iter()
                .any(|host| *host == candidate.host)
            {
                debug!(swarm = %swarm_id, host = %candidate.host, "duplicate source dropped");
                return;
            }

            candidate.file_name = sanitize_name(&candidate.file_name);
            debug!(swarm = %swarm_id, host = %candidate.host, "adding re-queried source");
            swarm.add_source(candidate);
            return;
        }
    }
}
