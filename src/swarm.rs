//! Coordinator interface and swarm registry.
//!
//! The engine does not own swarms. A coordinator (external to this crate)
//! owns the set of connections for one logical file, allocates byte
//! ranges, and persists payload bytes; the engine reaches it through the
//! [`SwarmCoordinator`] trait. The [`SwarmRegistry`] keeps the live
//! coordinators addressable by id so source discovery can route re-query
//! matches to them.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng as _;

use crate::source::{ContentIdentity, PeerSource};

/// Index of a connection within its swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub usize);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry-wide identifier of a swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwarmId(pub u64);

impl fmt::Display for SwarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The coordinator-side interface consumed by the engine.
///
/// Implementations must be thread-safe: callbacks for different
/// connections arrive concurrently, and all mutation of swarm-level
/// collections and counters belongs behind a single coordinator-held
/// lock.
pub trait SwarmCoordinator: Send + Sync {
    /// A connection became usable for range assignment.
    fn notify_available(&self, id: ConnectionId);

    /// Payload bytes arrived at `file_offset`. The coordinator persists
    /// them and advances `running_offset` by the number of bytes consumed.
    fn flush_data(&self, file_offset: u64, data: &[u8], id: ConnectionId, running_offset: &mut u64);

    /// A `Downloading` connection went back to waiting or failed; its
    /// range may be reassigned.
    fn notify_idle(&self, id: ConnectionId);

    /// Number of currently active (connected or transferring) connections,
    /// read by admission control.
    fn active_connection_count(&self) -> usize;

    /// Whether the swarm is still alive. Once false, the engine performs
    /// no further work for it.
    fn is_active(&self) -> bool;

    /// Identity used to match re-query candidates against this swarm.
    fn identity(&self) -> ContentIdentity;

    /// Declared size of the file being assembled.
    fn declared_size(&self) -> u64;

    /// Hosts of every source currently known to the swarm; discovery
    /// drops candidates whose host already appears here.
    fn known_hosts(&self) -> Vec<String>;

    /// Appends a freshly discovered source to the swarm.
    fn add_source(&self, source: PeerSource);
}

/// Live swarms, addressable by id.
///
/// An explicit object handed to discovery and coordinators instead of a
/// process-global table, so swarms can be exercised in isolation.
pub struct SwarmRegistry {
    swarms: RwLock<HashMap<SwarmId, Arc<dyn SwarmCoordinator>>>,
    next_id: AtomicU64,
}

impl SwarmRegistry {
    pub fn new() -> Self {
        Self {
            swarms: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers a coordinator and returns its id.
    pub fn register(&self, swarm: Arc<dyn SwarmCoordinator>) -> SwarmId {
        let id = SwarmId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.swarms.write().insert(id, swarm);
        id
    }

    /// Removes a swarm, typically after it finished or was cancelled.
    pub fn remove(&self, id: SwarmId) {
        self.swarms.write().remove(&id);
    }

    pub fn get(&self, id: SwarmId) -> Option<Arc<dyn SwarmCoordinator>> {
        self.swarms.read().get(&id).cloned()
    }

    /// Every registered swarm that still reports itself active.
    pub fn active_swarms(&self) -> Vec<(SwarmId, Arc<dyn SwarmCoordinator>)> {
        self.swarms
            .read()
            .iter()
            .filter(|(_, swarm)| swarm.is_active())
            .map(|(id, swarm)| (*id, Arc::clone(swarm)))
            .collect()
    }

    /// A uniformly random active swarm, if any.
    pub fn random_active(&self) -> Option<(SwarmId, Arc<dyn SwarmCoordinator>)> {
        let active = self.active_swarms();
        if active.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..active.len());
        active.into_iter().nth(index)
    }

    pub fn len(&self) -> usize {
        self.swarms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.swarms.read().is_empty()
    }
}

impl Default for SwarmRegistry {
    fn default() -> Self {
        Self::new()
    }
}
