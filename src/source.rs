//! Source identity and matching.
//!
//! A [`PeerSource`] describes one remote host advertising a copy of a file.
//! Sources returned by the overlay network are matched against in-progress
//! swarms through a [`ContentIdentity`]: by content hash and size when the
//! swarm was started from a hashed search result, and by normalized file
//! name and size otherwise.

mod identity;
mod sanitize;

pub use identity::{identity_matches, normalize_name, ContentHash, ContentIdentity};
pub use sanitize::sanitize_name;

/// Identity and metadata of one candidate source for a file.
///
/// Immutable once a connection has been built from it, except for `host`,
/// which is corrected after a push-delivered inbound connection reveals the
/// true origin address.
#[derive(Debug, Clone)]
pub struct PeerSource {
    /// Remote host, either a dotted address or a resolvable name.
    pub host: String,
    /// Remote transfer port.
    pub port: u16,
    /// File name as declared by the source.
    pub file_name: String,
    /// File size as declared by the source.
    pub file_size: u64,
    /// Content hash, when the source advertised one.
    pub hash: Option<ContentHash>,
    /// Vendor tag reported by the source, filled in from the transfer
    /// handshake when the search result did not carry one.
    pub vendor: String,
    /// Whether the source is known to be behind a firewall and must be
    /// reached through a push request.
    pub firewalled: bool,
    /// Number of other sources the remote reported knowing about.
    pub reported_sources: u32,
}

impl PeerSource {
    /// Creates a source with the given endpoint and declared file.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        file_name: impl Into<String>,
        file_size: u64,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            file_name: file_name.into(),
            file_size,
            hash: None,
            vendor: String::new(),
            firewalled: false,
            reported_sources: 0,
        }
    }

    /// Attaches a content hash.
    pub fn with_hash(mut self, hash: ContentHash) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Marks the source as firewalled.
    pub fn with_firewalled(mut self, firewalled: bool) -> Self {
        self.firewalled = firewalled;
        self
    }

    /// The identity this source is matched by: the hash when present,
    /// name and size otherwise.
    pub fn identity(&self) -> ContentIdentity {
        match &self.hash {
            Some(hash) => ContentIdentity::Hash(hash.clone()),
            None => ContentIdentity::NameSize {
                name: self.file_name.clone(),
                size: self.file_size,
            },
        }
    }
}

#[cfg(test)]
mod tests;
