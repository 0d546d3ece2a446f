use std::fmt;

use super::PeerSource;

/// An opaque content hash token, as carried in search results and
/// `uri-res` request lines.
///
/// Hashes are compared case-insensitively; overlays are inconsistent
/// about the casing of base32 digests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive equality.
    pub fn matches(&self, other: &ContentHash) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a swarm identifies its file when matching candidate sources.
///
/// Overlay flavors differ in what they can promise: hashed results are
/// matched by digest, hash-less swarms can only fall back to the declared
/// name and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentIdentity {
    /// Match by content hash.
    Hash(ContentHash),
    /// Match by normalized file name and declared size.
    NameSize { name: String, size: u64 },
}

/// Decides whether a candidate source refers to the same file as a swarm.
///
/// Hash-identified swarms require an equal (case-insensitive) hash and an
/// equal declared size. Hash-less swarms require normalized-name equality
/// and an equal size.
pub fn identity_matches(
    identity: &ContentIdentity,
    declared_size: u64,
    candidate: &PeerSource,
) -> bool {
    match identity {
        ContentIdentity::Hash(hash) => {
            candidate
                .hash
                .as_ref()
                .is_some_and(|candidate_hash| candidate_hash.matches(hash))
                && candidate.file_size == declared_size
        }
        ContentIdentity::NameSize { name, size } => {
            normalize_name(&candidate.file_name) == normalize_name(name)
                && candidate.file_size == *size
        }
    }
}

/// Normalizes a file name for match equality: lowercased, alphanumeric
/// characters only. "My Song.mp3" and "my_song.MP3" compare equal.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
