use super::*;

fn hashed_source(hash: &str, size: u64) -> PeerSource {
    PeerSource::new("10.0.0.1", 6346, "song.mp3", size).with_hash(ContentHash::new(hash))
}

#[test]
fn test_identity_matches_by_hash_and_size() {
    let identity = ContentIdentity::Hash(ContentHash::new("ABCDEF234567"));

    assert!(identity_matches(
        &identity,
        1000,
        &hashed_source("ABCDEF234567", 1000)
    ));
    // hash casing must not matter
    assert!(identity_matches(
        &identity,
        1000,
        &hashed_source("abcdef234567", 1000)
    ));
    // same hash, wrong size
    assert!(!identity_matches(
        &identity,
        1000,
        &hashed_source("ABCDEF234567", 999)
    ));
    // wrong hash, same size
    assert!(!identity_matches(
        &identity,
        1000,
        &hashed_source("ZZZZZZ234567", 1000)
    ));
    // candidate without a hash never matches a hashed swarm
    assert!(!identity_matches(
        &identity,
        1000,
        &PeerSource::new("10.0.0.1", 6346, "song.mp3", 1000)
    ));
}

#[test]
fn test_identity_matches_by_name_and_size() {
    let identity = ContentIdentity::NameSize {
        name: "My Song.mp3".to_string(),
        size: 500,
    };

    assert!(identity_matches(
        &identity,
        500,
        &PeerSource::new("10.0.0.2", 6346, "my_song.MP3", 500)
    ));
    assert!(!identity_matches(
        &identity,
        500,
        &PeerSource::new("10.0.0.2", 6346, "my_song.MP3", 501)
    ));
    assert!(!identity_matches(
        &identity,
        500,
        &PeerSource::new("10.0.0.2", 6346, "other.mp3", 500)
    ));
}

#[test]
fn test_normalize_name() {
    assert_eq!(normalize_name("My Song.mp3"), "mysongmp3");
    assert_eq!(normalize_name("MY-SONG.MP3"), "mysongmp3");
    assert_eq!(normalize_name(""), "");
}

#[test]
fn test_sanitize_strips_path_separators() {
    assert_eq!(sanitize_name("../../etc/passwd"), "..-..-etc-passwd");
    assert_eq!(sanitize_name("a\\b\\c.txt"), "a-b-c.txt");
}

#[test]
fn test_sanitize_truncates_and_keeps_extension() {
    let long = format!("{}.mp3", "x".repeat(200));
    let cleaned = sanitize_name(&long);
    assert!(cleaned.chars().count() <= 150);
    assert!(cleaned.ends_with(".mp3"));
    assert!(cleaned.starts_with("xxx"));
}

#[test]
fn test_sanitize_short_name_untouched() {
    assert_eq!(sanitize_name("song.mp3"), "song.mp3");
}

#[test]
fn test_source_identity_prefers_hash() {
    let source = hashed_source("ABC", 10);
    assert_eq!(
        source.identity(),
        ContentIdentity::Hash(ContentHash::new("ABC"))
    );

    let plain = PeerSource::new("10.0.0.1", 6346, "song.mp3", 10);
    assert_eq!(
        plain.identity(),
        ContentIdentity::NameSize {
            name: "song.mp3".to_string(),
            size: 10
        }
    );
}
