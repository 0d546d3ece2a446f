//! Classification of the textual transfer handshake.
//!
//! The first response on a connection is an HTTP-like header block ended
//! by a blank line. Sources in the wild are loose about status lines, so
//! classification is by keyword as much as by status code.

/// What the remote's first response means for the transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    /// Transfer accepted; payload follows the header.
    Success,
    /// Remote is busy. Retry later; `queue_position` is set when the
    /// remote reported a spot in its upload queue.
    Busy { queue_position: Option<u32> },
    /// Remote does not have the file. Permanent for this source.
    NotFound,
    /// Anything else; treated as a protocol error.
    Unknown,
}

/// Byte offset of the `\r\n\r\n` header terminator, if present.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

/// Classifies a complete header block.
pub fn classify(header: &str) -> ResponseKind {
    let lower = header.to_ascii_lowercase();
    let first = lower.lines().next().unwrap_or("");

    if first.contains(" 200 ")
        || first.contains(" 206 ")
        || first.contains("ok")
        || first.contains("partial")
        || lower.contains("http 200 ok")
    {
        return ResponseKind::Success;
    }

    if first.contains(" 503 ")
        || first.contains("busy")
        || (first.contains("<html>") && lower.contains("server busy"))
    {
        return ResponseKind::Busy {
            queue_position: queue_position(&lower),
        };
    }

    if first.contains(" 404 ")
        || first.contains("not found")
        || (first.contains("<html>") && lower.contains("404 not found"))
    {
        return ResponseKind::NotFound;
    }

    ResponseKind::Unknown
}

/// Value of a `Name: value` header, compared case-insensitively.
pub fn header_value(header: &str, name: &str) -> Option<String> {
    for line in header.lines() {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case(name) {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

/// Queue position from an `X-Queue: position=N,...` header, if any.
fn queue_position(lower_header: &str) -> Option<u32> {
    let line = lower_header
        .lines()
        .find(|line| line.trim_start().starts_with("x-queue"))?;
    let start = line.find("position=")? + "position=".len();
    let digits: String = line[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
