use std::path::Path;

/// Longest file name accepted from a remote source, in characters.
const MAX_NAME_LEN: usize = 150;

/// Length a too-long name is cut back to, before the extension is
/// re-attached.
const TRUNCATED_NAME_LEN: usize = 140;

/// Cleans a remotely-declared file name before it is stored in a swarm.
///
/// Path separators are replaced so a hostile name cannot escape the
/// download directory, and overlong names are truncated with their
/// extension preserved.
pub fn sanitize_name(name: &str) -> String {
    let cleaned = name.replace(['\\', '/'], "-");
    if cleaned.chars().count() <= MAX_NAME_LEN {
        return cleaned;
    }

    let extension = Path::new(&cleaned)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned());
    let mut truncated: String = cleaned.chars().take(TRUNCATED_NAME_LEN).collect();
    if let Some(extension) = extension {
        truncated.push('.');
        truncated.push_str(&extension);
    }
    truncated
}
