//! Routing prefix extraction and target rewriting.

/// The routing prefix of `path`: a slash plus the first segment.
///
/// `None` when the first segment is empty (`/`, `//x`, ``).
pub fn project_prefix(path: &str) -> Option<&str> {
    let rest = path.strip_prefix('/')?;
    let end = rest.find('/').unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some(&path[..=end])
}

/// Remove `prefix` from the front of `target` (path plus optional query).
///
/// An empty remaining path becomes `/`; the query is kept.
pub fn strip_prefix(target: &str, prefix: &str) -> String {
    let rest = target.strip_prefix(prefix).unwrap_or(target);
    if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{rest}")
    }
}
