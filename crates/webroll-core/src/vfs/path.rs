//! Virtual path helpers.
//!
//! Virtual paths are absolute, `/`-separated strings (`/src/index.ts`).
//! They never carry a trailing separator except for the root itself.

/// The virtual filesystem root.
pub const ROOT: &str = "/";

/// Normalize a virtual path.
///
/// Collapses `.` and empty segments and applies `..` steps. A `..` at the
/// root stays at the root.
#[must_use]
pub fn normalize(path: &str) -> String {
    normalize_within(ROOT, path)
}

/// Normalize `path`, never letting `..` steps climb above `floor`.
///
/// `path` is expected to already live under `floor`; a path outside `floor`
/// is normalized against the virtual root instead.
#[must_use]
pub fn normalize_within(floor: &str, path: &str) -> String {
    let floor_segments = segments(floor);
    let floor_depth = if is_within(path, floor) {
        floor_segments.len()
    } else {
        0
    };

    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if out.len() > floor_depth {
                    out.pop();
                }
            }
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return ROOT.to_string();
    }
    let mut result = String::with_capacity(path.len() + 1);
    for segment in out {
        result.push('/');
        result.push_str(segment);
    }
    result
}

/// Join `rel` onto `base` and normalize.
///
/// A leading `/` on `rel` is treated as relative to `base`, so
/// `join("/ws", "/src/a.ts")` is `/ws/src/a.ts`.
#[must_use]
pub fn join(base: &str, rel: &str) -> String {
    normalize(&format!("{base}/{rel}"))
}

/// Parent directory. The parent of the root is the root.
#[must_use]
pub fn parent(path: &str) -> String {
    let path = normalize(path);
    match path.rfind('/') {
        Some(0) | None => ROOT.to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// Final path component, or an empty string for the root.
#[must_use]
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or("")
}

/// Extension of the final component, without the dot.
#[must_use]
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&name[idx + 1..]),
    }
}

/// Final component without its extension.
#[must_use]
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// Whether `path` is `root` or lives below it.
#[must_use]
pub fn is_within(path: &str, root: &str) -> bool {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return path.starts_with('/');
    }
    path == root || path.strip_prefix(root).is_some_and(|rest| rest.starts_with('/'))
}

/// `path` relative to `root`, without a leading separator.
///
/// Returns `None` when `path` is not under `root`.
#[must_use]
pub fn relative_to<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    if !is_within(path, root) {
        return None;
    }
    let root = root.trim_end_matches('/');
    Some(path[root.len()..].trim_start_matches('/'))
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}
