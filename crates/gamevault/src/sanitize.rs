//! Helpers for cleaning user-supplied names and paths.

use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

/// Longest display name kept after sanitizing.
pub const MAX_NAME_LEN: usize = 200;

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[/\\:*?"<>|]"#).expect("static regex"))
}

/// Returns only the filename component of a path (no directory).
///
/// Used in log lines so full storage paths stay out of shared logs.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips path separators and reserved characters from a base name and
/// trims leading/trailing dots and spaces.
///
/// Returns `None` when nothing usable is left or the result is too long.
pub fn sanitize_name(name: &str) -> Option<String> {
    let cleaned = unsafe_chars().replace_all(name, "");
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() || trimmed.chars().count() > MAX_NAME_LEN {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Picks a path inside `dir` for `basename.ext` that does not exist yet,
/// appending `_1`, `_2`, ... as needed.
///
/// Returns `None` if the candidate would land outside `dir`.
pub fn unique_destination(dir: &Path, basename: &str, ext: &str) -> Option<PathBuf> {
    let mut candidate = dir.join(format!("{}.{}", basename, ext));
    let mut counter = 1u32;
    loop {
        if !is_direct_child(dir, &candidate) {
            return None;
        }
        if !candidate.exists() {
            return Some(candidate);
        }
        candidate = dir.join(format!("{}_{}.{}", basename, counter, ext));
        counter += 1;
    }
}

/// True when `path` is exactly one normal component below `dir`.
pub fn is_direct_child(dir: &Path, path: &Path) -> bool {
    match path.strip_prefix(dir) {
        Ok(rest) => {
            let mut components = rest.components();
            matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            )
        }
        Err(_) => false,
    }
}
