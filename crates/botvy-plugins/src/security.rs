//! Path containment for plugin-relative files.
//!
//! Every file a manifest references must live inside the plugin's own
//! directory. These checks run twice: once on the raw string during schema
//! validation and once on the rewritten absolute path in the loader.

use std::path::{Component, Path, PathBuf};

/// Check that a manifest path is relative and never climbs out of its root.
///
/// Rejects absolute paths (leading `/` or `\`, Windows drive prefixes) and
/// any `..` component, with either separator.
#[must_use]
pub fn is_plugin_relative(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('\\') {
        return false;
    }
    if has_drive_prefix(path) {
        return false;
    }
    !path.split(['/', '\\']).any(|segment| segment == "..")
}

fn has_drive_prefix(path: &str) -> bool {
    let mut chars = path.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

/// Normalize a path without touching the filesystem.
///
/// `.` components are dropped and `..` pops the previous component. A `..`
/// that would pop past the root is discarded.
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                out.pop();
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Join `relative` onto `base` and return it only if it stays under `base`.
///
/// `base` is expected to be absolute and already normalized.
#[must_use]
pub fn resolve_within(base: &Path, relative: &str) -> Option<PathBuf> {
    let joined = normalize_lexically(&base.join(relative));
    joined.starts_with(base).then_some(joined)
}
