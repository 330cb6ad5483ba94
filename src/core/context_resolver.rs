// src/core/context_resolver.rs

use crate::constants::MARKER_FILENAME;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Finds the context root for `path`: the nearest directory, starting at `path`
/// itself when it is a directory or at its parent otherwise, that contains a
/// `.envrc` marker file.
///
/// The walk stops below the filesystem root (the root itself is never a context
/// root). Relative paths are resolved against the current directory. The
/// returned directory keeps the spelling of `path`; symlinks are only resolved
/// to detect a directory seen twice, which ends the search with `None`.
pub fn find_context_root(path: &Path) -> Option<PathBuf> {
    let absolute = std::path::absolute(path).ok()?;
    let start = if absolute.is_dir() {
        absolute.as_path()
    } else {
        absolute.parent()?
    };

    let mut visited = HashSet::new();
    for directory in start.ancestors() {
        if directory.parent().is_none() {
            break;
        }

        let identity = dunce::canonicalize(directory).unwrap_or_else(|_| directory.to_path_buf());
        if !visited.insert(identity) {
            log::debug!(
                "'{}' was already visited while resolving '{}'",
                directory.display(),
                path.display()
            );
            return None;
        }

        if directory.join(MARKER_FILENAME).is_file() {
            log::trace!("Context root for '{}' is '{}'", path.display(), directory.display());
            return Some(directory.to_path_buf());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_finds_nearest_marker_from_file() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("p");
        touch(&root.join(MARKER_FILENAME));
        let file = root.join("sub").join("deeper").join("file.rs");
        touch(&file);

        assert_eq!(find_context_root(&file), Some(root));
    }

    #[test]
    fn test_directory_argument_is_its_own_candidate() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("p");
        touch(&root.join(MARKER_FILENAME));

        assert_eq!(find_context_root(&root), Some(root.clone()));
    }

    #[test]
    fn test_innermost_marker_wins() {
        let tmp = TempDir::new().unwrap();
        let outer = tmp.path().join("outer");
        let inner = outer.join("inner");
        touch(&outer.join(MARKER_FILENAME));
        touch(&inner.join(MARKER_FILENAME));

        assert_eq!(find_context_root(&inner.join("main.py")), Some(inner));
    }

    #[test]
    fn test_file_that_does_not_exist_yet_still_resolves() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("p");
        touch(&root.join(MARKER_FILENAME));

        assert_eq!(find_context_root(&root.join("unsaved.txt")), Some(root));
    }

    #[test]
    fn test_marker_directory_is_not_a_marker_file() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("q");
        fs::create_dir_all(root.join(MARKER_FILENAME)).unwrap();

        let found = find_context_root(&root.join("file"));
        assert!(found.is_none_or(|dir| !dir.starts_with(tmp.path())));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_back_to_ancestor_stops_the_walk() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("base");
        fs::create_dir_all(&base).unwrap();
        touch(&tmp.path().join(MARKER_FILENAME));
        // `base/loop` points back at `base`, so `base/loop` and `base` are the same directory.
        std::os::unix::fs::symlink(&base, base.join("loop")).unwrap();

        assert_eq!(find_context_root(&base.join("loop").join("file")), None);
    }
}
