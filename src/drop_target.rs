//! Turns a raw path payload into a validated target directory.
//!
//! File managers hand over dropped items as a single string: one path, a
//! newline separated list, or a Tk-style list where paths containing spaces
//! are wrapped in braces (`{C:/My Files} C:/Other`). The organizer only ever
//! receives the directory this module picks.

use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]*)\}|(\S+)").expect("list item pattern is valid"));

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("No path was given")]
    Empty,

    #[error("Path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Not a folder: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Cannot access folder {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Splits a payload into candidate paths.
///
/// ```
/// use extsort::drop_target::candidates;
///
/// assert_eq!(candidates("/home/me/My Files"), vec!["/home/me/My Files"]);
/// assert_eq!(candidates("{/a b} /c"), vec!["/a b", "/c"]);
/// assert_eq!(candidates("/a b\n/c\n"), vec!["/a b", "/c"]);
/// ```
pub fn candidates(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    if raw.contains('{') {
        return LIST_ITEM
            .captures_iter(raw)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();
    }

    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Picks the first directory named in `raw` and validates it.
///
/// A line that is not a directory as a whole is also tried as a whitespace
/// separated list, so `/a /b` resolves to `/a` or `/b`. When nothing names a
/// directory, the first candidate is validated so the error names what the
/// user actually supplied.
pub fn resolve_target(raw: &str) -> Result<PathBuf, TargetError> {
    let items = candidates(raw);
    let chosen = items
        .iter()
        .map(String::as_str)
        .find(|item| Path::new(item).is_dir())
        .or_else(|| {
            items
                .iter()
                .flat_map(|item| item.split_whitespace())
                .find(|token| Path::new(token).is_dir())
        })
        .or_else(|| items.first().map(String::as_str))
        .ok_or(TargetError::Empty)?;

    validate_directory(Path::new(chosen))
}

/// Checks that `path` exists, is a directory and can be listed.
pub fn validate_directory(path: &Path) -> Result<PathBuf, TargetError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => TargetError::PathNotFound(path.to_path_buf()),
        _ => TargetError::Unreadable {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    if !metadata.is_dir() {
        return Err(TargetError::NotADirectory(path.to_path_buf()));
    }

    fs::read_dir(path).map_err(|source| TargetError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_candidates_mixed_braced_and_bare() {
        assert_eq!(
            candidates("{C:/My Files/a.txt} C:/Downloads {C:/Other Dir}"),
            vec!["C:/My Files/a.txt", "C:/Downloads", "C:/Other Dir"]
        );
    }

    #[test]
    fn test_candidates_empty_payload() {
        assert!(candidates("   \n ").is_empty());
        assert!(matches!(resolve_target(""), Err(TargetError::Empty)));
    }

    #[test]
    fn test_resolve_picks_first_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("file one.txt");
        let folder = temp_dir.path().join("my folder");
        fs::write(&file, "x").unwrap();
        fs::create_dir(&folder).unwrap();

        let payload = format!("{{{}}} {{{}}}", file.display(), folder.display());
        assert_eq!(resolve_target(&payload).unwrap(), folder);
    }

    #[test]
    fn test_resolve_single_path_with_spaces() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let folder = temp_dir.path().join("holiday photos");
        fs::create_dir(&folder).unwrap();

        let payload = format!("  {}\n", folder.display());
        assert_eq!(resolve_target(&payload).unwrap(), folder);
    }

    #[test]
    fn test_resolve_rejects_files_and_missing_paths() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "x").unwrap();

        let as_file = resolve_target(&file.display().to_string());
        assert!(matches!(as_file, Err(TargetError::NotADirectory(_))));

        let missing = temp_dir.path().join("nope");
        let as_missing = resolve_target(&missing.display().to_string());
        assert!(matches!(as_missing, Err(TargetError::PathNotFound(_))));
    }

    #[test]
    fn test_resolve_space_separated_paths() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("readme.txt");
        let first = temp_dir.path().join("inbox");
        let second = temp_dir.path().join("outbox");
        fs::write(&file, "x").unwrap();
        fs::create_dir(&first).unwrap();
        fs::create_dir(&second).unwrap();

        let payload = format!("{} {}", first.display(), second.display());
        assert_eq!(resolve_target(&payload).unwrap(), first);

        let payload = format!("{} {}", file.display(), second.display());
        assert_eq!(resolve_target(&payload).unwrap(), second);
    }
}
