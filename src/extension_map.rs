//! Extension-to-folder mapping and its persisted text resource.
//!
//! The resource is a plain text file holding one `EXTENSION=destination` rule
//! per line. Blank lines and lines starting with `#` are ignored, and only the
//! first `=` of a line separates the extension from its destination folder.
//!
//! # Examples
//!
//! ```
//! use extsort::extension_map::ExtensionMapping;
//!
//! let mapping = ExtensionMapping::parse("pdf = Documents/PDF Files\n# comment\nJPG=Images");
//! assert_eq!(mapping.get("PDF"), Some("Documents/PDF Files"));
//! assert_eq!(mapping.get("jpg"), Some("Images"));
//! assert_eq!(mapping.len(), 2);
//! ```

use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Rule table written when no resource exists yet.
pub const DEFAULT_EXTENSION_MAP: &str = include_str!("../assets/default_extension_map.txt");

/// File name of the mapping resource inside the application directory.
pub const MAPPING_FILE_NAME: &str = "extension_map.txt";

/// Errors raised while reading or writing the mapping resource.
#[derive(Debug, Error)]
pub enum MappingError {
    /// The default resource could not be created.
    #[error("Failed to create extension map {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The resource exists but could not be read.
    #[error("Failed to read extension map {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The resource could not be replaced.
    #[error("Failed to write extension map {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Table from uppercase extension (no leading dot) to destination folder.
///
/// Keys are unique after normalization; inserting an extension that is
/// already present replaces its destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtensionMapping {
    rules: BTreeMap<String, String>,
}

impl ExtensionMapping {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses mapping text.
    ///
    /// Each line is trimmed. Empty lines, comment lines and lines without
    /// an `=` are skipped, as are lines with an empty extension. When the
    /// same extension appears twice the later line wins.
    pub fn parse(text: &str) -> Self {
        let mut mapping = Self::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((extension, folder)) = line.split_once('=')
                && !extension.trim().is_empty()
            {
                mapping.insert(extension, folder);
            }
        }

        mapping
    }

    /// Adds or replaces a rule, returning the previous destination if any.
    pub fn insert(&mut self, extension: &str, folder: &str) -> Option<String> {
        self.rules
            .insert(normalize_extension(extension), folder.trim().to_string())
    }

    /// Looks up the destination folder for an extension, case-insensitively.
    pub fn get(&self, extension: &str) -> Option<&str> {
        self.rules
            .get(&normalize_extension(extension))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterates over `(extension, folder)` pairs ordered by extension.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules.iter().map(|(ext, folder)| (ext.as_str(), folder.as_str()))
    }
}

/// Normalizes an extension key: surrounding whitespace removed, uppercased.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().to_uppercase()
}

/// Writes the built-in default table to `path` if nothing exists there.
///
/// Returns `true` when the default was written. An existing resource is
/// never overwritten, including one created concurrently while the default
/// was being staged. Missing parent directories are created.
///
/// # Errors
///
/// Returns `MappingError::Create` if the directory or file cannot be created.
pub fn ensure_resource(path: &Path) -> Result<bool, MappingError> {
    if path.exists() {
        return Ok(false);
    }

    let create_error = |source| MappingError::Create {
        path: path.to_path_buf(),
        source,
    };

    let parent = parent_dir(path);
    fs::create_dir_all(parent).map_err(create_error)?;

    let mut staged = NamedTempFile::new_in(parent).map_err(create_error)?;
    staged
        .write_all(DEFAULT_EXTENSION_MAP.as_bytes())
        .map_err(create_error)?;
    let permissions = default_permissions(staged.as_file()).map_err(create_error)?;
    staged
        .as_file()
        .set_permissions(permissions)
        .map_err(create_error)?;

    match staged.persist_noclobber(path) {
        Ok(_) => {
            info!("Wrote default extension map to {}", path.display());
            Ok(true)
        }
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(create_error(e.error)),
    }
}

/// Loads the mapping stored at `path`, creating the default resource first
/// if none exists.
///
/// # Errors
///
/// Returns a `MappingError` if the resource cannot be created or read.
pub fn load(path: &Path) -> Result<ExtensionMapping, MappingError> {
    let text = load_text(path)?;
    let mapping = ExtensionMapping::parse(&text);
    info!(
        "Loaded {} extension rules from {}",
        mapping.len(),
        path.display()
    );
    Ok(mapping)
}

/// Returns the raw resource text, creating the default resource first if
/// none exists. This is what a settings editor shows to the user.
pub fn load_text(path: &Path) -> Result<String, MappingError> {
    ensure_resource(path)?;
    fs::read_to_string(path).map_err(|source| MappingError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Replaces the resource at `path` with `text`.
///
/// The text is not validated. It is written to a temporary file next to the
/// resource and renamed over it, so a failed write leaves the previous
/// resource intact. The replacement keeps the permissions of the file it
/// replaces, and a linked resource is updated through the link.
///
/// # Errors
///
/// Returns `MappingError::Write` if the new content cannot be written.
pub fn save(path: &Path, text: &str) -> Result<(), MappingError> {
    let write_error = |source| MappingError::Write {
        path: path.to_path_buf(),
        source,
    };

    let target = match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_symlink() => {
            fs::canonicalize(path).map_err(write_error)?
        }
        _ => path.to_path_buf(),
    };

    let mut staged = NamedTempFile::new_in(parent_dir(&target)).map_err(write_error)?;
    staged.write_all(text.as_bytes()).map_err(write_error)?;
    let permissions = match fs::metadata(&target) {
        Ok(metadata) => metadata.permissions(),
        Err(_) => default_permissions(staged.as_file()).map_err(write_error)?,
    };
    staged
        .as_file()
        .set_permissions(permissions)
        .map_err(write_error)?;
    staged.as_file().sync_all().map_err(write_error)?;
    staged.persist(&target).map_err(|e| write_error(e.error))?;

    debug!("Saved extension map to {}", path.display());
    Ok(())
}

/// Default location of the mapping resource.
///
/// Uses `~/.config/extsort/extension_map.txt` when `HOME` is set, otherwise
/// the directory holding the executable.
pub fn default_mapping_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("extsort")
            .join(MAPPING_FILE_NAME);
    }

    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(MAPPING_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(MAPPING_FILE_NAME))
}

/// Mode of a freshly created resource. Temporary files start owner-only.
#[cfg(unix)]
fn default_permissions(_staged: &fs::File) -> io::Result<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions(staged: &fs::File) -> io::Result<fs::Permissions> {
    Ok(staged.metadata()?.permissions())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_skips_comments_blank_lines_and_lines_without_separator() {
        let text = "\n# PDF=Ignored\n   \nPDF=Documents/PDF Files\njust some words\n  # indented comment\n";
        let mapping = ExtensionMapping::parse(text);

        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("PDF"), Some("Documents/PDF Files"));
    }

    #[test]
    fn test_parse_trims_and_uppercases_keys() {
        let mapping = ExtensionMapping::parse("  mp3 =  Audio/MP3 Audio  ");
        assert_eq!(mapping.iter().collect::<Vec<_>>(), vec![("MP3", "Audio/MP3 Audio")]);
    }

    #[test]
    fn test_parse_splits_on_first_equals_only() {
        let mapping = ExtensionMapping::parse("TXT=Notes=Drafts");
        assert_eq!(mapping.get("TXT"), Some("Notes=Drafts"));
    }

    #[test]
    fn test_parse_last_duplicate_wins() {
        let mapping = ExtensionMapping::parse("pdf=First\nPDF=Second\n Pdf = Third");
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("pdf"), Some("Third"));
    }

    #[test]
    fn test_parse_ignores_empty_extension() {
        let mapping = ExtensionMapping::parse("=Nowhere\nZIP=Archives");
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn test_parse_without_rules_is_empty() {
        assert!(ExtensionMapping::parse("# nothing here\n\n").is_empty());
    }

    #[test]
    fn test_default_table_is_usable() {
        let mapping = ExtensionMapping::parse(DEFAULT_EXTENSION_MAP);

        assert!(mapping.len() >= 140);
        assert_eq!(mapping.get("pdf"), Some("Documents/PDF Files"));
        assert_eq!(mapping.get("jpeg"), Some("Images/JPG Images"));
        assert_eq!(mapping.get("7z"), Some("Archives/7Z Archives"));
        assert_eq!(mapping.get("ts"), Some("Code/TypeScript"));
    }

    #[test]
    fn test_ensure_resource_writes_default_once() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("nested").join(MAPPING_FILE_NAME);

        assert!(ensure_resource(&path).expect("Failed to create resource"));
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_EXTENSION_MAP);

        fs::write(&path, "PDF=Mine").unwrap();
        assert!(!ensure_resource(&path).expect("Second call failed"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "PDF=Mine");
    }

    #[test]
    fn test_load_missing_resource_uses_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(MAPPING_FILE_NAME);

        let mapping = load(&path).expect("Failed to load mapping");

        assert!(path.exists());
        assert_eq!(mapping, ExtensionMapping::parse(DEFAULT_EXTENSION_MAP));
    }

    #[test]
    fn test_save_then_load_matches_parse() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(MAPPING_FILE_NAME);
        let text = "# custom\nPDF=Docs\n\nraw = Photos/Raw\nPDF=Docs/Final\n";

        save(&path, text).expect("Failed to save");

        assert_eq!(load(&path).unwrap(), ExtensionMapping::parse(text));
        assert_eq!(load_text(&path).unwrap(), text);
    }

    #[test]
    fn test_save_replaces_existing_resource() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(MAPPING_FILE_NAME);

        ensure_resource(&path).unwrap();
        save(&path, "TXT=Text").unwrap();

        let mapping = load(&path).unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("txt"), Some("Text"));
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("missing").join(MAPPING_FILE_NAME);

        let result = save(&path, "PDF=Docs");
        assert!(matches!(result, Err(MappingError::Write { .. })));
    }

    #[test]
    fn test_load_directory_as_resource_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let result = load(temp_dir.path());
        assert!(matches!(result, Err(MappingError::Read { .. })));
    }

    #[test]
    fn test_ensure_resource_under_a_file_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let blocker = temp_dir.path().join("file.txt");
        fs::write(&blocker, "not a folder").unwrap();
        let path = blocker.join(MAPPING_FILE_NAME);

        assert!(matches!(ensure_resource(&path), Err(MappingError::Create { .. })));
        assert!(matches!(load(&path), Err(MappingError::Create { .. })));
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "not a folder");
    }

    #[test]
    #[cfg(unix)]
    fn test_default_resource_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(MAPPING_FILE_NAME);

        ensure_resource(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    #[cfg(unix)]
    fn test_save_keeps_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(MAPPING_FILE_NAME);
        fs::write(&path, "PDF=Docs").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        save(&path, "PDF=Papers").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        assert_eq!(fs::read_to_string(&path).unwrap(), "PDF=Papers");
    }

    #[test]
    #[cfg(unix)]
    fn test_save_through_linked_resource_keeps_link() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let shared = temp_dir.path().join("dotfiles");
        fs::create_dir(&shared).unwrap();
        let real = shared.join(MAPPING_FILE_NAME);
        fs::write(&real, "PDF=Docs").unwrap();
        let link = temp_dir.path().join(MAPPING_FILE_NAME);
        std::os::unix::fs::symlink(&real, &link).unwrap();

        save(&link, "PDF=Papers").unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "PDF=Papers");
        assert_eq!(load(&link).unwrap().get("PDF"), Some("Papers"));
    }
}
