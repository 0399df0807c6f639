//! Directory organization engine.
//!
//! A run scans the immediate entries of one directory, classifies every
//! file by its extension through an [`ExtensionMapping`] and moves it into
//! the mapped subfolder of that same directory. Directories are never moved
//! or descended into. A failure on one file is recorded in the run result
//! and the run carries on with the next entry.
//!
//! # Examples
//!
//! ```
//! use extsort::extension_map::ExtensionMapping;
//! use extsort::file_organizer::{classify, Classification};
//!
//! let mapping = ExtensionMapping::parse("PDF=Documents/PDF Files");
//!
//! assert_eq!(classify("notes.pdf", &mapping).folder(), Some("Documents/PDF Files"));
//! assert_eq!(classify("photo.jpg", &mapping).folder(), Some("Other_JPG"));
//! assert_eq!(classify("README", &mapping), Classification::NoExtension);
//! ```

use crate::config::CompiledFilters;
use crate::extension_map::ExtensionMapping;
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Prefix of the folder used for extensions missing from the mapping.
pub const FALLBACK_PREFIX: &str = "Other_";

/// Result of classifying a single file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The name has no usable extension, so the file stays where it is.
    NoExtension,
    /// The file belongs in `folder`, relative to the organized directory.
    Destination { extension: String, folder: String },
}

impl Classification {
    /// The uppercase extension, or an empty string.
    pub fn extension(&self) -> &str {
        match self {
            Self::NoExtension => "",
            Self::Destination { extension, .. } => extension,
        }
    }

    pub fn folder(&self) -> Option<&str> {
        match self {
            Self::NoExtension => None,
            Self::Destination { folder, .. } => Some(folder),
        }
    }
}

/// Extracts the uppercase extension of a file name.
///
/// The extension is the text after the last `.`. Leading dots belong to the
/// name, so `.bashrc` has no extension, while `.config.json` has `JSON`.
/// A trailing dot yields no extension.
///
/// ```
/// use extsort::file_organizer::extension_of;
///
/// assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("GZ"));
/// assert_eq!(extension_of(".bashrc"), None);
/// assert_eq!(extension_of("draft."), None);
/// ```
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, extension) = filename.trim_start_matches('.').rsplit_once('.')?;
    if extension.is_empty() {
        None
    } else {
        Some(extension.to_uppercase())
    }
}

/// Chooses the destination folder for a file name.
///
/// Mapped extensions use their mapped folder; unmapped ones fall back to
/// `Other_<EXT>`.
pub fn classify(filename: &str, mapping: &ExtensionMapping) -> Classification {
    match extension_of(filename) {
        None => Classification::NoExtension,
        Some(extension) => {
            let folder = mapping
                .get(&extension)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{FALLBACK_PREFIX}{extension}"));
            Classification::Destination { extension, folder }
        }
    }
}

/// One organize action: the directory to tidy and the rules to apply.
#[derive(Debug, Clone, Copy)]
pub struct OrganizeRequest<'a> {
    pub directory: &'a Path,
    pub mapping: &'a ExtensionMapping,
}

impl<'a> OrganizeRequest<'a> {
    pub fn new(directory: &'a Path, mapping: &'a ExtensionMapping) -> Self {
        Self { directory, mapping }
    }
}

/// What happened to one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum OutcomeStatus {
    Moved,
    SkippedDirectory,
    SkippedNoExtension,
    /// Left out by the configured filter rules.
    SkippedExcluded,
    SkippedMoveError,
}

impl OutcomeStatus {
    pub fn is_skipped(&self) -> bool {
        !matches!(self, Self::Moved)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Moved => "moved",
            Self::SkippedDirectory => "directory",
            Self::SkippedNoExtension => "no extension",
            Self::SkippedExcluded => "excluded",
            Self::SkippedMoveError => "error",
        }
    }
}

/// Per-entry record of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    /// Entry name as listed in the directory.
    pub name: String,
    /// Uppercase extension, empty when none was resolved.
    pub extension: String,
    /// Destination folder relative to the organized directory.
    pub destination: Option<String>,
    pub status: OutcomeStatus,
    /// Cause of a `SkippedMoveError`.
    pub error: Option<String>,
}

impl FileOutcome {
    fn skipped(name: String, status: OutcomeStatus) -> Self {
        Self {
            name,
            extension: String::new(),
            destination: None,
            status,
            error: None,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizeResult {
    pub directory: PathBuf,
    pub moved_count: usize,
    /// Every entry that was not moved, whatever the reason.
    pub skipped_count: usize,
    /// Outcomes in directory enumeration order.
    pub outcomes: Vec<FileOutcome>,
    pub completed_at: DateTime<Local>,
    /// Set when the run stopped early on a cancellation request.
    pub cancelled: bool,
}

impl OrganizeResult {
    fn from_outcomes(directory: PathBuf, outcomes: Vec<FileOutcome>, cancelled: bool) -> Self {
        let moved_count = outcomes
            .iter()
            .filter(|outcome| outcome.status == OutcomeStatus::Moved)
            .count();

        Self {
            directory,
            moved_count,
            skipped_count: outcomes.len() - moved_count,
            outcomes,
            completed_at: Local::now(),
            cancelled,
        }
    }

    pub fn count_by_status(&self, status: OutcomeStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    }

    /// Number of moved files per destination folder.
    pub fn moved_by_destination(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for outcome in &self.outcomes {
            if outcome.status == OutcomeStatus::Moved
                && let Some(folder) = &outcome.destination
            {
                *counts.entry(folder.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == OutcomeStatus::SkippedMoveError)
    }
}

/// Errors that abort a whole run. Nothing has been moved when one is returned.
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("Directory not found: {}", .path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("Not a directory: {}", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("Failed to read directory {}: {source}", .path.display())]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a single file could not be moved.
#[derive(Debug, Error)]
pub enum MoveError {
    /// Empty, absolute, or climbing out of the organized directory.
    #[error("invalid destination folder '{folder}'")]
    InvalidDestination { folder: String },

    #[error("failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Creation of this destination already failed earlier in the run.
    #[error("destination {} is unavailable: {reason}", .path.display())]
    DestinationUnavailable { path: PathBuf, reason: String },

    #[error("destination {} resolves outside the organized directory", .path.display())]
    OutsideTarget { path: PathBuf },

    #[error("{} already exists", .path.display())]
    DestinationExists { path: PathBuf },

    #[error("failed to move to {}: {source}", .destination.display())]
    MoveFailed {
        destination: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Planned handling of one entry, computed without touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Move { extension: String, folder: String },
    SkipDirectory,
    SkipNoExtension,
    SkipExcluded,
}

#[derive(Debug, Clone)]
pub struct PlannedEntry {
    pub name: String,
    pub path: PathBuf,
    pub action: PlannedAction,
}

/// Classified listing of a directory, in enumeration order.
#[derive(Debug, Clone)]
pub struct OrganizePlan {
    pub directory: PathBuf,
    pub entries: Vec<PlannedEntry>,
}

impl OrganizePlan {
    /// Entries that would be moved.
    pub fn moves(&self) -> impl Iterator<Item = &PlannedEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.action, PlannedAction::Move { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.entries.len() - self.moves().count()
    }

    /// Number of files that would land in each destination folder.
    pub fn count_by_folder(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            if let PlannedAction::Move { folder, .. } = &entry.action {
                *counts.entry(folder.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Receives progress notifications during a run.
pub trait ProgressSink {
    /// Called once, after listing, with the number of entries to process.
    fn on_start(&mut self, _total: usize) {}

    /// Called after each entry has been handled.
    fn on_outcome(&mut self, _outcome: &FileOutcome) {}

    fn on_finish(&mut self, _result: &OrganizeResult) {}
}

/// Sink that ignores every notification.
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Destination bookkeeping for a single run.
struct RunState {
    root: PathBuf,
    created: HashSet<PathBuf>,
    failed: HashMap<PathBuf, String>,
}

/// Moves the files of a directory into their mapped subfolders.
///
/// The organizer holds no state between runs; every call to
/// [`FileOrganizer::organize`] is independent. Runs are blocking and
/// sequential. Callers that need responsiveness run them on a worker
/// thread and stop them through the cancel flag, which is checked between
/// entries.
#[derive(Default)]
pub struct FileOrganizer {
    filters: Option<CompiledFilters>,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl FileOrganizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries rejected by `filters` are recorded as `SkippedExcluded`.
    pub fn with_filters(mut self, filters: CompiledFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    /// Lists and classifies the entries of the target directory without
    /// changing anything on disk.
    ///
    /// # Errors
    ///
    /// Fails if the directory is missing, is not a directory, or cannot be
    /// listed.
    pub fn plan(&self, request: &OrganizeRequest<'_>) -> Result<OrganizePlan, OrganizeError> {
        let directory = request.directory;
        check_target(directory)?;

        let entries = fs::read_dir(directory).map_err(|source| OrganizeError::ReadDirectory {
            path: directory.to_path_buf(),
            source,
        })?;

        let mut planned = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => planned.push(self.plan_entry(&entry, request.mapping)),
                Err(e) => warn!("Skipping unreadable entry in {}: {}", directory.display(), e),
            }
        }

        Ok(OrganizePlan {
            directory: directory.to_path_buf(),
            entries: planned,
        })
    }

    fn plan_entry(&self, entry: &fs::DirEntry, mapping: &ExtensionMapping) -> PlannedEntry {
        let name = entry.file_name().to_string_lossy().into_owned();

        let action = if is_directory(entry) {
            PlannedAction::SkipDirectory
        } else if self
            .filters
            .as_ref()
            .is_some_and(|filters| !filters.should_include(&name))
        {
            PlannedAction::SkipExcluded
        } else {
            match classify(&name, mapping) {
                Classification::NoExtension => PlannedAction::SkipNoExtension,
                Classification::Destination { extension, folder } => {
                    PlannedAction::Move { extension, folder }
                }
            }
        };

        PlannedEntry {
            name,
            path: entry.path(),
            action,
        }
    }

    /// Organizes the target directory.
    ///
    /// # Errors
    ///
    /// Only target-level problems are errors; see [`FileOrganizer::plan`].
    /// Per-file failures are reported as `SkippedMoveError` outcomes.
    pub fn organize(&self, request: &OrganizeRequest<'_>) -> Result<OrganizeResult, OrganizeError> {
        self.organize_with_progress(request, &mut NoProgress)
    }

    /// Organizes the target directory, reporting each outcome to `sink`.
    pub fn organize_with_progress(
        &self,
        request: &OrganizeRequest<'_>,
        sink: &mut dyn ProgressSink,
    ) -> Result<OrganizeResult, OrganizeError> {
        let plan = self.plan(request)?;
        let directory = plan.directory;

        let mut state = RunState {
            root: fs::canonicalize(&directory).unwrap_or_else(|_| directory.clone()),
            created: HashSet::new(),
            failed: HashMap::new(),
        };

        sink.on_start(plan.entries.len());

        let mut outcomes = Vec::with_capacity(plan.entries.len());
        let mut cancelled = false;

        for entry in plan.entries {
            if self.is_cancelled() {
                warn!(
                    "Run on {} cancelled after {} entries",
                    directory.display(),
                    outcomes.len()
                );
                cancelled = true;
                break;
            }

            let outcome = execute_entry(&directory, entry, &mut state);
            sink.on_outcome(&outcome);
            outcomes.push(outcome);
        }

        let result = OrganizeResult::from_outcomes(directory, outcomes, cancelled);
        info!(
            "Organized {}: {} moved, {} skipped",
            result.directory.display(),
            result.moved_count,
            result.skipped_count
        );
        sink.on_finish(&result);

        Ok(result)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

fn check_target(directory: &Path) -> Result<(), OrganizeError> {
    match fs::metadata(directory) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(OrganizeError::NotADirectory {
            path: directory.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(OrganizeError::DirectoryNotFound {
            path: directory.to_path_buf(),
        }),
        Err(source) => Err(OrganizeError::ReadDirectory {
            path: directory.to_path_buf(),
            source,
        }),
    }
}

/// Directories, and links pointing at directories, are never moved.
fn is_directory(entry: &fs::DirEntry) -> bool {
    match entry.file_type() {
        Ok(file_type) if file_type.is_dir() => true,
        Ok(file_type) if file_type.is_symlink() => {
            fs::metadata(entry.path()).is_ok_and(|metadata| metadata.is_dir())
        }
        _ => false,
    }
}

fn execute_entry(base_path: &Path, entry: PlannedEntry, state: &mut RunState) -> FileOutcome {
    let PlannedEntry { name, path, action } = entry;

    let (extension, folder) = match action {
        PlannedAction::SkipDirectory => {
            return FileOutcome::skipped(name, OutcomeStatus::SkippedDirectory);
        }
        PlannedAction::SkipNoExtension => {
            return FileOutcome::skipped(name, OutcomeStatus::SkippedNoExtension);
        }
        PlannedAction::SkipExcluded => {
            return FileOutcome::skipped(name, OutcomeStatus::SkippedExcluded);
        }
        PlannedAction::Move { extension, folder } => (extension, folder),
    };

    let (status, error) = match move_to_folder(base_path, &path, &folder, state) {
        Ok(destination) => {
            debug!("Moved {} to {}", name, destination.display());
            (OutcomeStatus::Moved, None)
        }
        Err(e) => {
            warn!("Could not move {}: {}", name, e);
            (OutcomeStatus::SkippedMoveError, Some(e.to_string()))
        }
    };

    FileOutcome {
        name,
        extension,
        destination: Some(folder),
        status,
        error,
    }
}

/// Moves `file_path` into `base_path/folder`, creating the folder as needed.
/// Returns the new path of the file.
fn move_to_folder(
    base_path: &Path,
    file_path: &Path,
    folder: &str,
    state: &mut RunState,
) -> Result<PathBuf, MoveError> {
    let folder_path = destination_dir(base_path, folder)?;
    ensure_destination(&folder_path, state)?;

    let file_name = file_path
        .file_name()
        .ok_or_else(|| MoveError::InvalidDestination {
            folder: folder.to_string(),
        })?;
    let destination = folder_path.join(file_name);

    if fs::symlink_metadata(&destination).is_ok() {
        return Err(MoveError::DestinationExists { path: destination });
    }

    move_file(file_path, &destination).map_err(|source| MoveError::MoveFailed {
        destination: destination.clone(),
        source,
    })?;

    Ok(destination)
}

/// Joins a mapped folder onto the base path, refusing anything that would
/// leave it.
fn destination_dir(base_path: &Path, folder: &str) -> Result<PathBuf, MoveError> {
    let relative = Path::new(folder);
    let mut components = relative.components().peekable();

    let valid = components.peek().is_some()
        && components.all(|component| matches!(component, Component::Normal(_) | Component::CurDir));

    if !valid || relative.components().all(|c| c == Component::CurDir) {
        return Err(MoveError::InvalidDestination {
            folder: folder.to_string(),
        });
    }

    Ok(base_path.join(relative))
}

fn ensure_destination(folder_path: &Path, state: &mut RunState) -> Result<(), MoveError> {
    if state.created.contains(folder_path) {
        return Ok(());
    }

    if let Some(reason) = state.failed.get(folder_path) {
        return Err(MoveError::DestinationUnavailable {
            path: folder_path.to_path_buf(),
            reason: reason.clone(),
        });
    }

    if let Err(source) = fs::create_dir_all(folder_path) {
        state
            .failed
            .insert(folder_path.to_path_buf(), source.to_string());
        return Err(MoveError::DirectoryCreationFailed {
            path: folder_path.to_path_buf(),
            source,
        });
    }

    // An existing subfolder may be a link that points elsewhere.
    let resolved = fs::canonicalize(folder_path).map_err(|source| {
        MoveError::DirectoryCreationFailed {
            path: folder_path.to_path_buf(),
            source,
        }
    })?;
    if !resolved.starts_with(&state.root) {
        state.failed.insert(
            folder_path.to_path_buf(),
            "resolves outside the organized directory".to_string(),
        );
        return Err(MoveError::OutsideTarget {
            path: folder_path.to_path_buf(),
        });
    }

    state.created.insert(folder_path.to_path_buf());
    Ok(())
}

/// Renames `source` to `destination`, copying across filesystems when a
/// plain rename is not possible.
fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => copy_then_remove(source, destination),
        other => other,
    }
}

/// Cross-device move. Never replaces an existing destination, keeps links
/// as links, and leaves only the source behind on failure.
fn copy_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(source)?;
    if metadata.file_type().is_symlink() {
        copy_link(source, destination)?;
    } else {
        copy_contents(source, destination, &metadata)?;
    }

    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(destination);
        return Err(e);
    }
    Ok(())
}

fn copy_contents(source: &Path, destination: &Path, metadata: &fs::Metadata) -> io::Result<()> {
    let mut reader = fs::File::open(source)?;
    let mut writer = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;

    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|n| writer.set_permissions(metadata.permissions()).map(|()| n))
        .and_then(|n| writer.sync_all().map(|()| n));
    drop(writer);

    match copied {
        Ok(n) if n == metadata.len() => Ok(()),
        Ok(n) => {
            let _ = fs::remove_file(destination);
            Err(io::Error::other(format!(
                "copy verification failed: source {} bytes, destination {n} bytes",
                metadata.len()
            )))
        }
        Err(e) => {
            let _ = fs::remove_file(destination);
            Err(e)
        }
    }
}

#[cfg(unix)]
fn copy_link(source: &Path, destination: &Path) -> io::Result<()> {
    let mut target = fs::read_link(source)?;
    // Relative targets resolve against the link's own folder.
    if target.is_relative()
        && let Some(parent) = source.parent()
    {
        target = parent.join(target);
    }
    std::os::unix::fs::symlink(target, destination)
}

#[cfg(not(unix))]
fn copy_link(_source: &Path, _destination: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "cannot move a link across filesystems",
    ))
}
