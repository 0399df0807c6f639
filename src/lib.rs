//! extsort - sort the files of a folder into subfolders by extension
//!
//! This library provides the editable extension-to-folder mapping and its
//! text resource, the engine that classifies and moves the immediate files
//! of a directory, configuration of entry filters, and the command-line
//! front end built on top of them.

pub mod cli;
pub mod config;
pub mod drop_target;
pub mod extension_map;
pub mod file_organizer;
pub mod output;
pub mod signal;

pub use config::{AppConfig, CompiledFilters, ConfigError};
pub use extension_map::{ExtensionMapping, MappingError};
pub use file_organizer::{
    FileOrganizer, FileOutcome, OrganizeError, OrganizeRequest, OrganizeResult, OutcomeStatus,
    classify,
};

pub use cli::{Cli, run_cli};
