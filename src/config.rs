//! Application configuration.
//!
//! Settings are read from a TOML file and cover where the extension map
//! lives and which directory entries are left out of a run:
//!
//! ```toml
//! mapping_file = "/home/me/extension_map.txt"
//!
//! [filters]
//! enable_hidden_files = true
//!
//! [filters.exclude]
//! filenames = ["Thumbs.db", "desktop.ini"]
//! patterns = ["*.part", "~$*"]
//! extensions = ["crdownload"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```
//!
//! Every key is optional. An empty file yields the defaults, which exclude
//! nothing.

use crate::extension_map;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const LOCAL_CONFIG_FILE: &str = ".extsortrc.toml";

/// Errors that can occur while loading configuration or compiling filters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern { pattern: String, reason: String },

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("IO error reading configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level configuration file contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Location of the extension map. Falls back to
    /// [`extension_map::default_mapping_path`] when unset.
    pub mapping_file: Option<PathBuf>,

    /// Rules deciding which entries a run leaves alone.
    pub filters: FilterRules,
}

/// Filter rules applied to the immediate entries of the target directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Whether names starting with "." take part in a run.
    pub enable_hidden_files: bool,
    pub exclude: ExcludeRules,
    /// Whitelist that wins over every exclude rule.
    pub include: IncludeRules,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: true,
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for excluding entries from a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeRules {
    /// Exact file names.
    pub filenames: Vec<String>,
    /// Glob patterns matched against the entry name.
    pub patterns: Vec<String>,
    /// Extensions, without the dot, matched case-insensitively.
    pub extensions: Vec<String>,
    /// Regular expressions matched against the entry name.
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludeRules {
    pub patterns: Vec<String>,
}

impl AppConfig {
    /// Load configuration, falling back to defaults.
    ///
    /// Lookup order:
    /// 1. `config_path`, when given (it must exist)
    /// 2. `.extsortrc.toml` in the current directory
    /// 3. `~/.config/extsort/config.toml`
    /// 4. built-in defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the selected file cannot be read or parsed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("extsort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Resolves the extension map location. An explicit override wins over
    /// the configured `mapping_file`.
    pub fn mapping_path(&self, override_path: Option<&Path>) -> PathBuf {
        override_path
            .map(Path::to_path_buf)
            .or_else(|| self.mapping_file.clone())
            .unwrap_or_else(extension_map::default_mapping_path)
    }
}

impl FilterRules {
    /// Compile the rules into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob or regex pattern is invalid.
    pub fn compile(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(self)
    }
}

/// Pre-compiled filter rules.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|e| ConfigError::InvalidGlobPattern {
                pattern: pattern.clone(),
                reason: e.msg.to_string(),
            })
        })
        .collect()
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Check whether an entry name takes part in a run.
    ///
    /// Include patterns are checked first and always win. After that the
    /// entry is dropped if it is hidden (and hidden files are disabled), or
    /// matches an excluded name, extension, glob or regex.
    pub fn should_include(&self, name: &str) -> bool {
        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches(name))
        {
            return true;
        }

        if !self.enable_hidden_files && name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(name) {
            return false;
        }

        if let Some(ext) = Path::new(name).extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches(name))
        {
            return false;
        }

        !self.exclude_regexes.iter().any(|regex| regex.is_match(name))
    }
}
