//! Command-line interface for extsort.
//!
//! This module handles:
//! - Argument parsing
//! - Resolving the configuration and the extension map location
//! - Running or previewing an organize pass
//! - Inspecting and replacing the extension map

use crate::config::AppConfig;
use crate::drop_target::resolve_target;
use crate::extension_map;
use crate::file_organizer::{FileOrganizer, NoProgress, OrganizeRequest, classify};
use crate::output::{OutputFormatter, ProgressReporter};
use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Sort the files of a folder into subfolders by extension.
#[derive(Debug, Parser)]
#[command(name = "extsort", version, about)]
pub struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Extension map to use instead of the configured one.
    #[arg(short, long, global = true, value_name = "FILE")]
    pub mapping: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Move the files of a folder into their mapped subfolders.
    Organize {
        /// Folder to organize. A dropped-items payload is accepted too.
        target: String,

        /// Show what would happen without moving anything.
        #[arg(long)]
        dry_run: bool,

        /// Print the run result as JSON.
        #[arg(long, conflicts_with = "dry_run")]
        json: bool,

        /// List the outcome of every entry.
        #[arg(long)]
        details: bool,
    },
    /// Show the destination folder chosen for file names.
    Classify {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Create the extension map with default rules if it does not exist.
    Init,
    /// Print the extension map.
    Show,
    /// Replace the extension map with the contents of a file.
    Import { source: PathBuf },
}

/// Runs a parsed command line.
///
/// `cancel_flag` is handed to organize runs so an interrupt stops them
/// between files.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use extsort::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["extsort", "organize", "/home/me/Downloads", "--dry-run"]);
/// if let Err(e) = run_cli(&cli, None) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(cli: &Cli, cancel_flag: Option<Arc<AtomicBool>>) -> Result<(), String> {
    let config = AppConfig::load(cli.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    let mapping_path = config.mapping_path(cli.mapping.as_deref());

    match &cli.command {
        Command::Organize {
            target,
            dry_run,
            json,
            details,
        } => {
            let options = RunOptions {
                dry_run: *dry_run,
                json: *json,
                details: *details,
            };
            organize_directory(&config, &mapping_path, target, options, cancel_flag)
        }
        Command::Classify { names } => classify_names(&mapping_path, names),
        Command::Init => init_mapping(&mapping_path),
        Command::Show => show_mapping(&mapping_path),
        Command::Import { source } => import_mapping(&mapping_path, source),
    }
}

#[derive(Debug, Clone, Copy)]
struct RunOptions {
    dry_run: bool,
    json: bool,
    details: bool,
}

fn organize_directory(
    config: &AppConfig,
    mapping_path: &Path,
    target: &str,
    options: RunOptions,
    cancel_flag: Option<Arc<AtomicBool>>,
) -> Result<(), String> {
    let directory = resolve_target(target).map_err(|e| e.to_string())?;

    let mapping = extension_map::load(mapping_path)
        .map_err(|e| format!("Error loading extension map: {}", e))?;
    let filters = config
        .filters
        .compile()
        .map_err(|e| format!("Error compiling filters: {}", e))?;

    let mut organizer = FileOrganizer::new().with_filters(filters);
    if let Some(flag) = cancel_flag {
        organizer = organizer.with_cancel_flag(flag);
    }

    let request = OrganizeRequest::new(&directory, &mapping);

    if options.dry_run {
        let plan = organizer.plan(&request).map_err(|e| e.to_string())?;
        OutputFormatter::plan_summary(&plan);
        return Ok(());
    }

    if options.json {
        let result = organizer
            .organize_with_progress(&request, &mut NoProgress)
            .map_err(|e| e.to_string())?;
        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| format!("Error serializing result: {}", e))?;
        println!("{}", json);
        return Ok(());
    }

    OutputFormatter::info(&format!("Organizing contents of: {}", directory.display()));
    let result = organizer
        .organize_with_progress(&request, &mut ProgressReporter::new())
        .map_err(|e| e.to_string())?;
    OutputFormatter::run_summary(&result, options.details);

    if result.failures().next().is_some() {
        OutputFormatter::warning("Some files could not be organized. Please review errors above.");
    } else {
        OutputFormatter::success("Organization complete!");
    }

    Ok(())
}

fn classify_names(mapping_path: &Path, names: &[String]) -> Result<(), String> {
    let mapping = extension_map::load(mapping_path)
        .map_err(|e| format!("Error loading extension map: {}", e))?;

    for name in names {
        match classify(name, &mapping).folder() {
            Some(folder) => println!("{} → {}/", name, folder),
            None => println!("{} → (no extension, left in place)", name),
        }
    }

    Ok(())
}

fn init_mapping(mapping_path: &Path) -> Result<(), String> {
    let created = extension_map::ensure_resource(mapping_path).map_err(|e| e.to_string())?;

    if created {
        OutputFormatter::success(&format!(
            "Created default extension map at {}",
            mapping_path.display()
        ));
    } else {
        OutputFormatter::info(&format!(
            "Extension map already exists at {}",
            mapping_path.display()
        ));
    }

    Ok(())
}

fn show_mapping(mapping_path: &Path) -> Result<(), String> {
    let text = extension_map::load_text(mapping_path).map_err(|e| e.to_string())?;
    print!("{}", text);
    Ok(())
}

fn import_mapping(mapping_path: &Path, source: &Path) -> Result<(), String> {
    let text = fs::read_to_string(source)
        .map_err(|e| format!("Error reading {}: {}", source.display(), e))?;

    let rules = extension_map::ExtensionMapping::parse(&text);
    if rules.is_empty() {
        OutputFormatter::warning("The imported map has no rules; every file will go to Other_<EXT>.");
    }

    extension_map::save(mapping_path, &text).map_err(|e| e.to_string())?;
    OutputFormatter::success(&format!(
        "Saved {} rules to {}",
        rules.len(),
        mapping_path.display()
    ));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_organize_command() {
        let cli = Cli::try_parse_from(["extsort", "-vv", "organize", "/tmp/in", "--dry-run"])
            .expect("valid arguments");

        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Command::Organize { ref target, dry_run: true, json: false, details: false } if target == "/tmp/in"
        ));
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["extsort", "show", "--mapping", "/tmp/map.txt"])
            .expect("valid arguments");
        assert_eq!(cli.mapping, Some(PathBuf::from("/tmp/map.txt")));
    }

    #[test]
    fn test_json_conflicts_with_dry_run() {
        let result = Cli::try_parse_from(["extsort", "organize", "/tmp/in", "--dry-run", "--json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_classify_requires_names() {
        assert!(Cli::try_parse_from(["extsort", "classify"]).is_err());
    }
}
