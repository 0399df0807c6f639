//! Terminal output: colored status lines, the run progress bar and the
//! summary tables printed after a run or a dry run.

use crate::file_organizer::{
    FileOutcome, OrganizePlan, OrganizeResult, OutcomeStatus, PlannedAction, ProgressSink,
};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Prints user-facing messages with consistent styling.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message to stderr in red.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar for `total` directory entries.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints a two-column table of destination folders and file counts.
    pub fn folder_table(counts: &BTreeMap<String, usize>, total_label: &str, total: usize) {
        let width = counts
            .keys()
            .map(|name| name.chars().count())
            .max()
            .unwrap_or(0)
            .max(total_label.len())
            .max(11); // "Destination"

        println!("{:<width$} | {}", "Destination".bold(), "Files".bold());
        println!("{}", "-".repeat(width + 10));

        for (folder, count) in counts {
            println!(
                "{:<width$} | {} {}",
                folder,
                count.to_string().green(),
                plural(*count)
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            total_label.bold(),
            total.to_string().green().bold(),
            plural(total)
        );
    }

    /// Prints the outcome of a completed run.
    pub fn run_summary(result: &OrganizeResult, details: bool) {
        Self::header("SUMMARY");

        let moved = result.moved_by_destination();
        if !moved.is_empty() {
            Self::folder_table(&moved, "Moved", result.moved_count);
        }

        println!();
        println!("Files moved:   {}", result.moved_count.to_string().green());
        println!("Files skipped: {}", result.skipped_count.to_string().yellow());
        for status in [
            OutcomeStatus::SkippedDirectory,
            OutcomeStatus::SkippedNoExtension,
            OutcomeStatus::SkippedExcluded,
            OutcomeStatus::SkippedMoveError,
        ] {
            let count = result.count_by_status(status);
            if count > 0 {
                println!("  {:<13} {}", format!("{}:", status.label()), count);
            }
        }
        println!(
            "Completed at:  {}",
            result.completed_at.format("%Y-%m-%d %H:%M:%S")
        );

        let failures: Vec<_> = result.failures().collect();
        if !failures.is_empty() {
            Self::header("FAILED");
            for outcome in failures {
                Self::error(&format!(
                    "{}: {}",
                    outcome.name,
                    outcome.error.as_deref().unwrap_or("unknown error")
                ));
            }
        }

        if details {
            Self::header("DETAILS");
            for outcome in &result.outcomes {
                Self::plain_outcome(outcome);
            }
        }

        if result.cancelled {
            Self::warning("Run was interrupted; remaining files were left in place.");
        }
    }

    /// Prints what a run would do.
    pub fn plan_summary(plan: &OrganizePlan) {
        Self::dry_run_notice(&format!(
            "Files in {} would be organized as follows:",
            plan.directory.display()
        ));

        for entry in &plan.entries {
            match &entry.action {
                PlannedAction::Move { folder, .. } => {
                    println!(" - {}", entry.name);
                    println!("   → Would move to {}/", folder);
                }
                PlannedAction::SkipDirectory => {
                    println!(" - {} {}", entry.name, "(directory, skipped)".dimmed())
                }
                PlannedAction::SkipNoExtension => {
                    println!(" - {} {}", entry.name, "(no extension, skipped)".dimmed())
                }
                PlannedAction::SkipExcluded => {
                    println!(" - {} {}", entry.name, "(excluded, skipped)".dimmed())
                }
            }
        }

        let counts = plan.count_by_folder();
        if counts.is_empty() {
            Self::info("No files to organize.");
        } else {
            Self::header("DRY RUN SUMMARY");
            Self::folder_table(&counts, "Total", plan.moves().count());
        }
        println!("Skipped: {}", plan.skipped_count());
    }

    fn plain_outcome(outcome: &FileOutcome) {
        let destination = outcome
            .destination
            .as_deref()
            .map(|folder| format!(" → {}/", folder))
            .unwrap_or_default();
        let label = match outcome.status {
            OutcomeStatus::Moved => outcome.status.label().green(),
            OutcomeStatus::SkippedMoveError => outcome.status.label().red(),
            _ => outcome.status.label().yellow(),
        };
        println!(" - [{}] {}{}", label, outcome.name, destination);
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// Drives a progress bar from organizer notifications.
pub struct ProgressReporter {
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self { bar: None }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressReporter {
    fn on_start(&mut self, total: usize) {
        self.bar = Some(OutputFormatter::create_progress_bar(total as u64));
    }

    fn on_outcome(&mut self, outcome: &FileOutcome) {
        if let Some(bar) = &self.bar {
            bar.set_message(outcome.name.clone());
            bar.inc(1);
        }
    }

    fn on_finish(&mut self, result: &OrganizeResult) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message(format!("{} files organized", result.moved_count));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension_map::ExtensionMapping;
    use crate::file_organizer::{FileOrganizer, OrganizeRequest};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_progress_reporter_tracks_run() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        fs::write(temp_dir.path().join("b.txt"), "b").unwrap();

        let mapping = ExtensionMapping::new();
        let mut reporter = ProgressReporter::new();
        reporter.on_start(2);
        assert_eq!(reporter.bar.as_ref().map(|bar| bar.length()), Some(Some(2)));

        let result = FileOrganizer::new()
            .organize_with_progress(
                &OrganizeRequest::new(temp_dir.path(), &mapping),
                &mut reporter,
            )
            .unwrap();

        assert_eq!(result.moved_count, 2);
        assert!(reporter.bar.is_none());
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1), "file");
        assert_eq!(plural(0), "files");
        assert_eq!(plural(7), "files");
    }
}
