//! Output formatting and styling module.
//!
//! All console output of the binary goes through here: colored status lines,
//! the progress bar for the execute phase, the end-of-run summary table and
//! the JSON rendering of a [`RunReport`]. Log lines go through `tracing` and
//! are not printed here.

use crate::report::RunReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

const PROGRESS_TEMPLATE: &str = "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidysort::output::OutputFormatter;
    /// OutputFormatter::success("Sorted 12 files");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark, on stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for the execute phase. The length is set by
    /// the engine once the plan is known.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidysort::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar();
    /// pb.set_length(10);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar() -> ProgressBar {
        let pb = ProgressBar::new(0);
        match ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
            Ok(style) => pb.set_style(style.progress_chars("█▓░")),
            Err(e) => tracing::debug!(error = %e, "Keeping default progress style"),
        }
        pb
    }

    /// Prints the per-bucket table followed by the run counters.
    pub fn summary_table(report: &RunReport) {
        Self::header(if report.dry_run {
            "SUMMARY (dry run)"
        } else {
            "SUMMARY"
        });

        let width = report
            .buckets
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {}",
            "Bucket".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));
        for (bucket, count) in &report.buckets {
            println!(
                "{:<width$} | {} {}",
                bucket,
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            report.moved.to_string().green().bold(),
            plural(report.moved),
            width = width
        );

        println!();
        let rows = [
            ("Scanned", report.scanned),
            ("Skipped", report.skipped),
            ("Duplicate groups", report.duplicate_groups),
            ("Duplicates removed", report.duplicates_removed),
            ("Duplicates linked", report.duplicates_linked),
            ("Directories swept", report.dirs_swept),
            ("Index links", report.links_created),
        ];
        for (label, value) in rows {
            println!("{:<20} {}", label, value);
        }
        let errors = report.errors.to_string();
        println!(
            "{:<20} {}",
            "Errors",
            if report.errors > 0 {
                errors.red().bold()
            } else {
                errors.normal()
            }
        );
    }

    /// Prints the whole human-readable report.
    pub fn print_report(report: &RunReport) {
        if report.dry_run {
            Self::dry_run_notice("No files were changed.");
            for planned in &report.preview {
                println!("  {}", planned);
            }
        }

        Self::summary_table(report);

        if !report.failures.is_empty() {
            Self::header("FAILURES");
            for failure in &report.failures {
                Self::error(&format!("{}: {}", failure.kind, failure.message));
            }
        }

        if report.cancelled {
            Self::warning("Cancelled before all entries were processed.");
        } else if report.errors == 0 {
            Self::success("Done.");
        } else {
            Self::warning("Finished with errors; see above.");
        }
    }

    /// Serializes the report as pretty JSON.
    pub fn report_json(report: &RunReport) -> serde_json::Result<String> {
        serde_json::to_string_pretty(report)
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
