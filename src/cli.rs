//! Command-line interface module for tidysort.
//!
//! This module handles:
//! - Argument parsing (`clap`)
//! - Merging command-line flags over configuration file values
//! - Running one organize pass and printing its report
//! - Mapping the report to a process exit code
//! - Writing a configuration template

use crate::config::{Config, LOCAL_CONFIG_NAME, LayoutKind};
use crate::engine::{OrganizeEngine, OrganizeOptions};
use crate::hasher::HashAlgorithm;
use crate::links::LINK_INDEX_DIR;
use crate::output::OutputFormatter;
use crate::plan::{DuplicatePolicy, Layout};
use crate::report::RunReport;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};

/// Exit code for a pass that completed (per-file errors included, unless strict).
pub const EXIT_OK: u8 = 0;
/// Exit code for a completed pass with per-file errors under `--strict`.
pub const EXIT_FILE_ERRORS: u8 = 1;
/// Exit code for a bad source path or unusable configuration.
pub const EXIT_FATAL: u8 = 2;

/// Sort the files of a directory into category, date or size folders.
#[derive(Debug, Clone, Parser)]
#[command(name = "tidysort", version)]
#[command(about = "Sort files into folders, with safe moves and duplicate detection")]
pub struct Args {
    /// Directory to organize
    #[arg(required_unless_present = "create_config")]
    pub source: Option<PathBuf>,

    /// Destination root (default: <SOURCE>/_sorted)
    #[arg(short, long)]
    pub destination: Option<PathBuf>,

    /// Descend into sub-directories
    #[arg(short, long)]
    pub recursive: bool,

    /// Show what would happen without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Delete duplicate files, keeping one copy per group
    #[arg(long, conflicts_with = "link_duplicates")]
    pub delete_duplicates: bool,

    /// Replace duplicate files with hard links to the kept copy
    #[arg(long)]
    pub link_duplicates: bool,

    /// Detect and count duplicates without acting on them
    #[arg(long)]
    pub report_duplicates: bool,

    /// Digest used for duplicate detection (sha256, md5)
    #[arg(long = "hash", value_name = "ALGORITHM")]
    pub hash_algorithm: Option<HashAlgorithm>,

    /// Number of threads used for hashing
    #[arg(long, value_name = "N")]
    pub hash_threads: Option<usize>,

    /// How files are grouped below the destination
    #[arg(long, value_enum)]
    pub layout: Option<LayoutKind>,

    /// strftime format for the date layout (default: %Y-%m)
    #[arg(long, value_name = "FMT")]
    pub date_format: Option<String>,

    /// Upper bounds in MiB of the small and medium buckets of the size layout
    #[arg(long, num_args = 2, value_names = ["SMALL", "MEDIUM"])]
    pub size_limits: Option<Vec<u64>>,

    /// Only organize files with these extensions (comma separated)
    #[arg(short = 'e', long = "extensions", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Only organize the first N files, in path order
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Include hidden files and directories
    #[arg(long)]
    pub hidden: bool,

    /// Detect the type of files without an extension from their content
    #[arg(long)]
    pub sniff: bool,

    /// Remove directories left empty afterwards
    #[arg(long)]
    pub sweep_empty: bool,

    /// When sweeping, also remove directories holding only hidden files
    #[arg(long)]
    pub purge_hidden: bool,

    /// Copy and verify instead of renaming, even on the same device
    #[arg(long)]
    pub force_copy: bool,

    /// Verify cross-device copies by size only
    #[arg(long)]
    pub no_verify_digest: bool,

    /// Link every sorted file into one flat directory of symlinks
    /// (default: <DESTINATION>/_index)
    #[arg(long, value_name = "DIR")]
    pub create_links: Option<Option<PathBuf>>,

    /// Write a configuration template and exit (default: .tidysortrc.toml)
    #[arg(long, value_name = "PATH", exclusive = true)]
    pub create_config: Option<Option<PathBuf>>,

    /// Configuration file (default: .tidysortrc.toml, then ~/.config/tidysort/config.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit with status 1 when any file could not be processed
    #[arg(long)]
    pub strict: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Loads configuration, runs one pass and prints its report.
///
/// # Errors
///
/// Configuration problems and the fatal source errors. Per-file failures are
/// part of the returned report.
pub fn run(args: &Args) -> Result<RunReport> {
    let config = Config::load(args.config.as_deref()).context("Error loading configuration")?;
    let options = build_options(args, &config)?;
    let table = config.category_table();

    if !args.json {
        if options.dry_run {
            OutputFormatter::dry_run_notice(&format!(
                "Planning moves for {}",
                options.source.display()
            ));
        } else {
            OutputFormatter::info(&format!(
                "Organizing {} into {}",
                options.source.display(),
                options.destination_root().display()
            ));
        }
    }

    let mut engine = OrganizeEngine::new(options, table);
    if !args.json && !args.dry_run {
        engine = engine.with_progress(OutputFormatter::create_progress_bar());
    }
    let report = engine
        .run()
        .with_context(|| format!("Cannot organize {}", source(args).display()))?;

    if args.json {
        println!(
            "{}",
            OutputFormatter::report_json(&report).context("Error serializing report")?
        );
    } else {
        OutputFormatter::print_report(&report);
    }
    Ok(report)
}

/// Writes a configuration template to `path`, or to `.tidysortrc.toml` in
/// the current directory.
///
/// # Errors
///
/// The file already exists or cannot be written.
pub fn create_config(path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(Path::new(LOCAL_CONFIG_NAME));
    Config::write_template(path)
        .with_context(|| format!("Cannot create configuration {}", path.display()))?;
    OutputFormatter::success(&format!("Created configuration template {}", path.display()));
    OutputFormatter::info("Edit it to add categories and filters, then run tidysort again.");
    Ok(())
}

fn source(args: &Args) -> &Path {
    args.source.as_deref().unwrap_or(Path::new("."))
}

/// Merges command-line flags over configuration values.
///
/// Boolean flags can only switch a setting on; values given on the command
/// line replace the configured ones.
///
/// # Errors
///
/// Invalid filters, date format or size limits.
pub fn build_options(args: &Args, config: &Config) -> Result<OrganizeOptions> {
    let settings = &config.organize;

    let filters = config
        .compile_filters()
        .context("Error compiling filters")?;
    let include_hidden = args.hidden || filters.include_hidden();

    let mut options = OrganizeOptions::new(source(args)).with_only_extensions(&args.extensions);
    options.destination = args.destination.clone().or_else(|| settings.destination.clone());
    options.recursive = args.recursive || settings.recursive;
    options.dry_run = args.dry_run;
    options.duplicate_policy = duplicate_policy(args, config);
    options.report_duplicates = args.report_duplicates;
    options.hash_algorithm = args.hash_algorithm.unwrap_or(settings.hash_algorithm);
    options.hash_threads = args.hash_threads.unwrap_or(settings.hash_threads).max(1);
    options.layout = layout(args, config)?;
    options.filters = filters.with_hidden(include_hidden);
    options.limit = args.top;
    options.sniff_content = args.sniff || settings.sniff_content;
    options.sweep_empty = args.sweep_empty || settings.sweep_empty;
    options.purge_hidden = args.purge_hidden || settings.purge_hidden;
    options.verify_digest = settings.verify_digest && !args.no_verify_digest;
    options.force_copy = args.force_copy;
    options.link_index = match &args.create_links {
        Some(Some(dir)) => Some(dir.clone()),
        Some(None) => Some(options.destination_root().join(LINK_INDEX_DIR)),
        None => settings
            .create_links
            .then(|| options.destination_root().join(LINK_INDEX_DIR)),
    };
    Ok(options)
}

fn duplicate_policy(args: &Args, config: &Config) -> DuplicatePolicy {
    if args.delete_duplicates {
        DuplicatePolicy::Delete
    } else if args.link_duplicates {
        DuplicatePolicy::HardLink
    } else if config.organize.delete_duplicates {
        DuplicatePolicy::Delete
    } else if config.organize.link_duplicates {
        DuplicatePolicy::HardLink
    } else {
        DuplicatePolicy::Keep
    }
}

fn layout(args: &Args, config: &Config) -> Result<Layout> {
    let settings = &config.organize;
    match args.layout.unwrap_or(settings.layout) {
        LayoutKind::Category => Ok(Layout::Category),
        LayoutKind::Date => {
            let format = args.date_format.as_deref().unwrap_or(&settings.date_format);
            Layout::modified_date(format).map_err(anyhow::Error::msg)
        }
        LayoutKind::Size => {
            let (small, medium) = match args.size_limits.as_deref() {
                Some([small, medium]) => (*small, *medium),
                Some(_) => bail!("--size-limits takes exactly two values"),
                None => (settings.size_limits[0], settings.size_limits[1]),
            };
            if small == 0 || small >= medium {
                bail!(
                    "invalid size limits {} {}: expected 0 < SMALL < MEDIUM",
                    small,
                    medium
                );
            }
            Ok(Layout::size_mib(small, medium))
        }
    }
}

/// Maps a finished pass to the process exit code.
pub fn exit_code(report: &RunReport, strict: bool) -> u8 {
    if strict && report.has_errors() {
        EXIT_FILE_ERRORS
    } else {
        EXIT_OK
    }
}
