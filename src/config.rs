//! Configuration file support.
//!
//! Settings are read from a TOML file and cover three areas: defaults for the
//! organize flags, extra or replacement categories, and file filtering rules.
//!
//! # Configuration File Format
//!
//! ```toml
//! [organize]
//! recursive = true
//! delete_duplicates = false
//! hash_algorithm = "sha256"
//! layout = "category"
//! sweep_empty = true
//! replace_default_categories = false
//!
//! [categories]
//! design = ["psd", "ai", "sketch", "fig"]
//! databases = ["db", "sqlite"]
//!
//! [filters]
//! include_hidden = false
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.tmp", "node_modules/**"]
//! extensions = ["part", "crdownload"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```

use crate::category::{CategoryTable, normalize_extension};
use crate::hasher::HashAlgorithm;
use crate::plan::Layout;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_NAME: &str = ".tidysortrc.toml";

/// Errors that can occur while loading or compiling configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// A value is outside its allowed range.
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
    /// Refusing to overwrite an existing file with a template.
    #[error("Configuration file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub organize: OrganizeSettings,

    /// Extra categories, name → extensions.
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub filters: FilterRules,
}

/// Layout selector as written in configuration and on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// One sub-directory per category.
    #[default]
    Category,
    /// One sub-directory per modification date.
    Date,
    /// `small` / `medium` / `large` sub-directories.
    Size,
}

/// Defaults for the organize flags. Command-line flags override these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizeSettings {
    /// Destination root; `<source>/_sorted` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    pub recursive: bool,
    pub delete_duplicates: bool,
    pub link_duplicates: bool,
    pub hash_algorithm: HashAlgorithm,
    pub hash_threads: usize,
    pub layout: LayoutKind,
    /// `strftime` format for the date layout.
    pub date_format: String,
    /// Upper bounds in MiB of the `small` and `medium` size buckets.
    pub size_limits: [u64; 2],
    pub sweep_empty: bool,
    pub purge_hidden: bool,
    pub sniff_content: bool,
    /// Compare digests, not just sizes, after a cross-device copy.
    pub verify_digest: bool,
    /// Drop the built-in categories instead of extending them.
    pub replace_default_categories: bool,
    /// Keep a symlink index in `<destination>/_index`.
    pub create_links: bool,
}

impl Default for OrganizeSettings {
    fn default() -> Self {
        Self {
            destination: None,
            recursive: false,
            delete_duplicates: false,
            link_duplicates: false,
            hash_algorithm: HashAlgorithm::Sha256,
            hash_threads: 1,
            layout: LayoutKind::Category,
            date_format: "%Y-%m".to_string(),
            size_limits: [10, 100],
            sweep_empty: false,
            purge_hidden: false,
            sniff_content: false,
            verify_digest: true,
            replace_default_categories: false,
            create_links: false,
        }
    }
}

/// File filtering rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    #[serde(default)]
    pub include_hidden: bool,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

/// Rules for excluding files from a pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the path relative to the source root.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude (e.g., "part", "tmp").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Config {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.tidysortrc.toml` in the current directory
    /// 3. Look for `~/.config/tidysort/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but
    /// cannot be read, or if any file found is not valid.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_NAME);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("tidysort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if file does not exist.
    /// Returns `ConfigError::ConfigInvalid` if TOML parsing fails.
    /// Returns `ConfigError::IoError` if file cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// A starting point for a configuration file: the defaults plus a few
    /// example categories and filters.
    pub fn template() -> Self {
        let mut config = Self::default();
        for (name, extensions) in [
            ("design", ["psd", "ai", "sketch", "fig"].as_slice()),
            ("databases", ["db", "sqlite", "mdb"].as_slice()),
        ] {
            config.categories.insert(
                name.to_string(),
                extensions.iter().map(|e| e.to_string()).collect(),
            );
        }
        config.filters.exclude.filenames = vec![".DS_Store".to_string(), "Thumbs.db".to_string()];
        config.filters.exclude.extensions = vec!["part".to_string(), "crdownload".to_string()];
        config
    }

    /// Writes [`Config::template`] to `path`. An existing file is never
    /// overwritten.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when something is at `path`, `IoError` when writing fails.
    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        let content = toml::to_string_pretty(&Self::template())
            .map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }
        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;
        tracing::info!(path = %path.display(), "Wrote configuration template");
        Ok(())
    }

    /// Parses and validates configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let [small, medium] = self.organize.size_limits;
        if small == 0 || small >= medium {
            return Err(ConfigError::InvalidValue {
                key: "size_limits",
                reason: format!("expected 0 < small < medium, got [{}, {}]", small, medium),
            });
        }
        Layout::modified_date(&self.organize.date_format).map_err(|reason| {
            ConfigError::InvalidValue {
                key: "date_format",
                reason,
            }
        })?;
        if self.organize.delete_duplicates && self.organize.link_duplicates {
            return Err(ConfigError::InvalidValue {
                key: "link_duplicates",
                reason: "cannot be combined with delete_duplicates".to_string(),
            });
        }
        for name in self.categories.keys() {
            if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(ConfigError::InvalidValue {
                    key: "categories",
                    reason: format!("'{}' is not a usable directory name", name),
                });
            }
        }
        Ok(())
    }

    /// Builds the category table for a pass.
    ///
    /// Categories from the file claim their extensions first, so a user
    /// category can take an extension away from a built-in one. The built-in
    /// categories fill in the rest unless `replace_default_categories` is set.
    pub fn category_table(&self) -> CategoryTable {
        let mut table = CategoryTable::from_categories(&self.categories);
        if !self.organize.replace_default_categories {
            for (category, extensions) in CategoryTable::default_categories() {
                if self.categories.contains_key(&category) {
                    continue;
                }
                for ext in &extensions {
                    table.add_extension_mapping(ext, &category);
                }
            }
        }
        table
    }

    /// Compile the filter rules into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Pre-compiled filter rules.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    include_hidden: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl Default for CompiledFilters {
    fn default() -> Self {
        Self {
            include_hidden: false,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

impl CompiledFilters {
    /// Compiles filter rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob or regex patterns are invalid.
    pub fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
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
            include_hidden: rules.include_hidden,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Overrides the hidden-file toggle.
    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Whether hidden files and directories are scanned.
    pub fn include_hidden(&self) -> bool {
        self.include_hidden
    }

    /// Check if a file takes part in the pass.
    ///
    /// `rel_path` is the path relative to the source root. Checks, in order:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden file filter - if hidden and disabled, exclude
    /// 3. Exact filename match - if matched, exclude
    /// 4. File extension match - if matched, exclude
    /// 5. Glob pattern match - if matched, exclude
    /// 6. Regex pattern match - if matched, exclude
    pub fn should_include(&self, rel_path: &Path) -> bool {
        let file_name = rel_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(rel_path))
        {
            return true;
        }

        if !self.include_hidden && is_hidden_name(&file_name) {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = rel_path.extension()
            && self
                .exclude_extensions
                .contains(&normalize_extension(&ext.to_string_lossy()))
        {
            return false;
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(rel_path))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}

/// True when a file name uses the hidden-file marker.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}
