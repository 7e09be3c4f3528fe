//! tidysort - sort the files of a directory into folders
//!
//! This library classifies files by extension (or modification date, or size),
//! detects byte-identical duplicates, moves files with collision-safe and
//! cross-device-safe relocation, sweeps directories left empty and can keep a
//! flat symlink index of the sorted tree. One pass is
//! driven by [`engine::OrganizeEngine`]; settings can come from a TOML
//! configuration file.

pub mod category;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod links;
pub mod output;
pub mod plan;
pub mod relocator;
pub mod report;
pub mod scan;
pub mod sweeper;

pub use category::CategoryTable;
pub use config::{CompiledFilters, Config, ConfigError};
pub use duplicates::{DuplicateGroup, DuplicateIndex};
pub use engine::{EngineState, OrganizeEngine, OrganizeOptions, organize};
pub use error::{OrganizeError, OrganizeResult};
pub use hasher::HashAlgorithm;
pub use links::LinkIndex;
pub use plan::{DuplicatePolicy, Layout, RelocationPlan};
pub use relocator::AtomicRelocator;
pub use report::RunReport;
pub use sweeper::EmptyDirSweeper;
