//! The organize pass.
//!
//! One pass walks the source tree, plans every move and duplicate action, then
//! either logs the plan (dry run) or applies it one entry at a time. A failing
//! entry is recorded in the [`RunReport`] and the pass moves on to the next
//! one; only a bad source path stops it.
//!
//! ```text
//! Scanning -> Planning -> DryRunPreview -> Reporting -> Done
//!                      \-> Executing ----/
//! ```

use crate::category::{CategoryTable, normalize_extension};
use crate::config::CompiledFilters;
use crate::duplicates::{DedupOptions, DuplicateIndex};
use crate::error::{OrganizeError, OrganizeResult};
use crate::hasher::HashAlgorithm;
use crate::links::LinkIndex;
use crate::plan::{DuplicateAction, DuplicatePolicy, Layout, Planner, RelocationPlan};
use crate::relocator::AtomicRelocator;
use crate::report::RunReport;
use crate::scan::{self, ScanOptions, ScanOutcome, ScanStats};
use crate::sweeper::EmptyDirSweeper;
use indicatif::ProgressBar;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Name of the destination directory created inside the source when no
/// destination is given.
pub const DEFAULT_DESTINATION_DIR: &str = "_sorted";

/// Phases of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Scanning,
    Planning,
    DryRunPreview,
    Executing,
    Reporting,
    Done,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Idle => "idle",
            EngineState::Scanning => "scanning",
            EngineState::Planning => "planning",
            EngineState::DryRunPreview => "dry-run preview",
            EngineState::Executing => "executing",
            EngineState::Reporting => "reporting",
            EngineState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Everything that shapes a pass apart from the category table.
#[derive(Debug, Clone)]
pub struct OrganizeOptions {
    pub source: PathBuf,
    /// `None` means `<source>/_sorted`.
    pub destination: Option<PathBuf>,
    pub recursive: bool,
    pub dry_run: bool,
    pub duplicate_policy: DuplicatePolicy,
    /// Detect duplicates even when the policy keeps them.
    pub report_duplicates: bool,
    pub hash_algorithm: HashAlgorithm,
    pub hash_threads: usize,
    /// Treat zero-length files as duplicates of each other.
    pub include_empty: bool,
    pub layout: Layout,
    pub filters: CompiledFilters,
    pub only_extensions: Option<HashSet<String>>,
    pub limit: Option<usize>,
    pub sniff_content: bool,
    pub sweep_empty: bool,
    pub purge_hidden: bool,
    /// Check cross-device copies with a digest as well as their size.
    pub verify_digest: bool,
    pub force_copy: bool,
    /// Directory of the symlink index built after the moves, if any.
    pub link_index: Option<PathBuf>,
}

impl OrganizeOptions {
    /// Defaults: category layout, non-recursive, duplicates kept, SHA-256.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: None,
            recursive: false,
            dry_run: false,
            duplicate_policy: DuplicatePolicy::Keep,
            report_duplicates: false,
            hash_algorithm: HashAlgorithm::Sha256,
            hash_threads: 1,
            include_empty: false,
            layout: Layout::Category,
            filters: CompiledFilters::default(),
            only_extensions: None,
            limit: None,
            sniff_content: false,
            sweep_empty: false,
            purge_hidden: false,
            verify_digest: true,
            force_copy: false,
            link_index: None,
        }
    }

    /// Restricts the pass to the given extensions. An empty list clears the
    /// restriction.
    pub fn with_only_extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        let set: HashSet<String> = extensions
            .iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        self.only_extensions = (!set.is_empty()).then_some(set);
        self
    }

    /// The destination root as given, or the default below the source.
    pub fn destination_root(&self) -> PathBuf {
        self.destination
            .clone()
            .unwrap_or_else(|| self.source.join(DEFAULT_DESTINATION_DIR))
    }

    fn dedup_wanted(&self) -> bool {
        self.report_duplicates || self.duplicate_policy != DuplicatePolicy::Keep
    }

    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            source: self.source.clone(),
            destination: self.destination_root(),
            recursive: self.recursive,
            filters: self.filters.clone(),
            only_extensions: self.only_extensions.clone(),
            limit: self.limit,
        }
    }
}

struct Prepared {
    scan: ScanOutcome,
    plan: RelocationPlan,
    duplicate_groups: usize,
    hash_failures: Vec<OrganizeError>,
}

/// Runs organize passes over one source tree.
pub struct OrganizeEngine {
    options: OrganizeOptions,
    table: CategoryTable,
    relocator: AtomicRelocator,
    cancel: Option<Arc<AtomicBool>>,
    progress: Option<ProgressBar>,
    state: EngineState,
}

impl OrganizeEngine {
    /// Creates an engine. The table is not modified by any pass.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tidysort::category::CategoryTable;
    /// use tidysort::engine::{OrganizeEngine, OrganizeOptions};
    ///
    /// let mut options = OrganizeOptions::new("/home/user/Downloads");
    /// options.dry_run = true;
    /// let mut engine = OrganizeEngine::new(options, CategoryTable::default());
    /// let report = engine.run().expect("source must be a directory");
    /// println!("{} files would move", report.moved);
    /// ```
    pub fn new(options: OrganizeOptions, table: CategoryTable) -> Self {
        let verification = options.verify_digest.then_some(options.hash_algorithm);
        let relocator = AtomicRelocator::new()
            .with_digest_verification(verification)
            .with_forced_copy(options.force_copy);
        Self {
            options,
            table,
            relocator,
            cancel: None,
            progress: None,
            state: EngineState::Idle,
        }
    }

    /// Checks `flag` between plan entries; once set, remaining entries are
    /// abandoned and completed moves are kept.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Advances `bar` once per executed plan entry.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    pub fn options(&self) -> &OrganizeOptions {
        &self.options
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Scans and plans without changing anything on disk.
    ///
    /// # Errors
    ///
    /// The fatal source errors.
    pub fn plan(&mut self) -> OrganizeResult<(RelocationPlan, ScanStats)> {
        let prepared = self.prepare()?;
        self.transition(EngineState::Done);
        Ok((prepared.plan, prepared.scan.stats))
    }

    /// Runs a full pass.
    ///
    /// # Errors
    ///
    /// The fatal source errors. Every other failure ends up in the report.
    pub fn run(&mut self) -> OrganizeResult<RunReport> {
        let dry_run = self.options.dry_run;
        let prepared = self.prepare()?;

        let mut report = RunReport::new(dry_run);
        report.scanned = prepared.scan.entries.len();
        report.duplicate_groups = prepared.duplicate_groups;
        report.skipped = prepared.plan.already_in_place.len();
        for (path, message) in &prepared.scan.stats.walk_errors {
            report.record_walk_error(path, message);
        }
        for error in prepared.hash_failures.iter().chain(&prepared.plan.failures) {
            report.record_error(error);
        }

        if dry_run {
            self.transition(EngineState::DryRunPreview);
            self.preview(&prepared.plan, &mut report);
        } else {
            self.transition(EngineState::Executing);
            self.execute(&prepared.plan, &mut report);
        }

        self.transition(EngineState::Reporting);
        if self.options.sweep_empty && !report.cancelled {
            self.sweep(&prepared.scan, &mut report);
        }
        if let Some(dir) = &self.options.link_index
            && !report.cancelled
        {
            self.link(dir, &prepared, &mut report);
        }
        tracing::info!(
            scanned = report.scanned,
            moved = report.moved,
            skipped = report.skipped,
            duplicate_groups = report.duplicate_groups,
            errors = report.errors,
            dry_run,
            "Organize pass finished"
        );

        self.transition(EngineState::Done);
        Ok(report)
    }

    fn prepare(&mut self) -> OrganizeResult<Prepared> {
        self.transition(EngineState::Scanning);
        let mut scan = scan::scan(&self.options.scan_options())?;
        tracing::debug!(
            files = scan.entries.len(),
            excluded = scan.stats.excluded,
            "Scan complete"
        );

        self.transition(EngineState::Planning);
        let index = self.options.dedup_wanted().then(|| {
            let dedup = DedupOptions {
                algorithm: self.options.hash_algorithm,
                threads: self.options.hash_threads,
                include_empty: self.options.include_empty,
                ..DedupOptions::default()
            };
            DuplicateIndex::build(&mut scan.entries, &dedup)
        });

        let planner = Planner {
            table: &self.table,
            layout: &self.options.layout,
            destination_root: &scan.destination_root,
            policy: self.options.duplicate_policy,
            sniff_content: self.options.sniff_content,
        };
        let plan = planner.build(&scan.entries, index.as_ref());

        let (duplicate_groups, hash_failures) = match index {
            Some(index) => (index.group_count(), index.hash_failures),
            None => (0, Vec::new()),
        };

        Ok(Prepared {
            scan,
            plan,
            duplicate_groups,
            hash_failures,
        })
    }

    fn preview(&self, plan: &RelocationPlan, report: &mut RunReport) {
        for action in &plan.duplicate_actions {
            match action.policy {
                DuplicatePolicy::Delete => {
                    tracing::info!(
                        "[DRY-RUN] would remove duplicate {} (keeping {})",
                        action.duplicate.display(),
                        action.keeper.display()
                    );
                    report.duplicates_removed += 1;
                }
                DuplicatePolicy::HardLink => {
                    tracing::info!(
                        "[DRY-RUN] would link duplicate {} to {}",
                        action.duplicate.display(),
                        action.keeper.display()
                    );
                    report.duplicates_linked += 1;
                }
                DuplicatePolicy::Keep => {}
            }
        }
        for planned in &plan.moves {
            tracing::info!("[DRY-RUN] would move {}", planned);
            report.record_move(&planned.bucket);
        }
        report.preview = plan.moves.clone();
    }

    fn execute(&self, plan: &RelocationPlan, report: &mut RunReport) {
        let total = plan.duplicate_actions.len() + plan.moves.len();
        if let Some(bar) = &self.progress {
            bar.set_length(total as u64);
        }

        let mut done = 0;
        for action in &plan.duplicate_actions {
            if self.cancel_requested() {
                break;
            }
            self.apply_duplicate_action(action, report);
            done += 1;
            self.tick();
        }

        for planned in &plan.moves {
            if self.cancel_requested() {
                break;
            }
            match self.relocator.relocate_to(&planned.source, &planned.destination) {
                Ok(_) => report.record_move(&planned.bucket),
                Err(e) => {
                    tracing::warn!(error = %e, "Move failed, source left in place");
                    report.record_error(&e);
                }
            }
            done += 1;
            self.tick();
        }

        if done < total {
            tracing::warn!(abandoned = total - done, "Pass cancelled");
            report.cancelled = true;
            report.skipped += total - done;
        }
        if let Some(bar) = &self.progress {
            bar.finish_and_clear();
        }
    }

    fn apply_duplicate_action(&self, action: &DuplicateAction, report: &mut RunReport) {
        let result = match action.policy {
            DuplicatePolicy::Delete => self
                .relocator
                .remove_duplicate(&action.duplicate, &action.keeper)
                .map(|()| report.duplicates_removed += 1),
            DuplicatePolicy::HardLink => self
                .relocator
                .link_duplicate(&action.duplicate, &action.keeper)
                .map(|()| report.duplicates_linked += 1),
            DuplicatePolicy::Keep => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Duplicate left as it was");
            report.record_error(&e);
        }
    }

    fn sweep(&self, scan: &ScanOutcome, report: &mut RunReport) {
        let nested = scan.destination_root != scan.source_root
            && scan.destination_root.starts_with(&scan.source_root);
        let outcome = EmptyDirSweeper::new()
            .with_purge_hidden(self.options.purge_hidden)
            .with_hidden(self.options.filters.include_hidden())
            .with_protected(nested.then(|| scan.destination_root.clone()))
            .sweep(&scan.source_root, self.options.dry_run);

        report.dirs_swept = outcome.removed.len();
        for error in &outcome.failures {
            report.record_error(error);
        }
    }

    fn link(&self, dir: &Path, prepared: &Prepared, report: &mut RunReport) {
        let pending: Vec<PathBuf> = if self.options.dry_run {
            prepared
                .plan
                .moves
                .iter()
                .map(|m| m.destination.clone())
                .collect()
        } else {
            Vec::new()
        };
        let outcome = LinkIndex::new(scan::resolve_lenient(dir)).build(
            &prepared.scan.destination_root,
            &pending,
            self.options.dry_run,
        );

        report.links_created = outcome.created.len();
        for error in &outcome.failures {
            report.record_error(error);
        }
    }

    fn cancel_requested(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn tick(&self) {
        if let Some(bar) = &self.progress {
            bar.inc(1);
        }
    }

    fn transition(&mut self, next: EngineState) {
        tracing::debug!(from = %self.state, to = %next, "Engine state change");
        self.state = next;
    }
}

/// Convenience wrapper: runs a single pass with the given options.
pub fn organize(options: OrganizeOptions, table: CategoryTable) -> OrganizeResult<RunReport> {
    OrganizeEngine::new(options, table).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn canonical_temp_dir() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir
            .path()
            .canonicalize()
            .expect("Failed to canonicalize temp directory");
        (temp_dir, root)
    }

    fn images_only() -> CategoryTable {
        let mut categories = BTreeMap::new();
        categories.insert("images".to_string(), vec!["jpg".to_string()]);
        CategoryTable::from_categories(&categories)
    }

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(path, content).expect("Failed to write test file");
    }

    #[test]
    fn test_three_file_scenario_with_duplicate_deletion() {
        let (_guard, root) = canonical_temp_dir();
        write(&root.join("photo.jpg"), "12345");
        write(&root.join("photo_copy.jpg"), "12345");
        write(&root.join("note.txt"), "hello there");

        let mut options = OrganizeOptions::new(&root);
        options.duplicate_policy = DuplicatePolicy::Delete;
        let mut engine = OrganizeEngine::new(options, images_only());
        let report = engine.run().expect("run should succeed");

        assert_eq!(report.scanned, 3);
        assert_eq!(report.duplicate_groups, 1);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.moved, 2);
        assert_eq!(report.errors, 0);
        assert_eq!(engine.state(), EngineState::Done);

        let sorted = root.join(DEFAULT_DESTINATION_DIR);
        assert!(sorted.join("images").join("photo.jpg").exists());
        assert!(sorted.join("others").join("note.txt").exists());
        assert!(!root.join("photo.jpg").exists());
        assert!(!root.join("photo_copy.jpg").exists());
        assert!(!sorted.join("images").join("photo_copy.jpg").exists());
    }

    #[test]
    fn test_dry_run_is_repeatable_and_changes_nothing() {
        let (_guard, root) = canonical_temp_dir();
        write(&root.join("a.jpg"), "a");
        write(&root.join("b.txt"), "b");
        write(&root.join("sub").join("a.jpg"), "c");

        let mut options = OrganizeOptions::new(&root);
        options.recursive = true;
        options.dry_run = true;

        let mut engine = OrganizeEngine::new(options, images_only());
        let first = engine.run().expect("first dry run");
        let second = engine.run().expect("second dry run");

        assert!(first.dry_run);
        assert_eq!(first.preview, second.preview);
        assert_eq!(first.moved, 3);
        assert!(root.join("a.jpg").exists());
        assert!(root.join("sub").join("a.jpg").exists());
        assert!(!root.join(DEFAULT_DESTINATION_DIR).exists());
    }

    #[test]
    fn test_destination_inside_source_is_never_a_source() {
        let (_guard, root) = canonical_temp_dir();
        let sorted = root.join(DEFAULT_DESTINATION_DIR);
        write(&sorted.join("images").join("old.jpg"), "old");
        write(&root.join("new.jpg"), "new");

        let mut options = OrganizeOptions::new(&root);
        options.recursive = true;
        let mut engine = OrganizeEngine::new(options, images_only());
        let (plan, stats) = engine.plan().expect("plan should succeed");

        assert!(stats.destination_pruned);
        assert_eq!(plan.moves.len(), 1);
        assert!(plan.moves.iter().all(|m| !m.source.starts_with(&sorted)));
    }

    #[test]
    fn test_cancelled_pass_keeps_every_file() {
        let (_guard, root) = canonical_temp_dir();
        write(&root.join("a.txt"), "a");
        write(&root.join("b.txt"), "b");

        let flag = Arc::new(AtomicBool::new(true));
        let mut engine = OrganizeEngine::new(OrganizeOptions::new(&root), images_only())
            .with_cancellation(Arc::clone(&flag));
        let report = engine.run().expect("run should succeed");

        assert!(report.cancelled);
        assert_eq!(report.moved, 0);
        assert_eq!(report.skipped, 2);
        assert!(root.join("a.txt").exists());
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let (_guard, root) = canonical_temp_dir();
        let mut engine = OrganizeEngine::new(OrganizeOptions::new(root.join("gone")), images_only());

        let err = engine.run().expect_err("missing source must fail");
        assert!(err.is_fatal());
        assert_eq!(engine.state(), EngineState::Scanning);
    }

    #[test]
    fn test_collision_with_existing_destination_file() {
        let (_guard, root) = canonical_temp_dir();
        let dest = root.join("dest");
        write(&dest.join("others").join("a.txt"), "existing");
        let src = root.join("src");
        write(&src.join("a.txt"), "first");
        write(&src.join("nested").join("a.txt"), "second");

        let mut options = OrganizeOptions::new(&src);
        options.destination = Some(dest.clone());
        options.recursive = true;
        let report = organize(options, images_only()).expect("run should succeed");

        assert_eq!(report.moved, 2);
        assert_eq!(
            fs::read_to_string(dest.join("others").join("a (1).txt")).expect("read"),
            "first"
        );
        assert_eq!(
            fs::read_to_string(dest.join("others").join("a (2).txt")).expect("read"),
            "second"
        );
        assert_eq!(
            fs::read_to_string(dest.join("others").join("a.txt")).expect("read"),
            "existing"
        );
    }

    #[test]
    fn test_sweep_removes_directories_emptied_by_the_pass() {
        let (_guard, root) = canonical_temp_dir();
        write(&root.join("deep").join("er").join("a.jpg"), "a");

        let mut options = OrganizeOptions::new(&root);
        options.recursive = true;
        options.sweep_empty = true;
        let report = organize(options, images_only()).expect("run should succeed");

        assert_eq!(report.moved, 1);
        assert_eq!(report.dirs_swept, 2);
        assert!(!root.join("deep").exists());
        assert!(root.join(DEFAULT_DESTINATION_DIR).join("images").join("a.jpg").exists());
    }

    #[test]
    fn test_report_only_duplicates_are_still_moved() {
        let (_guard, root) = canonical_temp_dir();
        write(&root.join("a.jpg"), "same");
        write(&root.join("b.jpg"), "same");

        let mut options = OrganizeOptions::new(&root);
        options.report_duplicates = true;
        let report = organize(options, images_only()).expect("run should succeed");

        assert_eq!(report.duplicate_groups, 1);
        assert_eq!(report.duplicates_removed, 0);
        assert_eq!(report.moved, 2);
    }

    #[test]
    fn test_only_extensions_and_limit() {
        let (_guard, root) = canonical_temp_dir();
        for name in ["a.jpg", "b.jpg", "c.jpg", "d.txt"] {
            write(&root.join(name), name);
        }

        let mut options = OrganizeOptions::new(&root).with_only_extensions(&[".JPG"]);
        options.limit = Some(2);
        options.dry_run = true;
        let report = organize(options, images_only()).expect("run should succeed");

        assert_eq!(report.scanned, 2);
        let sources: Vec<_> = report.preview.iter().map(|m| m.source.clone()).collect();
        assert_eq!(sources, vec![root.join("a.jpg"), root.join("b.jpg")]);
    }

    #[test]
    fn test_in_place_organizing_skips_sorted_files() {
        let (_guard, root) = canonical_temp_dir();
        write(&root.join("images").join("done.jpg"), "done");
        write(&root.join("todo.jpg"), "todo");

        let mut options = OrganizeOptions::new(&root);
        options.destination = Some(root.clone());
        options.recursive = true;
        let report = organize(options, images_only()).expect("run should succeed");

        assert_eq!(report.moved, 1);
        assert_eq!(report.skipped, 1);
        assert!(root.join("images").join("todo.jpg").exists());
        assert!(root.join("images").join("done.jpg").exists());
    }

    #[test]
    fn test_sweep_leaves_hidden_directories_alone() {
        let (_guard, root) = canonical_temp_dir();
        write(&root.join("a.txt"), "a");
        write(&root.join(".git").join("HEAD"), "ref: refs/heads/main");
        fs::create_dir_all(root.join(".git").join("refs").join("tags")).expect("Failed to create dir");

        let mut options = OrganizeOptions::new(&root);
        options.recursive = true;
        options.sweep_empty = true;
        let report = organize(options, images_only()).expect("run should succeed");

        assert_eq!(report.moved, 1);
        assert_eq!(report.dirs_swept, 0);
        assert!(root.join(".git").join("refs").join("tags").is_dir());
        assert!(root.join(DEFAULT_DESTINATION_DIR).join("others").join("a.txt").exists());
    }

    #[test]
    fn test_failed_move_does_not_stop_later_entries() {
        let (_guard, root) = canonical_temp_dir();
        write(&root.join("a.jpg"), "a");
        write(&root.join("b.txt"), "b");
        write(&root.join("c.jpg"), "c");
        // a plain file where the "others" bucket directory should go
        write(&root.join(DEFAULT_DESTINATION_DIR).join("others"), "in the way");

        let report = organize(OrganizeOptions::new(&root), images_only()).expect("run should succeed");

        assert_eq!(report.moved, 2);
        assert_eq!(report.errors, 1);
        assert_eq!(report.failures[0].kind, "move_failed");
        assert_eq!(report.failures[0].path, root.join("b.txt"));
        assert!(root.join("b.txt").exists());
        let images = root.join(DEFAULT_DESTINATION_DIR).join("images");
        assert!(images.join("a.jpg").exists());
        assert!(images.join("c.jpg").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_moved_but_never_deleted_as_duplicate() {
        use std::os::unix::fs::PermissionsExt;

        let (_guard, root) = canonical_temp_dir();
        write(&root.join("a.jpg"), "same");
        write(&root.join("b.jpg"), "same");
        let locked = root.join("b.jpg");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod");
        if fs::File::open(&locked).is_ok() {
            // permission bits do not apply to this user (root)
            return;
        }

        let mut options = OrganizeOptions::new(&root);
        options.duplicate_policy = DuplicatePolicy::Delete;
        let report = organize(options, images_only()).expect("run should succeed");

        assert_eq!(report.errors, 1);
        assert_eq!(report.failures[0].kind, "hash_failure");
        assert_eq!(report.duplicate_groups, 0);
        assert_eq!(report.duplicates_removed, 0);
        assert_eq!(report.moved, 2);
        let images = root.join(DEFAULT_DESTINATION_DIR).join("images");
        assert!(images.join("a.jpg").exists());
        assert!(fs::symlink_metadata(images.join("b.jpg")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_link_index_after_pass() {
        let (_guard, root) = canonical_temp_dir();
        write(&root.join("a.jpg"), "a");
        write(&root.join("sub").join("a.jpg"), "b");
        let index = root.join(DEFAULT_DESTINATION_DIR).join(crate::links::LINK_INDEX_DIR);

        let mut options = OrganizeOptions::new(&root);
        options.recursive = true;
        options.link_index = Some(index.clone());
        let report = organize(options, images_only()).expect("run should succeed");

        assert_eq!(report.moved, 2);
        assert_eq!(report.links_created, 2);
        let images = root.join(DEFAULT_DESTINATION_DIR).join("images");
        assert_eq!(fs::read_link(index.join("a.jpg")).expect("link"), images.join("a.jpg"));
        assert_eq!(
            fs::read_link(index.join("a (1).jpg")).expect("link"),
            images.join("a (1).jpg")
        );
    }

    #[test]
    fn test_dry_run_link_index_counts_planned_files() {
        let (_guard, root) = canonical_temp_dir();
        write(&root.join("a.jpg"), "a");
        write(&root.join("b.txt"), "b");
        let index = root.join(DEFAULT_DESTINATION_DIR).join(crate::links::LINK_INDEX_DIR);

        let mut options = OrganizeOptions::new(&root);
        options.dry_run = true;
        options.link_index = Some(index.clone());
        let report = organize(options, images_only()).expect("run should succeed");

        assert_eq!(report.links_created, 2);
        assert!(!index.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_hard_link_policy_keeps_duplicate_path() {
        use std::os::unix::fs::MetadataExt;

        let (_guard, root) = canonical_temp_dir();
        write(&root.join("a.jpg"), "same");
        write(&root.join("b.jpg"), "same");

        let mut options = OrganizeOptions::new(&root);
        options.duplicate_policy = DuplicatePolicy::HardLink;
        let report = organize(options, images_only()).expect("run should succeed");

        assert_eq!(report.duplicates_linked, 1);
        assert_eq!(report.moved, 1);
        let keeper = root.join(DEFAULT_DESTINATION_DIR).join("images").join("a.jpg");
        let linked = root.join("b.jpg");
        let keeper_ino = fs::metadata(&keeper).expect("stat keeper").ino();
        let linked_ino = fs::metadata(&linked).expect("stat link").ino();
        assert_eq!(keeper_ino, linked_ino);
    }
}
