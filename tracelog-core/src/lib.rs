//! tracelog core library - entry trace logging for exported C functions

#![deny(warnings)]

// Global invariants enforced in this crate:
// - The pending set is the only state shared between files, and it is passed explicitly
// - Files are processed in sorted path order, so identical trees give identical results
// - Each exported function is instrumented at most once per run
// - A source file is either fully rewritten or left untouched
// - Only exported functions with a located body are ever modified

pub mod ast;
pub mod config;
pub mod format;
pub mod git;
pub mod header;
pub mod lexer;
pub mod locate;
pub mod params;
pub mod persist;
pub mod report;
pub mod rewrite;

pub use ast::{FunctionDescriptor, ParameterDescriptor, PendingFunctions};
pub use config::{InstrumentMode, ResolvedConfig};
pub use report::{render_json, render_text, FileOutcome, RunReport};
pub use rewrite::{LogStyle, UnformattedPolicy};

use anyhow::{Context, Result};
use header::ExportScanner;
use rayon::prelude::*;
use report::SkippedFile;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Drives one instrumentation run over a set of roots
///
/// Headers are loaded first (full mode), then source files are handed to
/// [`Instrumenter::process_file`] one at a time. [`Instrumenter::finish`]
/// turns what is left into the run report.
pub struct Instrumenter {
    config: ResolvedConfig,
    scanner: ExportScanner,
    dry_run: bool,
    pending: PendingFunctions,
    /// Every exported function seen so far, in discovery order
    exported: Vec<FunctionDescriptor>,
    known: HashSet<String>,
    report: RunReport,
}

impl Instrumenter {
    pub fn new(config: ResolvedConfig) -> Result<Self> {
        let scanner = ExportScanner::new(&config.export_marker)?;
        let report = RunReport {
            mode: config.mode.as_str().to_string(),
            ..RunReport::default()
        };
        Ok(Instrumenter {
            config,
            scanner,
            dry_run: false,
            pending: PendingFunctions::new(),
            exported: Vec::new(),
            known: HashSet::new(),
            report,
        })
    }

    /// Compute every edit but write nothing
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self.report.dry_run = dry_run;
        self
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn pending(&self) -> &PendingFunctions {
        &self.pending
    }

    /// Exported functions discovered so far, in discovery order
    pub fn exported(&self) -> &[FunctionDescriptor] {
        &self.exported
    }

    /// Check that every root is a readable directory and record it
    pub fn add_roots(&mut self, roots: &[PathBuf]) -> Result<()> {
        for root in roots {
            if !root.is_dir() {
                anyhow::bail!("root directory does not exist: {}", root.display());
            }
            std::fs::read_dir(root)
                .with_context(|| format!("failed to read root directory: {}", root.display()))?;
            self.report.roots.push(root.display().to_string());
        }
        Ok(())
    }

    /// Headers under `roots` that are scanned for exports, sorted
    pub fn collect_headers(&self, roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
        collect_matching(roots, |p| self.config.should_scan_header(p))
    }

    /// Source files under `roots` that may be rewritten, sorted
    pub fn collect_sources(&self, roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
        collect_matching(roots, |p| self.config.should_rewrite(p))
    }

    /// Add exported functions to the pending set unless seen before in this run
    fn register(&mut self, functions: Vec<FunctionDescriptor>) {
        for function in functions {
            if self.known.insert(function.name.clone()) {
                self.pending.insert_if_absent(function.clone());
                self.exported.push(function);
            }
        }
    }

    /// Read headers in parallel and add their exports to the pending set
    ///
    /// Merging happens in the order of `headers`. Unreadable headers are
    /// logged and recorded as skipped. Returns the number of new functions.
    pub fn load_headers(&mut self, headers: &[PathBuf]) -> usize {
        let scanner = &self.scanner;
        let results: Vec<(&PathBuf, Result<Vec<FunctionDescriptor>>)> = headers
            .par_iter()
            .map(|path| {
                let functions =
                    persist::read_source(path).map(|text| scanner.exported_functions(&text));
                (path, functions)
            })
            .collect();

        let before = self.exported.len();
        for (path, functions) in results {
            match functions {
                Ok(functions) => {
                    self.report.headers_scanned += 1;
                    self.register(functions);
                }
                Err(e) => self.skip(path, &e),
            }
        }

        let added = self.exported.len() - before;
        self.report.exported = self.exported.len();
        tracing::info!(headers = headers.len(), functions = added, "scanned headers");
        added
    }

    fn skip(&mut self, path: &Path, error: &anyhow::Error) {
        tracing::warn!(path = %path.display(), "skipping file: {:#}", error);
        self.report.skipped.push(SkippedFile {
            path: path.display().to_string(),
            reason: format!("{:#}", error),
        });
    }

    /// Header sharing the stem of `source`, trying extensions in configured order
    fn paired_header(&self, source: &Path) -> Option<PathBuf> {
        self.config
            .header_extensions
            .iter()
            .map(|ext| source.with_extension(ext))
            .find(|candidate| candidate.is_file())
    }

    /// Instrument one source file, writing it back unless this is a dry run
    pub fn instrument_file(&mut self, path: &Path) -> Result<FileOutcome> {
        let source = persist::read_source(path)?;

        let edit = match self.config.mode {
            InstrumentMode::Full => {
                rewrite::instrument_source(&source, &mut self.pending, &self.config.style)
            }
            InstrumentMode::Paired => {
                let Some(header_path) = self.paired_header(path) else {
                    tracing::debug!(path = %path.display(), "no paired header");
                    return Ok(FileOutcome {
                        path: path.display().to_string(),
                        ..FileOutcome::default()
                    });
                };
                let header = persist::read_source(&header_path)?;
                let functions = self.scanner.exported_functions(&header);
                self.report.headers_scanned += 1;
                self.register(functions.clone());
                self.report.exported = self.exported.len();

                rewrite::instrument_paired(
                    &source,
                    &functions,
                    &mut self.pending,
                    &self.config.style,
                )
            }
        };

        let written = edit.changed() && !self.dry_run;
        if written {
            persist::atomic_write(path, &edit.content)?;
        }
        if edit.changed() {
            tracing::info!(
                path = %path.display(),
                functions = edit.instrumented.len(),
                dry_run = self.dry_run,
                "instrumented"
            );
        }

        Ok(FileOutcome {
            path: path.display().to_string(),
            instrumented: edit.instrumented,
            already_instrumented: edit.already_instrumented,
            include_added: edit.include_added,
            written,
        })
    }

    /// Instrument one source file, recording the outcome in the run report
    ///
    /// Failures are logged and recorded as skipped files, never propagated.
    pub fn process_file(&mut self, path: &Path) {
        self.report.files_scanned += 1;
        match self.instrument_file(path) {
            Ok(outcome) => {
                if outcome.changed() || !outcome.already_instrumented.is_empty() {
                    self.report.files.push(outcome);
                }
            }
            Err(e) => self.skip(path, &e),
        }
    }

    /// Close the run: whatever is still pending is left over
    pub fn finish(mut self) -> RunReport {
        self.report.exported = self.exported.len();
        self.report.leftovers = self.pending.into_leftovers();
        tracing::info!(
            instrumented = self.report.instrumented_count(),
            leftovers = self.report.leftovers.len(),
            "run complete"
        );
        self.report
    }
}

/// Run a complete instrumentation pass over `roots`
pub fn instrument_roots(
    roots: &[PathBuf],
    config: ResolvedConfig,
    dry_run: bool,
) -> Result<RunReport> {
    let mut instrumenter = Instrumenter::new(config)?.with_dry_run(dry_run);
    instrumenter.add_roots(roots)?;

    if instrumenter.config().mode == InstrumentMode::Full {
        let headers = instrumenter.collect_headers(roots)?;
        instrumenter.load_headers(&headers);
    }

    for source in instrumenter.collect_sources(roots)? {
        instrumenter.process_file(&source);
    }

    Ok(instrumenter.finish())
}

/// Exported functions declared in the headers under `roots`
pub fn scan_exports(roots: &[PathBuf], config: ResolvedConfig) -> Result<Vec<FunctionDescriptor>> {
    let mut instrumenter = Instrumenter::new(config)?;
    instrumenter.add_roots(roots)?;
    let headers = instrumenter.collect_headers(roots)?;
    instrumenter.load_headers(&headers);
    Ok(instrumenter.exported().to_vec())
}

/// Files under `roots` accepted by `keep`, sorted and deduplicated
fn collect_matching<F>(roots: &[PathBuf], keep: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let mut files = Vec::new();
    for root in roots {
        tracing::info!(root = %root.display(), "processing directory");
        if root.is_file() {
            if keep(root.as_path()) {
                files.push(root.clone());
            }
        } else {
            collect_files_recursive(root, &keep, &mut files)?;
        }
    }

    // Sort files for deterministic order
    files.sort();
    files.dedup();
    Ok(files)
}

/// Returns true for directory names that should not be traversed
fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.')
}

/// Process one directory entry, pushing kept files or recursing into dirs
fn process_dir_entry<F>(
    path: PathBuf,
    metadata: std::fs::Metadata,
    keep: &F,
    files: &mut Vec<PathBuf>,
) -> Result<()>
where
    F: Fn(&Path) -> bool,
{
    if metadata.is_symlink() {
        return Ok(());
    }

    if metadata.is_dir() {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if is_skipped_dir(name) {
                return Ok(());
            }
        }
        collect_files_recursive(&path, keep, files)?;
    } else if metadata.is_file() && keep(path.as_path()) {
        files.push(path);
    }

    Ok(())
}

/// Recursively collect files accepted by `keep` from a directory
fn collect_files_recursive<F>(dir: &Path, keep: &F, files: &mut Vec<PathBuf>) -> Result<()>
where
    F: Fn(&Path) -> bool,
{
    for entry_result in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry_result?;
        let path = entry.path();
        let metadata = std::fs::symlink_metadata(&path)
            .with_context(|| format!("failed to read metadata: {}", path.display()))?;
        process_dir_entry(path, metadata, keep, files)?;
    }

    Ok(())
}
