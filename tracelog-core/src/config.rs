//! Configuration file support for tracelog
//!
//! Loads project-specific configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.tracelogrc.json` in project root
//! 3. `tracelog.config.json` in project root
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::params::is_identifier;
use crate::rewrite::{LogStyle, UnformattedPolicy};
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_EXPORT_MARKER: &str = "EXPORT";

/// Path substrings excluded from source rewriting when none are configured
const DEFAULT_EXCLUDES: &[&str] = &["/util/", "\\util\\", "graphics"];

/// Path substrings excluded from header scanning when none are configured
const DEFAULT_HEADER_EXCLUDES: &[&str] = &["frontend", "/util/", "\\util\\"];

const DEFAULT_HEADER_EXTENSIONS: &[&str] = &["h", "hpp"];
const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx"];

/// How source files are matched to exported functions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentMode {
    /// All headers feed one pending set shared by every source file
    #[default]
    Full,
    /// Each source file is matched against the header sharing its stem
    Paired,
}

impl InstrumentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentMode::Full => "full",
            InstrumentMode::Paired => "paired",
        }
    }
}

/// tracelog configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TracelogConfig {
    /// Directories to process, relative to the project root
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Token that marks an exported declaration (default: EXPORT)
    #[serde(default)]
    pub export_marker: Option<String>,

    /// Name of the injected logging function (default: blog)
    #[serde(default)]
    pub logging_function: Option<String>,

    /// Level argument of the injected call (default: LOG_DEBUG)
    #[serde(default)]
    pub log_level: Option<String>,

    /// Include target patched into rewritten files (default: <util/base.h>)
    #[serde(default)]
    pub log_include: Option<String>,

    /// Path substrings excluded from source rewriting
    #[serde(default)]
    pub exclude: Option<Vec<String>>,

    /// Path substrings excluded from header scanning
    #[serde(default)]
    pub header_exclude: Option<Vec<String>>,

    /// Glob patterns excluded from both passes
    #[serde(default)]
    pub exclude_globs: Vec<String>,

    #[serde(default)]
    pub header_extensions: Option<Vec<String>>,

    #[serde(default)]
    pub source_extensions: Option<Vec<String>>,

    /// Treatment of parameters with no format specifier
    #[serde(default)]
    pub unformatted: Option<UnformattedPolicy>,

    #[serde(default)]
    pub mode: Option<InstrumentMode>,
}

/// Resolved configuration with compiled glob patterns
#[derive(Debug)]
pub struct ResolvedConfig {
    /// Roots as configured; empty means the path given on the command line
    pub roots: Vec<PathBuf>,
    pub export_marker: String,
    pub style: LogStyle,
    pub exclude: Vec<String>,
    pub header_exclude: Vec<String>,
    pub exclude_globs: GlobSet,
    pub header_extensions: Vec<String>,
    pub source_extensions: Vec<String>,
    pub mode: InstrumentMode,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn validate_token(field: &str, value: Option<&str>) -> Result<()> {
    if let Some(v) = value {
        if !is_identifier(v) {
            anyhow::bail!("{} must be a C identifier (got {:?})", field, v);
        }
    }
    Ok(())
}

fn validate_extensions(field: &str, value: Option<&[String]>) -> Result<()> {
    if let Some(exts) = value {
        if exts.is_empty() {
            anyhow::bail!("{} must not be empty", field);
        }
        if let Some(bad) = exts
            .iter()
            .find(|e| e.is_empty() || e.starts_with('.') || e.contains(['/', '\\']))
        {
            anyhow::bail!(
                "{} entries are bare extensions such as \"c\" (got {:?})",
                field,
                bad
            );
        }
    }
    Ok(())
}

impl TracelogConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        validate_token("export_marker", self.export_marker.as_deref())?;
        validate_token("logging_function", self.logging_function.as_deref())?;
        validate_token("log_level", self.log_level.as_deref())?;

        if let Some(ref include) = self.log_include {
            let wrapped = include.len() > 2
                && ((include.starts_with('<') && include.ends_with('>'))
                    || (include.starts_with('"') && include.ends_with('"')));
            if !wrapped {
                anyhow::bail!(
                    "log_include must be wrapped in <> or \"\" (got {:?})",
                    include
                );
            }
        }

        validate_extensions("header_extensions", self.header_extensions.as_deref())?;
        validate_extensions("source_extensions", self.source_extensions.as_deref())?;

        for pattern in &self.exclude_globs {
            Glob::new(pattern)
                .with_context(|| format!("invalid exclude_globs pattern: {}", pattern))?;
        }

        Ok(())
    }

    /// Resolve config into compiled form ready for use
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let exclude_globs = {
            let mut builder = GlobSetBuilder::new();
            for pattern in &self.exclude_globs {
                builder.add(Glob::new(pattern)?);
            }
            builder.build()?
        };

        let defaults = LogStyle::default();
        let style = LogStyle {
            function: self
                .logging_function
                .clone()
                .unwrap_or(defaults.function),
            level: self.log_level.clone().unwrap_or(defaults.level),
            include: self.log_include.clone().unwrap_or(defaults.include),
            unformatted: self.unformatted.unwrap_or_default(),
        };

        Ok(ResolvedConfig {
            roots: self.roots.clone(),
            export_marker: self
                .export_marker
                .clone()
                .unwrap_or_else(|| DEFAULT_EXPORT_MARKER.to_string()),
            style,
            exclude: self
                .exclude
                .clone()
                .unwrap_or_else(|| owned(DEFAULT_EXCLUDES)),
            header_exclude: self
                .header_exclude
                .clone()
                .unwrap_or_else(|| owned(DEFAULT_HEADER_EXCLUDES)),
            exclude_globs,
            header_extensions: self
                .header_extensions
                .clone()
                .unwrap_or_else(|| owned(DEFAULT_HEADER_EXTENSIONS)),
            source_extensions: self
                .source_extensions
                .clone()
                .unwrap_or_else(|| owned(DEFAULT_SOURCE_EXTENSIONS)),
            mode: self.mode.unwrap_or_default(),
            config_path: None,
        })
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        TracelogConfig::default().resolve()
    }

    pub fn is_header(&self, path: &Path) -> bool {
        has_extension(path, &self.header_extensions)
    }

    pub fn is_source(&self, path: &Path) -> bool {
        has_extension(path, &self.source_extensions)
    }

    fn excluded_by(&self, path: &Path, substrings: &[String]) -> bool {
        let path_str = path.to_string_lossy();
        substrings.iter().any(|s| path_str.contains(s.as_str()))
            || self.exclude_globs.is_match(path_str.as_ref())
    }

    /// Check if a header should be scanned for exports
    pub fn should_scan_header(&self, path: &Path) -> bool {
        self.is_header(path) && !self.excluded_by(path, &self.header_exclude)
    }

    /// Check if a source file should be rewritten
    pub fn should_rewrite(&self, path: &Path) -> bool {
        self.is_source(path) && !self.excluded_by(path, &self.exclude)
    }

    /// Directories to process, falling back to `default_root`
    ///
    /// Relative configured roots are taken relative to `project_root`.
    pub fn roots_or(&self, project_root: &Path, default_root: &Path) -> Vec<PathBuf> {
        if self.roots.is_empty() {
            return vec![default_root.to_path_buf()];
        }
        self.roots
            .iter()
            .map(|r| {
                if r.is_relative() {
                    project_root.join(r)
                } else {
                    r.clone()
                }
            })
            .collect()
    }
}

/// Discover and load a config file from the project root
///
/// Search order:
/// 1. `.tracelogrc.json`
/// 2. `tracelog.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(project_root: &Path) -> Result<Option<(TracelogConfig, PathBuf)>> {
    for name in [".tracelogrc.json", "tracelog.config.json"] {
        let path = project_root.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }

    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<TracelogConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: TracelogConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config for a project
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config from the project root.
/// Returns default config if nothing is found.
pub fn load_and_resolve(project_root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(project_root)? {
            Some((config, path)) => (config, Some(path)),
            None => (TracelogConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    resolved.config_path = source_path;
    Ok(resolved)
}
