//! tracelog CLI - inject entry trace logging into exported C functions

#![deny(warnings)]

// Global invariants enforced:
// - Sources are rewritten in sorted path order
// - A failed checkout aborts before any file is touched
// - Identical input yields byte-for-byte identical output

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracelog_core::config::{self, ResolvedConfig};
use tracelog_core::persist::atomic_write;
use tracelog_core::report::{render_exports_json, render_exports_text, render_leftovers};
use tracelog_core::{git, render_json, render_text, scan_exports};
use tracelog_core::{InstrumentMode, Instrumenter, UnformattedPolicy};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tracelog")]
#[command(about = "Inject entry trace logging into exported C functions")]
#[command(version = env!("TRACELOG_VERSION"))]
struct Cli {
    /// Log every located function
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Instrument the exported functions defined under a directory
    Run {
        /// Directory to process (config `roots` override it)
        path: PathBuf,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Instrumentation mode (overrides config file)
        #[arg(long)]
        mode: Option<ModeArg>,

        /// Treatment of parameters with no format specifier (overrides config file)
        #[arg(long)]
        unformatted: Option<UnformattedArg>,

        /// Restore the roots to their committed state before instrumenting
        #[arg(long)]
        checkout: bool,

        /// Restore the roots to their committed state and stop
        #[arg(long)]
        checkout_only: bool,

        /// Report what would change without writing any file
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Write left over function names to this file, one per line
        #[arg(long)]
        leftover_out: Option<PathBuf>,

        /// Write the exported functions as a JSON array to this file
        #[arg(long)]
        exports_out: Option<PathBuf>,
    },
    /// List exported functions declared in headers (no files are modified)
    Exports {
        /// Directory to scan
        path: PathBuf,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Restore a directory to its committed state
    Checkout {
        /// Directory to restore
        path: PathBuf,
    },
    /// Validate or show configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without running
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    Full,
    Paired,
}

impl From<ModeArg> for InstrumentMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => InstrumentMode::Full,
            ModeArg::Paired => InstrumentMode::Paired,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum UnformattedArg {
    Skip,
    Address,
    Annotate,
}

impl From<UnformattedArg> for UnformattedPolicy {
    fn from(policy: UnformattedArg) -> Self {
        match policy {
            UnformattedArg::Skip => UnformattedPolicy::Skip,
            UnformattedArg::Address => UnformattedPolicy::Address,
            UnformattedArg::Annotate => UnformattedPolicy::Annotate,
        }
    }
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        "tracelog=debug,tracelog_core=debug"
    } else {
        "tracelog=info,tracelog_core=info"
    };

    let filter = EnvFilter::try_from_env("TRACELOG_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

/// Make `path` absolute and check that it exists
fn normalize_path(path: PathBuf) -> anyhow::Result<PathBuf> {
    let normalized = if path.is_relative() {
        std::env::current_dir()?.join(&path)
    } else {
        path
    };

    if !normalized.exists() {
        anyhow::bail!("Path does not exist: {}", normalized.display());
    }
    Ok(normalized)
}

/// Load configuration for `path`, discovering it from the enclosing repository
fn load_config(
    path: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<(PathBuf, ResolvedConfig)> {
    let project_root = git::find_repo_root(path).unwrap_or_else(|_| path.to_path_buf());
    let resolved = config::load_and_resolve(&project_root, config_path)
        .context("failed to load configuration")?;
    Ok((project_root, resolved))
}

fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Run {
            path,
            config: config_path,
            mode,
            unformatted,
            checkout,
            checkout_only,
            dry_run,
            format,
            leftover_out,
            exports_out,
        } => {
            let path = normalize_path(path)?;
            let (project_root, mut resolved) = load_config(&path, config_path.as_deref())?;
            if let Some(mode) = mode {
                resolved.mode = mode.into();
            }
            if let Some(policy) = unformatted {
                resolved.style.unformatted = policy.into();
            }
            let roots = resolved.roots_or(&project_root, &path);

            if checkout || checkout_only {
                tracing::info!(roots = roots.len(), "restoring roots before run");
                for root in &roots {
                    git::checkout_path(root)?;
                }
                if checkout_only {
                    for root in &roots {
                        println!("Restored {}", root.display());
                    }
                    return Ok(());
                }
            }

            let mode = resolved.mode;
            let mut instrumenter = Instrumenter::new(resolved)?.with_dry_run(dry_run);
            instrumenter.add_roots(&roots)?;

            if mode == InstrumentMode::Full {
                let headers = instrumenter.collect_headers(&roots)?;
                instrumenter.load_headers(&headers);
            }

            let sources = instrumenter.collect_sources(&roots)?;
            let bar = progress_bar(sources.len() as u64);
            for source in &sources {
                bar.set_message(source.display().to_string());
                bar.suspend(|| instrumenter.process_file(source));
                bar.inc(1);
            }
            bar.finish_and_clear();

            let exported = instrumenter.exported().to_vec();
            let report = instrumenter.finish();

            if let Some(out) = exports_out {
                atomic_write(&out, &render_exports_json(&exported)?)?;
                tracing::info!(path = %out.display(), count = exported.len(), "wrote exports");
            }
            if let Some(out) = leftover_out {
                atomic_write(&out, &render_leftovers(&report.leftovers))?;
                tracing::info!(
                    path = %out.display(),
                    count = report.leftovers.len(),
                    "wrote leftovers"
                );
            }

            match format {
                OutputFormat::Text => print!("{}", render_text(&report)),
                OutputFormat::Json => println!("{}", render_json(&report)?),
            }
        }
        Commands::Exports {
            path,
            config: config_path,
            format,
        } => {
            let path = normalize_path(path)?;
            let (project_root, resolved) = load_config(&path, config_path.as_deref())?;
            let roots = resolved.roots_or(&project_root, &path);
            let functions = scan_exports(&roots, resolved)?;

            match format {
                OutputFormat::Text => print!("{}", render_exports_text(&functions)),
                OutputFormat::Json => println!("{}", render_exports_json(&functions)?),
            }
        }
        Commands::Checkout { path } => {
            let path = normalize_path(path)?;
            git::checkout_path(&path)?;
            println!("Restored {}", path.display());
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref());

                match resolved {
                    Ok(config) => {
                        if let Some(ref p) = config.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref())
                    .context("failed to load configuration")?;

                println!("Configuration:");
                if let Some(ref p) = resolved.config_path {
                    println!("  Source: {}", p.display());
                } else {
                    println!("  Source: defaults (no config file found)");
                }
                println!();
                println!("Injected call:");
                println!(
                    "  {}({}, \"...\");",
                    resolved.style.function, resolved.style.level
                );
                println!("  include: {}", resolved.style.include);
                println!("  unformatted: {}", resolved.style.unformatted.as_str());
                println!();
                println!("Scan:");
                println!("  mode: {}", resolved.mode.as_str());
                println!("  export marker: {}", resolved.export_marker);
                println!(
                    "  roots: {}",
                    if resolved.roots.is_empty() {
                        "command line path".to_string()
                    } else {
                        resolved
                            .roots
                            .iter()
                            .map(|r| r.display().to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    }
                );
                println!("  headers: {}", resolved.header_extensions.join(", "));
                println!("  sources: {}", resolved.source_extensions.join(", "));
                println!("  exclude: {}", resolved.exclude.join(", "));
                println!("  header exclude: {}", resolved.header_exclude.join(", "));
            }
        },
    }

    Ok(())
}
