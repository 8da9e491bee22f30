//! Binary entry point for quizpool.
//!
//! Runs the content engine against a catalog and an optional LLM backend,
//! and offers a few maintenance commands for the fingerprint store.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// CLI output goes to stdout/stderr directly
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use quizpool::config::StoreSettings;
use quizpool::observability::{self, InitOptions};
use quizpool::services::deduplication::Fingerprinter;
use quizpool::{
    ContentEngine, FilesystemFingerprintStore, FingerprintStore, QuizPoolConfig, Signature,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

/// quizpool - adaptive content pool engine for quiz items.
#[derive(Parser)]
#[command(name = "quizpool")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "QUIZPOOL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the engine, wait for pools to fill and draw items.
    Run {
        /// Items to draw per category.
        #[arg(short = 'n', long, default_value = "3")]
        draw: usize,

        /// Seconds to wait for the initial fill.
        #[arg(long, default_value = "30")]
        wait_secs: u64,

        /// Local catalog file (overrides `catalog_path`).
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Expose Prometheus metrics while running.
        #[arg(long)]
        metrics: bool,
    },

    /// Show resolved configuration and store size.
    Status,

    /// Print the SimHash signature of a text.
    Fingerprint {
        /// Text to fingerprint.
        text: String,

        /// Second text to compare against.
        #[arg(long)]
        compare: Option<String>,
    },

    /// Inspect or reset the persisted fingerprint store.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

/// Fingerprint store actions.
#[derive(Subcommand)]
enum StoreAction {
    /// List persisted signatures, oldest first.
    Show,
    /// Remove every persisted signature.
    Clear,
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    let metrics_expose = matches!(cli.command, Commands::Run { metrics: true, .. });
    let _observability = match observability::init_from_config(
        &config,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    let result = match cli.command {
        Commands::Run {
            draw,
            wait_secs,
            catalog,
            metrics: _,
        } => cmd_run(config, draw, Duration::from_secs(wait_secs), catalog).await,
        Commands::Status => cmd_status(&config),
        Commands::Fingerprint { text, compare } => cmd_fingerprint(&config, &text, compare),
        Commands::Store { action } => cmd_store(&config, action),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads the config file, applies env overrides and fills in defaults.
fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<QuizPoolConfig> {
    let config = match path {
        Some(path) => QuizPoolConfig::load_from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => QuizPoolConfig::load_default(),
    };
    let mut config = config.with_env_overrides();
    if config.store.path.is_none() {
        config.store.path = StoreSettings::default_path();
    }
    config.validate()?;
    Ok(config)
}

async fn cmd_run(
    mut config: QuizPoolConfig,
    draw: usize,
    wait: Duration,
    catalog: Option<PathBuf>,
) -> anyhow::Result<()> {
    if catalog.is_some() {
        config.catalog_path = catalog;
    }
    if config.categories.is_empty() {
        bail!("no categories configured; add [[categories]] to the config file");
    }

    let categories = config.categories.clone();
    let capacity = config.pool.capacity;
    let low_water_mark = config.pool.low_water_mark;
    let engine = ContentEngine::from_config(config).context("building engine")?;
    engine
        .start(categories.clone(), capacity, low_water_mark)
        .context("starting engine")?;

    let deadline = Instant::now() + wait;
    while Instant::now() < deadline {
        let status = engine.pool_status();
        if status.values().all(|&occupancy| occupancy >= capacity) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    for spec in &categories {
        for _ in 0..draw {
            let Some(item) = engine.get_item(&spec.name) else {
                eprintln!("{}: pool empty", spec.name);
                break;
            };
            println!("{}", serde_json::to_string(&item)?);
        }
    }

    let mut status: Vec<_> = engine.pool_status().into_iter().collect();
    status.sort();
    for (category, occupancy) in status {
        let stats = engine.pool_stats(&category).unwrap_or_default();
        let level = engine
            .difficulty(&category)
            .map_or_else(|| "-".to_string(), |state| state.level.to_string());
        eprintln!(
            "{category}: {occupancy}/{capacity} ready, level {level}, admitted {}, duplicates {}, abandoned cycles {}",
            stats.admitted, stats.rejected_duplicates, stats.cycles_abandoned
        );
    }

    engine.stop().await;
    Ok(())
}

fn cmd_status(config: &QuizPoolConfig) -> anyhow::Result<()> {
    println!("quizpool status");
    println!("===============");
    println!();
    println!(
        "Pool:        capacity {}, low-water mark {}, target {}",
        config.pool.capacity,
        config.pool.low_water_mark,
        config.pool.effective_target()
    );
    println!(
        "Generation:  timeout {}ms, {} attempts",
        config.generation.timeout.as_millis(),
        config.generation.max_attempts
    );
    println!(
        "Dedup:       {} (threshold {} bits)",
        if config.dedup.enabled { "enabled" } else { "disabled" },
        config.dedup.threshold
    );
    println!(
        "Difficulty:  start {}, window {}",
        config.difficulty.initial_level, config.difficulty.window_size
    );
    println!(
        "Catalog:     {}",
        config
            .catalog_path
            .as_ref()
            .map_or_else(|| "(none)".to_string(), |p| p.display().to_string())
    );
    println!(
        "LLM:         {}",
        config
            .llm
            .provider
            .map_or_else(|| "(none)".to_string(), |p| format!("{p:?}"))
    );
    println!("Categories:");
    for spec in &config.categories {
        if spec.topics.is_empty() {
            println!("  - {}", spec.name);
        } else {
            println!("  - {} ({})", spec.name, spec.topics.join(", "));
        }
    }

    match &config.store.path {
        Some(path) => {
            let store = FilesystemFingerprintStore::with_capacity(path.clone(), config.store.capacity);
            match store.len() {
                Ok(len) => println!(
                    "Store:       {} ({len}/{} signatures)",
                    path.display(),
                    store.capacity()
                ),
                Err(e) => println!("Store:       {} (unreadable: {e})", path.display()),
            }
        },
        None => println!("Store:       (in memory)"),
    }
    Ok(())
}

fn cmd_fingerprint(
    config: &QuizPoolConfig,
    text: &str,
    compare: Option<String>,
) -> anyhow::Result<()> {
    let fingerprinter = Fingerprinter::from_config(&config.dedup);
    let signature = fingerprinter.fingerprint_text(text);
    println!("{signature}");

    if let Some(other) = compare {
        let other_signature = fingerprinter.fingerprint_text(&other);
        let distance = signature.hamming_distance(other_signature);
        let verdict = if signature.is_near(other_signature, config.dedup.threshold) {
            "duplicate"
        } else {
            "distinct"
        };
        println!("{other_signature}");
        println!(
            "distance {distance} (threshold {}): {verdict}",
            config.dedup.threshold
        );
    }
    Ok(())
}

fn cmd_store(config: &QuizPoolConfig, action: StoreAction) -> anyhow::Result<()> {
    let Some(path) = &config.store.path else {
        bail!("no store path configured");
    };
    let store = FilesystemFingerprintStore::with_capacity(path.clone(), config.store.capacity);

    match action {
        StoreAction::Show => {
            let signatures: Vec<Signature> = store.load()?;
            for signature in &signatures {
                println!("{signature}");
            }
            eprintln!(
                "{} of {} signatures in {}",
                signatures.len(),
                store.capacity(),
                path.display()
            );
        },
        StoreAction::Clear => {
            store.clear()?;
            eprintln!("Cleared {}", path.display());
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["quizpool", "run"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Run {
                draw: 3,
                wait_secs: 30,
                catalog: None,
                metrics: false,
            }
        ));
    }

    #[test]
    fn test_fingerprint_compare() {
        let cli =
            Cli::try_parse_from(["quizpool", "-v", "fingerprint", "a b", "--compare", "a c"])
                .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Fingerprint { text, compare } => {
                assert_eq!(text, "a b");
                assert_eq!(compare.as_deref(), Some("a c"));
            },
            _ => unreachable!("parsed fingerprint command"),
        }
    }

    #[test]
    fn test_store_requires_action() {
        assert!(Cli::try_parse_from(["quizpool", "store"]).is_err());
        assert!(Cli::try_parse_from(["quizpool", "store", "clear"]).is_ok());
    }
}
