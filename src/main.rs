//! Harvest main entry point
//!
//! This is the command-line interface for the Harvest product crawler.

use clap::Parser;
use harvest::config::{load_config_with_hash, resolve_run_config, Config, RunConfig, RunOverrides};
use harvest::crawler::{load_summary, RunController, RunOptions};
use harvest::extract::SelectorRegistry;
use harvest::output::print_summary;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Harvest: a resumable product-page crawler
///
/// Harvest reads product URLs from a CSV file, extracts configured fields from
/// every page and writes the records to an output CSV. Progress is checkpointed
/// after every batch; rerunning with the same checkpoint resumes the crawl.
#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(version)]
#[command(about = "A resumable product-page crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Input CSV file (overrides [input] path)
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Number of items per batch
    #[arg(long, value_name = "N")]
    batch: Option<usize>,

    /// First index to crawl (0-based)
    #[arg(long, value_name = "N")]
    start: Option<usize>,

    /// Last index to crawl (inclusive)
    #[arg(long, value_name = "N")]
    end: Option<usize>,

    /// Skip failed items instead of retrying them
    #[arg(long)]
    no_restart: bool,

    /// Accept every extracted record without validation
    #[arg(long)]
    no_validate: bool,

    /// Output CSV file (overrides [output] path)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Checkpoint file (overrides [output] checkpoint-path)
    #[arg(long, value_name = "PATH")]
    checkpoint: Option<PathBuf>,

    /// Delete the checkpoint and output and start over
    #[arg(long)]
    fresh: bool,

    /// Remove a stale run lock left by a crashed run
    #[arg(long)]
    break_lock: bool,

    /// Print the effective configuration and field rules, then exit
    #[arg(long, conflicts_with_all = ["stats", "fresh"])]
    show_config: bool,

    /// Print the summary of the existing checkpoint, then exit
    #[arg(long, conflicts_with_all = ["show_config", "fresh"])]
    stats: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> RunOverrides {
        RunOverrides {
            input_path: self.input.clone(),
            batch_size: self.batch,
            start_index: self.start,
            end_index: self.end,
            disable_restart: self.no_restart,
            disable_validate: self.no_validate,
            output_path: self.output.clone(),
            checkpoint_path: self.checkpoint.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> harvest::Result<u8> {
    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let run_config = resolve_run_config(&config, &cli.overrides())?;

    if cli.show_config {
        handle_show_config(&config, &run_config)?;
        return Ok(0);
    }

    if cli.stats {
        handle_stats(&run_config)?;
        return Ok(0);
    }

    handle_crawl(config, run_config, config_hash, &cli).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("harvest=info,warn"),
            1 => EnvFilter::new("harvest=debug,info"),
            2 => EnvFilter::new("harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --show-config: prints the effective configuration and field rules
fn handle_show_config(config: &Config, run: &RunConfig) -> harvest::Result<()> {
    let registry = SelectorRegistry::from_config(&config.fields)?;

    println!("=== Harvest Configuration ===\n");

    println!("Run:");
    println!("  Input: {}", run.input_path.display());
    println!("  Output: {}", run.output_path.display());
    println!("  Checkpoint: {}", run.checkpoint_path.display());
    println!("  Batch size: {}", run.batch_size);
    println!(
        "  Range: {}..={}",
        run.start_index.unwrap_or(0),
        run.end_index
            .map_or_else(|| "end".to_string(), |e| e.to_string())
    );
    println!(
        "  Restart: {} (max attempts {})",
        run.restart_enabled,
        run.effective_max_attempts()
    );
    println!(
        "  Validate: {} (accept partial: {})",
        run.validate_enabled, run.accept_partial
    );

    println!("\nFields ({}):", registry.len());
    for field in registry.fields() {
        let mut flags = Vec::new();
        if field.required {
            flags.push("required".to_string());
        }
        if field.numeric {
            flags.push("numeric".to_string());
        }
        if let Some(fallback) = &field.fallback {
            flags.push(format!("fallback: {}", fallback));
        }
        println!("  - {} [{}] {}", field.name, field.rule.kind(), flags.join(", "));
        for selector in field.rule.selectors() {
            println!("    * {}", selector);
        }
    }

    // Fails only on values TOML cannot represent
    match toml::to_string_pretty(config) {
        Ok(text) => println!("\nConfiguration file:\n\n{}", text),
        Err(e) => tracing::warn!("Could not render configuration: {}", e),
    }

    Ok(())
}

/// Handles --stats: prints the summary of the existing checkpoint
fn handle_stats(run: &RunConfig) -> harvest::Result<()> {
    println!("Checkpoint: {}\n", run.checkpoint_path.display());

    match load_summary(&run.checkpoint_path)? {
        Some(summary) => print_summary(&summary),
        None => println!("No progress recorded yet"),
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    run: RunConfig,
    config_hash: String,
    cli: &Cli,
) -> harvest::Result<u8> {
    let controller = RunController::new(config, run)?
        .with_config_hash(config_hash)
        .with_options(RunOptions {
            fresh: cli.fresh,
            break_lock: cli.break_lock,
        });

    let stop = controller.stop_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received, stopping after the current item (again to quit now)");
        stop.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt, exiting without saving");
            std::process::exit(130);
        }
    });

    let outcome = controller.run().await?;
    if let Some(summary) = &outcome.summary {
        if !cli.quiet {
            print_summary(summary);
        }
    }

    Ok(outcome.exit_code())
}
