//! Bramble main entry point
//!
//! This is the command-line interface for the bramble web content fuzzer.

use bramble::config::load_config_with_hash;
use bramble::input::{InputProvider, ProductInput, WordlistInput};
use bramble::job::Job;
use bramble::output::{JsonFileOutput, MultiOutput, OutputProvider, StdoutOutput};
use bramble::runner::HttpRunner;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Bramble: a recursive web content fuzzer
///
/// Bramble substitutes wordlist entries into a request template, fires the
/// requests concurrently, and reports the responses that survive the
/// configured matchers and filters. Discovered directories can be fuzzed
/// recursively.
#[derive(Parser, Debug)]
#[command(name = "bramble")]
#[command(version)]
#[command(about = "A recursive web content fuzzer", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be fuzzed without sending requests
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    if cli.quiet {
        config.output.quiet = true;
    }
    config.command_line = std::env::args().collect::<Vec<_>>().join(" ");

    if cli.dry_run {
        handle_dry_run(&config)?;
        return Ok(());
    }

    handle_fuzz(config, config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("bramble=warn"),
            1 => EnvFilter::new("bramble=info,warn"),
            2 => EnvFilter::new("bramble=debug,info"),
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

/// Handles the --dry-run mode: validates config and shows what would be fuzzed
fn handle_dry_run(config: &bramble::Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Bramble Dry Run ===\n");

    println!("Target:");
    println!("  URL: {}", config.target.url);
    println!("  Method: {}", config.target.method);

    println!("\nFuzzer:");
    println!("  Threads: {}", config.fuzzer.threads);
    println!("  Rate limit: {} req/sec", config.fuzzer.rate);
    println!("  Timeout: {}s", config.fuzzer.timeout);

    println!("\nWordlists ({}):", config.wordlists.len());
    let mut total = 1usize;
    for wordlist in &config.wordlists {
        let input = WordlistInput::from_file(Path::new(&wordlist.path), &wordlist.keyword)?;
        println!(
            "  - {} ({} entries, keyword {})",
            wordlist.path,
            input.total(),
            wordlist.keyword
        );
        total *= input.total();
    }

    println!("\nRecursion:");
    if config.recursion.enabled {
        println!(
            "  Enabled, strategy {:?}, depth {}",
            config.recursion.strategy, config.recursion.depth
        );
    } else {
        println!("  Disabled");
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would send {} requests per target", total);

    Ok(())
}

/// Handles the main fuzzing run
async fn handle_fuzz(
    config: bramble::Config,
    config_hash: String,
) -> Result<(), Box<dyn std::error::Error>> {
    // Assemble the input provider from the configured wordlists
    let mut wordlists = Vec::with_capacity(config.wordlists.len());
    for entry in &config.wordlists {
        wordlists.push(WordlistInput::from_file(
            Path::new(&entry.path),
            &entry.keyword,
        )?);
    }
    let input = Box::new(ProductInput::new(wordlists));

    // One cancellation token shared by the engine and all runners
    let cancel = CancellationToken::new();
    let runner = Arc::new(HttpRunner::new(&config, cancel.clone())?);
    let replay_runner: Option<Arc<dyn bramble::runner::RunnerProvider>> =
        if config.fuzzer.replay_proxy.is_empty() {
            None
        } else {
            Some(Arc::new(HttpRunner::replay(&config, cancel.clone())?))
        };

    // Terminal output, teed into a JSON file when configured
    let stdout: Arc<dyn OutputProvider> = Arc::new(StdoutOutput::new(config.output.quiet));
    let output: Arc<dyn OutputProvider> = if config.output.json_path.is_empty() {
        stdout
    } else {
        let json = Arc::new(JsonFileOutput::new(
            &config.output.json_path,
            config.command_line.clone(),
            config_hash,
        ));
        Arc::new(MultiOutput::new(vec![stdout, json]))
    };

    let mut job = Job::new(config, input, runner, replay_runner, output, cancel)?;
    job.start().await;

    let error = job.handle().error_message();
    if !error.is_empty() {
        tracing::warn!("Run ended early: {}", error);
    }
    Ok(())
}
