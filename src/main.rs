//! farmout CLI - distribute Squish test cases across a squishserver pool.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use farmout::config::{self, Config};
use farmout::discovery::find_test_cases;
use farmout::dispatch::{Distributor, Scheduler};
use farmout::history::TimingHistory;
use farmout::report::ConsoleReporter;
use farmout::runner::SquishRunner;

#[derive(Parser)]
#[command(name = "farmout")]
#[command(about = "Distribute Squish test cases across multiple squishservers", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "farmout.yaml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every test case found under a directory
    Run {
        /// Directory tree containing the test suites
        tests_dir: PathBuf,

        /// Override the history file named in the config
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Discover test cases without running them
    Collect {
        /// Directory tree containing the test suites
        tests_dir: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Validate the configuration file
    Validate,
    /// Show recorded duration statistics per test case
    History {
        /// Override the history file named in the config
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Initialize a new configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    // Logs go to stderr so `collect --format json` stays pipeable.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run { tests_dir, history } => {
            run_tests(&cli.config, &tests_dir, history, cli.verbose).await
        }
        Commands::Collect { tests_dir, format } => collect_tests(&tests_dir, &format),
        Commands::Validate => validate_config(&cli.config),
        Commands::History { history } => show_history(&cli.config, history),
        Commands::Init => init_config(),
    }
}

fn load_run_config(config_path: &Path) -> Result<Config> {
    let config = config::load_config(config_path)?;
    if config.servers.is_empty() {
        bail!("No servers configured in {}", config_path.display());
    }
    Ok(config)
}

async fn run_tests(
    config_path: &Path,
    tests_dir: &Path,
    history_override: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let config = load_run_config(config_path)?;
    info!("Loaded configuration from {}", config_path.display());

    let tests = find_test_cases(tests_dir)?;
    if tests.is_empty() {
        bail!("No test cases found in {}", tests_dir.display());
    }

    let history_path = history_override.unwrap_or_else(|| config.history_file.clone());
    let mut history = TimingHistory::load(&history_path)?;

    let backlog = Scheduler::new(&history).prioritize(tests);

    let runner = SquishRunner::new(&config.squishrunner);
    let reporter = ConsoleReporter::new(verbose);
    let distributor = Distributor::new(config.servers, runner, reporter);

    let report = distributor
        .run(backlog, &mut history)
        .await
        .context("Test distribution failed")?;

    std::process::exit(report.exit_code());
}

fn collect_tests(tests_dir: &Path, format: &str) -> Result<()> {
    let tests = find_test_cases(tests_dir)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&tests)?),
        "text" => {
            println!("Found {} test cases:", tests.len());
            for test in &tests {
                println!("  {}", test);
            }
        }
        other => bail!("Unknown output format: {}", other),
    }
    Ok(())
}

fn validate_config(config_path: &Path) -> Result<()> {
    match config::load_config(config_path) {
        Ok(config) => {
            println!("Configuration is valid!");
            println!();
            println!("Settings:");
            println!("  Servers:");
            for server in &config.servers {
                println!("    {}", server);
            }
            println!("  Squishrunner: {}", config.squishrunner.display());
            println!("  History file: {}", config.history_file.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_config() -> Result<()> {
    let path = PathBuf::from("farmout.yaml");
    if path.exists() {
        eprintln!("farmout.yaml already exists. Remove it first or edit manually.");
        std::process::exit(1);
    }

    let config = r#"# farmout configuration file

# One entry per squishserver. Two entries on the same host run two tests
# on that host at a time.
servers:
  - "127.0.0.1:4432"
  - "127.0.0.1:4433"

# Path to the squishrunner binary used to drive the servers.
squishrunner: /opt/squish/bin/squishrunner

# Where per-test duration history is persisted between runs.
history_file: farmout-history.json
"#;

    std::fs::write(&path, config)?;
    println!("Created farmout.yaml");
    println!();
    println!("Edit the configuration as needed, then run:");
    println!("  farmout run <TESTS_DIR>");

    Ok(())
}

fn show_history(config_path: &Path, history_override: Option<PathBuf>) -> Result<()> {
    let history_path = match history_override {
        Some(path) => path,
        None => config::load_config(config_path)?.history_file,
    };
    let history = TimingHistory::load(&history_path)?;

    if history.is_empty() {
        println!("No duration history at {}", history_path.display());
        return Ok(());
    }

    println!(
        "{:<40} {:>5} {:>9} {:>9} {:>9}",
        "Test case", "Runs", "Mean", "Median", "Stddev"
    );
    for id in history.known_tests() {
        let runs = history.samples(id).map_or(0, |s| s.len());
        println!(
            "{:<40} {:>5} {:>8.1}s {:>8.1}s {:>8.1}s",
            id,
            runs,
            history.mean(id),
            history.median(id),
            history.stddev(id)
        );
    }
    Ok(())
}
