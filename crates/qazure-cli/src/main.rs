//! qazure Command-Line Interface
//!
//! Runs `%azure.*` magic commands against an Azure Quantum workspace, one per
//! line, from a script file or from standard input.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use tokio::io::BufReader;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

mod commands;
mod config;
mod terminal;

use commands::{Session, version};
use config::Config;

/// qazure - submit quantum jobs to Azure Quantum workspaces
#[derive(Parser)]
#[command(name = "qazure")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    /// Configuration file (default: ~/.qazure/config.yaml)
    #[arg(short, long, global = true, env = "QAZURE_CONFIG")]
    config: Option<PathBuf>,

    /// Deployment environment (production, canary, dogfood, mock)
    #[arg(short, long, global = true)]
    environment: Option<String>,

    /// Program catalog file
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Console,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run magic commands from a script, or interactively from stdin
    Run {
        /// Script file with one command per line (default: stdin)
        script: Option<PathBuf>,

        /// Connect to the configured workspace before the first command
        #[arg(long)]
        connect: bool,
    },

    /// Validate and print the effective configuration
    Check,

    /// Show version information
    Version,
}

fn init_logging(cli: &Cli, config: &Config) {
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.logging.level))
            .unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let json = match cli.log_format {
        Some(format) => format == LogFormat::Json,
        None => config.logging.format.eq_ignore_ascii_case("json"),
    };
    let fmt_layer = if json {
        fmt::layer().with_target(false).with_writer(std::io::stderr).json().boxed()
    } else {
        fmt::layer().with_target(false).with_writer(std::io::stderr).boxed()
    };

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(ref env) = cli.environment {
        config.environment = Some(env.clone());
    }
    if let Some(ref catalog) = cli.catalog {
        config.catalog = Some(catalog.clone());
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(config: Config, script: Option<PathBuf>, connect: bool) -> anyhow::Result<()> {
    let mut session = Session::new(config)?;
    if connect {
        session.connect_configured().await?;
    }

    match script {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open script {}", path.display()))?;
            session.run_lines(BufReader::new(file), false).await?;
        }
        None => {
            let prompt = console::user_attended();
            session.run_lines(BufReader::new(tokio::io::stdin()), prompt).await?;
        }
    }

    match session.failures() {
        0 => Ok(()),
        n => bail!("{n} command(s) failed"),
    }
}

fn check(config: &Config) -> anyhow::Result<()> {
    let mut shown = config.clone();
    if shown.workspace.storage.is_some() {
        shown.workspace.storage = Some("[REDACTED]".to_string());
    }
    println!("{} Configuration is valid\n", style("✓").green().bold());
    print!("{}", serde_yaml_ng::to_string(&shown).context("Failed to render configuration")?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        version::execute();
        return Ok(());
    }

    let result = match load_config(&cli) {
        Ok(config) => {
            init_logging(&cli, &config);
            match cli.command {
                Commands::Run { script, connect } => run(config, script, connect).await,
                Commands::Check => check(&config),
                Commands::Version => Ok(()),
            }
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
