// Lead Migration
// Command-line entry point: single batches, scheduled polling and config checks

// IMPORTS ------------------>>

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lead_migration::constants::CONFIG_ENV_VAR;
use lead_migration::core::Migration;
use lead_migration::operations::SyncReport;

//--------------------------------------------------------<<

#[derive(Parser)]
#[command(name = "lead-migration")]
#[command(about = "Migrate CRM leads between organizations, keeping the most recently modified copy")]
struct Cli {
    /// Path to lead-migration.yaml (searched upwards from the current directory otherwise)
    #[arg(short, long, env = CONFIG_ENV_VAR, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single migration batch
    Run {
        /// Also write the report as YAML to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Decide without writing to the destination
        #[arg(long)]
        dry_run: bool,
    },

    /// Run batches on the configured interval until Ctrl-C
    Poll {
        /// Decide without writing to the destination
        #[arg(long)]
        dry_run: bool,
    },

    /// Load and validate the configuration, then print it
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok(), cli.verbose))
        .init();

    let migration = Migration::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run { report, dry_run } => {
            let result = migration.run_once(dry_run).await?;
            print_report(&result)?;

            if let Some(path) = report {
                write_report(&path, &result)?;
                info!(path = %path.display(), "report written");
            }

            if result.failed > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Poll { dry_run } => {
            let mut poller = migration.poller(dry_run)?;
            let shutdown = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %err, "cannot listen for Ctrl-C");
                }
            };

            let watermark = poller.run(shutdown).await;
            if let Some(watermark) = watermark {
                println!("watermark: {}", watermark);
            }
        }
        Command::CheckConfig => {
            if let Some(path) = &migration.config_path {
                println!("# {}", path.display());
            }
            let resolved = serde_yaml::to_string(&migration.config)
                .context("Failed to serialize migration config")?;
            print!("{}", resolved);
            println!("# account policy: {}", migration.config.account_policy(&migration.app_config)?.mode());
            println!("# poll interval: {}s", migration.config.poll_interval(&migration.app_config).as_secs());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// RUST_LOG wins when set and valid; otherwise log this crate at info, or debug with --verbose
fn log_filter(rust_log: Option<String>, verbose: bool) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| {
            EnvFilter::new(if verbose { "lead_migration=debug" } else { "lead_migration=info" })
        })
}

fn print_report(report: &SyncReport) -> Result<()> {
    let text = serde_yaml::to_string(report).context("Failed to serialize report")?;
    print!("{}", text);
    Ok(())
}

fn write_report(path: &Path, report: &SyncReport) -> Result<()> {
    let text = serde_yaml::to_string(report).context("Failed to serialize report")?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write report: {}", path.display()))
}
