//! syncctl - terminal sync reconciliation from the command line
//!
//! Lists incoming sync records, shows the auto-matched reconciliation for a
//! scanned terminal and submits it, optionally driven by an operator plan.

mod context;
mod plan;
mod reconcile;
mod registry;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use common::logging::{self, LogConfig};
use errors::SyncError;
use tracing::Level;

use crate::context::SyncContext;
use crate::reconcile::ReconcileOptions;

#[derive(Parser)]
#[command(name = "syncctl")]
#[command(about = "Terminal sync reconciliation tool")]
#[command(long_about = "Terminal sync reconciliation tool

Reconciles the hardware a scanned terminal reports against the device registry.

Commands:
  pending         List incoming sync records and the pending count
  catalog         Print the device-definition catalog
  free-terminals  Print terminals that can be targeted
  show            Load a sync record and print the auto-matched review
  reconcile       Apply a plan, print the payload and submit it

Examples:
  syncctl pending --filter juanda
  syncctl show 072-1293
  syncctl reconcile 072-1293 --plan plan.yaml --dry-run
  syncctl reconcile 072-1293 --target 8bf3a7fe-7f8a --json

Use 'syncctl <command> --help' for more information on a specific command.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Configuration file (default: config/default.* plus SYNCCTL_* environment)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Project code (default: SYNCCTL_PROJECT, then the configured default)
    #[arg(short = 'p', long, global = true)]
    project: Option<String>,

    /// Also write daily log files into this directory
    #[arg(long = "log-dir", global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List incoming sync records
    Pending {
        /// Case-insensitive text filter over serial, model, station and project
        #[arg(short, long)]
        filter: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the device-definition catalog
    Catalog {
        #[arg(long)]
        json: bool,
    },

    /// Print free terminal candidates
    FreeTerminals {
        #[arg(long)]
        json: bool,
    },

    /// Load a sync record and print the review
    Show {
        /// Item serial code of the scanned terminal
        serial: String,

        #[arg(long)]
        json: bool,
    },

    /// Reconcile a sync record and submit it
    Reconcile {
        /// Item serial code of the scanned terminal
        serial: String,

        /// Operator plan file (YAML or JSON)
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Free terminal id to target (overrides the plan)
        #[arg(short, long)]
        target: Option<String>,

        /// Print the payload without submitting it
        #[arg(long)]
        dry_run: bool,

        /// Print review and payload as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(cli: &Cli) {
    let console_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let mut config = LogConfig {
        service_name: "syncctl".to_string(),
        console_level,
        ..Default::default()
    };
    if let Some(dir) = &cli.log_dir {
        config.log_dir = dir.clone();
        config.enable_file = true;
    }

    if let Err(e) = logging::init_with_config(config) {
        eprintln!("{} Failed to initialize logging: {}", "WARN".yellow(), e);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = SyncContext::new(cli.config.as_deref(), cli.project.clone())?;

    match cli.command {
        Commands::Pending { filter, json } => {
            registry::pending_command(&ctx, filter.as_deref(), json).await?;
        },
        Commands::Catalog { json } => {
            registry::catalog_command(&ctx, json).await?;
        },
        Commands::FreeTerminals { json } => {
            registry::free_terminals_command(&ctx, json).await?;
        },
        Commands::Show { serial, json } => {
            reconcile::show_command(&ctx, &serial, json).await?;
        },
        Commands::Reconcile {
            serial,
            plan,
            target,
            dry_run,
            json,
        } => {
            let options = ReconcileOptions {
                plan: plan.as_deref(),
                target: target.as_deref(),
                dry_run,
                json,
            };
            reconcile::reconcile_command(&ctx, &serial, options).await?;
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    init_logging(&cli);

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<SyncError>() {
            Some(sync_error) => render::print_error(sync_error),
            None => eprintln!("{} {:#}", "ERROR".bright_red(), e),
        }
        std::process::exit(1);
    }
}
