//! # verba
//!
//! Command-line driver for the translation workflow.

mod commands;
mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tooling::logging::{init_tracing, LogFormat};
use verba_checkpoint::FileCheckpointSaver;
use verba_core::{FileCorrectionStore, JsonlAuditLog, RunDriver, WorkflowMachine};
use verba_http::{HttpQualityChecker, HttpTranslator, ServiceClient};

use crate::commands::RunArgs;
use crate::config::{Overrides, VerbaConfig};

#[derive(Parser)]
#[command(name = "verba")]
#[command(about = "Translate with quality checks and human review", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML config file with [engine] and [service] tables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output: text or json
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    /// Directory for corrections, audit trail and checkpoints
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Minimum accuracy and hallucination score for a pass
    #[arg(long, global = true)]
    pass_threshold: Option<u8>,

    /// Translation service URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a text, asking for a correction if quality checks fail
    Run {
        /// Source text
        text: String,

        /// Target language
        #[arg(short, long)]
        lang: String,

        /// Session key (random if omitted)
        #[arg(short, long)]
        session: Option<String>,

        /// Leave a failing run suspended instead of prompting
        #[arg(long)]
        no_prompt: bool,
    },

    /// Resume a suspended run with a corrected translation
    Resume {
        session: String,
        corrected: String,
    },

    /// Show the stored checkpoint of a session
    Status { session: String },

    /// List learned corrections
    Corrections,

    /// Print audit entries as JSON Lines
    Audit {
        /// Only the most recent N entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Check that the translation service is reachable
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let config = VerbaConfig::load(cli.config.as_deref())
        .await?
        .with_overrides(Overrides {
            data_dir: cli.data_dir,
            pass_threshold: cli.pass_threshold,
            base_url: cli.base_url,
        })?;

    let client = ServiceClient::new(config.service.clone()).context("invalid service settings")?;
    let driver = build_driver(&config, client.clone());

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut out = std::io::stdout();

    match cli.command {
        Commands::Run {
            text,
            lang,
            session,
            no_prompt,
        } => {
            let args = RunArgs {
                text,
                language: lang,
                session,
                no_prompt,
            };
            commands::run(&driver, args, &mut input, &mut out).await?;
        }
        Commands::Resume { session, corrected } => {
            commands::resume(&driver, &session, &corrected, &mut out).await?;
        }
        Commands::Status { session } => commands::status(&driver, &session, &mut out).await?,
        Commands::Corrections => commands::corrections(&driver, &mut out).await?,
        Commands::Audit { limit } => commands::audit(&driver, limit, &mut out).await?,
        Commands::Health => commands::health(&client, &mut out).await?,
    }

    Ok(())
}

fn build_driver(config: &VerbaConfig, client: ServiceClient) -> RunDriver {
    let engine = &config.engine;
    let machine = WorkflowMachine::new(
        Arc::new(HttpTranslator::new(client.clone())),
        Arc::new(HttpQualityChecker::new(client)),
        Arc::new(FileCorrectionStore::new(engine.corrections_path())),
        Arc::new(JsonlAuditLog::new(engine.audit_path())),
        Arc::new(FileCheckpointSaver::new(engine.checkpoint_path())),
    )
    .with_config(engine);
    RunDriver::new(machine)
}
