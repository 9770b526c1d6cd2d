// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # AI Central CLI
//!
//! The `ai-central` binary runs the orchestrator daemon and talks to a
//! running one over its HTTP API.
//!
//! ## Commands
//!
//! - `ai-central serve` - Run the orchestrator (HTTP API + worker pool)
//! - `ai-central task submit|status|cancel` - Task operations against the daemon
//! - `ai-central monitor status` - Usage summary and active alerts
//! - `ai-central config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use ai_central::commands::{self, ConfigCommand, MonitorCommand, TaskCommand};
use ai_central::daemon;
use central_core::domain::node_config::OrchestratorConfig;

/// AI Central - task orchestration across AI providers
#[derive(Parser)]
#[command(name = "ai-central")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "AI_CENTRAL_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// HTTP API port (default: from config, 8000)
    #[arg(long, global = true, env = "AI_CENTRAL_PORT")]
    port: Option<u16>,

    /// HTTP API host (default: 127.0.0.1)
    #[arg(long, global = true, env = "AI_CENTRAL_HOST")]
    host: Option<String>,

    /// Caller identity sent with task requests
    #[arg(long, global = true, env = "AI_CENTRAL_CALLER_ID")]
    caller: Option<String>,

    /// Log level (trace, debug, info, warn, error; default: from config)
    #[arg(long, global = true, env = "AI_CENTRAL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format (default: from config)
    #[arg(long, global = true, env = "AI_CENTRAL_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestrator daemon in the foreground
    #[command(name = "serve")]
    Serve,

    /// Task operations
    #[command(name = "task")]
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Usage monitoring
    #[command(name = "monitor")]
    Monitor {
        #[command(subcommand)]
        command: MonitorCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Flags win over the config file's observability.logging section
    let logging = OrchestratorConfig::load_or_default(cli.config.clone())
        .map(|config| config.spec.observability.logging)
        .unwrap_or_default();
    let level = cli.log_level.clone().unwrap_or(logging.level);
    let format = cli.log_format.unwrap_or(match logging.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, format)?;

    let target = commands::Target::new(cli.host.clone(), cli.port, cli.caller.clone());

    match cli.command {
        Some(Commands::Serve) => daemon::start_server(cli.config, cli.host, cli.port).await,
        Some(Commands::Task { command }) => commands::task::handle_command(command, target).await,
        Some(Commands::Monitor { command }) => {
            commands::monitor::handle_command(command, target).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Text => builder.with_target(false).compact().init(),
        LogFormat::Json => builder.with_target(true).json().init(),
    }

    Ok(())
}
