// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use central_core::domain::node_config::OrchestratorConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./ai-central.yaml)
        #[arg(short, long, default_value = "./ai-central.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = OrchestratorConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. AI_CENTRAL_CONFIG_PATH: {}",
            std::env::var("AI_CENTRAL_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./ai-central.yaml");
        println!("  4. ~/.ai-central/config.yaml");
        println!("  5. /etc/ai-central/config.yaml");
        println!();
    }

    if as_yaml {
        let yaml = serde_yaml::to_string(&config).context("Failed to render configuration")?;
        println!("{}", yaml);
        return Ok(());
    }

    let spec = &config.spec;

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Node:".bold());
    println!("  Name: {}", config.metadata.name);
    println!(
        "  Listen: {}:{}",
        spec.network.bind_address, spec.network.port
    );
    println!(
        "  Storage: {}",
        if spec.database.is_some() {
            "PostgreSQL"
        } else {
            "in-process"
        }
    );
    println!();

    println!("{}", "Providers:".bold());
    for provider in &spec.providers {
        let state = if provider.enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!(
            "  {} ({}) [{}]",
            provider.name.bold(),
            provider.provider_type,
            state
        );
        if !provider.endpoint.is_empty() {
            println!("    Endpoint: {}", provider.endpoint);
        }
        if !provider.model.is_empty() {
            println!("    Model: {}", provider.model);
        }
        println!("    Timeout: {:?}", provider.timeout);
    }
    println!();

    println!("{}", "Execution:".bold());
    println!("  Workers: {}", spec.queue.workers);
    println!("  Retry delay: {:?}", spec.execution.retry_delay);
    println!(
        "  Consensus: {} (min votes {})",
        spec.consensus.strategy.as_str(),
        spec.consensus.min_votes
    );
    println!();

    println!("{}", "Policy:".bold());
    println!(
        "  AI features: {}",
        if spec.policy.enabled {
            "enabled".green()
        } else {
            "disabled".red()
        }
    );
    println!("  Max payload: {} bytes", spec.policy.max_payload_bytes);
    println!(
        "  Request quota: {} per {:?}",
        spec.policy.max_requests, spec.policy.request_window
    );
    println!(
        "  Token quota: {} per {:?}",
        spec.policy.max_tokens, spec.policy.token_window
    );
    match spec.policy.monthly_token_budget {
        Some(budget) => println!("  Monthly token budget: {}", budget),
        None => println!("  Monthly token budget: {}", "(unlimited)".dimmed()),
    }
    println!("  Denylist patterns: {}", spec.policy.denylist.len());
    println!("  Static callers: {}", spec.callers.len());
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = OrchestratorConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
