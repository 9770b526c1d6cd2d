// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Usage monitoring commands
//!
//! Commands: status, health

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::Value;

use crate::commands::Target;

#[derive(Subcommand)]
pub enum MonitorCommand {
    /// Usage summary and active alerts
    Status {
        /// Window to aggregate over, in minutes (default: server setting)
        #[arg(short, long, value_name = "MINUTES")]
        window: Option<u64>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Daemon liveness and configured providers
    Health,
}

pub async fn handle_command(command: MonitorCommand, target: Target) -> Result<()> {
    let client = target.client()?;

    match command {
        MonitorCommand::Status { window, json } => {
            let status = client.monitor_status(window).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status).context("Failed to render status")?
                );
            } else {
                print_status(&status);
            }
            Ok(())
        }
        MonitorCommand::Health => {
            let health = client.health().await?;
            println!(
                "{} v{} (uptime {}s)",
                "✓ AI Central is running".green(),
                health["version"].as_str().unwrap_or("?"),
                health["uptimeSeconds"]
            );
            println!("  Queue depth: {}", health["queueDepth"]);
            if let Some(providers) = health["providers"].as_array() {
                let names: Vec<&str> = providers.iter().filter_map(Value::as_str).collect();
                println!("  Providers: {}", names.join(", "));
            }
            Ok(())
        }
    }
}

fn print_status(status: &Value) {
    let usage = &status["usage"];

    println!("{}", "Usage:".bold());
    println!("  Window: {}s", usage["windowSeconds"]);
    println!("  Requests: {}", usage["requests"]);
    println!(
        "  Attempts: {} ({} failed, {:.1}%)",
        usage["attempts"],
        usage["failures"],
        usage["failureRate"].as_f64().unwrap_or(0.0) * 100.0
    );
    println!(
        "  Average latency: {:.0} ms",
        usage["averageLatencyMs"].as_f64().unwrap_or(0.0)
    );
    println!(
        "  Tokens: {} (${:.4})",
        usage["totalTokens"],
        usage["totalCostUsd"].as_f64().unwrap_or(0.0)
    );
    println!("  Queue depth: {}", status["queueDepth"]);

    if let Some(providers) = usage["providers"].as_array() {
        println!();
        println!("{}", "Providers:".bold());
        for provider in providers {
            println!(
                "  {} attempts={} failureRate={:.1}% avgLatency={:.0}ms",
                provider["provider"].as_str().unwrap_or("?").bold(),
                provider["attempts"],
                provider["failureRate"].as_f64().unwrap_or(0.0) * 100.0,
                provider["averageLatencyMs"].as_f64().unwrap_or(0.0)
            );
        }
    }

    let security = &status["security"];
    println!();
    println!("{}", "Policy rejections:".bold());
    println!("  Total: {}", security["totalEvents"]);
    if let Some(by_check) = security["byCheck"].as_object() {
        for (check, count) in by_check {
            println!("  {}: {}", check, count);
        }
    }
    if let Some(callers) = security["riskCallers"].as_array() {
        for caller in callers {
            println!(
                "  {} {} events",
                caller["callerId"].as_str().unwrap_or("?").yellow(),
                caller["events"]
            );
        }
    }

    println!();
    match status["alerts"].as_array() {
        Some(alerts) if !alerts.is_empty() => {
            println!("{}", "Alerts:".bold());
            for alert in alerts {
                let severity = alert["severity"].as_str().unwrap_or("warning");
                let label = if severity == "critical" {
                    severity.to_uppercase().red()
                } else {
                    severity.to_uppercase().yellow()
                };
                println!("  [{}] {}", label, alert["message"].as_str().unwrap_or(""));
            }
        }
        _ => println!("{}", "✓ No active alerts".green()),
    }
}
