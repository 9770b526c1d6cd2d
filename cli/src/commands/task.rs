// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Task operations commands
//!
//! Commands: submit, status, cancel

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use central_core::domain::job::JobId;
use central_core::domain::task::{DispatchMode, ExecutionMode, TaskRequest};

use crate::commands::Target;
use crate::daemon::{DaemonClient, SubmitOutcome};

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Submit a task to one or more providers
    Submit {
        /// Task kind (content-generation, analysis, moderation, summarization, ...)
        #[arg(short, long)]
        kind: String,

        /// Provider to dispatch to; repeat for fan-out
        #[arg(short, long = "provider", value_name = "PROVIDER", required = true)]
        providers: Vec<String>,

        /// Instruction text, or @file to read it from a file
        #[arg(value_name = "INSTRUCTION")]
        instruction: String,

        /// Additional context, or @file
        #[arg(long)]
        context: Option<String>,

        /// Metadata entry as key=value; repeatable
        #[arg(short, long = "meta", value_name = "KEY=VALUE")]
        metadata: Vec<String>,

        /// Scheduling priority, 1 (lowest) to 10 (highest)
        #[arg(long)]
        priority: Option<i64>,

        /// Enqueue the task and return a job id
        #[arg(long = "async")]
        run_async: bool,

        /// Wait for an async job to finish
        #[arg(short, long, requires = "run_async")]
        wait: bool,

        /// Add a comparison summary (fan-out only)
        #[arg(long)]
        compare: bool,

        #[arg(long)]
        max_tokens: Option<u32>,

        #[arg(long)]
        temperature: Option<f32>,
    },

    /// Check job status
    Status {
        #[arg(value_name = "JOB_ID")]
        job_id: JobId,
    },

    /// Cancel a queued job
    Cancel {
        #[arg(value_name = "JOB_ID")]
        job_id: JobId,
    },
}

pub async fn handle_command(command: TaskCommand, target: Target) -> Result<()> {
    let client = target.caller_client()?;

    match command {
        TaskCommand::Submit {
            kind,
            providers,
            instruction,
            context,
            metadata,
            priority,
            run_async,
            wait,
            compare,
            max_tokens,
            temperature,
        } => {
            let dispatch = if providers.len() > 1 {
                DispatchMode::Multi
            } else {
                DispatchMode::Single
            };
            let request = TaskRequest {
                kind,
                providers,
                instruction: read_arg(&instruction)?,
                context: context.as_deref().map(read_arg).transpose()?,
                metadata: parse_metadata(&metadata)?,
                priority,
                mode: if run_async {
                    ExecutionMode::Async
                } else {
                    ExecutionMode::Sync
                },
                compare_results: compare,
                max_tokens,
                temperature,
            };
            submit(&client, request, dispatch, wait).await
        }
        TaskCommand::Status { job_id } => {
            let status = client.job(job_id).await?;
            print_job(&status)
        }
        TaskCommand::Cancel { job_id } => {
            client.cancel(job_id).await?;
            println!("{}", format!("✓ Job cancelled: {}", job_id).green());
            Ok(())
        }
    }
}

async fn submit(
    client: &DaemonClient,
    request: TaskRequest,
    dispatch: DispatchMode,
    wait: bool,
) -> Result<()> {
    println!(
        "Submitting {} task to {}",
        request.kind.bold(),
        request.providers.join(", ")
    );

    match client.submit(&request, dispatch).await? {
        SubmitOutcome::Completed(result) => print_result(&result),
        SubmitOutcome::Queued(job_id) => {
            println!("{}", format!("✓ Job queued: {}", job_id).green());
            if !wait {
                return Ok(());
            }
            let status = wait_for_job(client, job_id).await?;
            print_job(&status)
        }
    }
}

async fn wait_for_job(client: &DaemonClient, job_id: JobId) -> Result<Value> {
    let mut delay = Duration::from_millis(250);
    loop {
        let status = client.job(job_id).await?;
        match status["state"].as_str() {
            Some("queued") | Some("running") => {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_secs(5));
            }
            _ => return Ok(status),
        }
    }
}

fn print_job(status: &Value) -> Result<()> {
    let state = status["state"].as_str().unwrap_or("unknown");
    let colored_state = match state {
        "succeeded" => state.green(),
        "failed" | "cancelled" => state.red(),
        _ => state.yellow(),
    };
    println!("Job {}: {}", status["jobId"].as_str().unwrap_or("?"), colored_state);
    if let Some(error) = status["error"].as_str() {
        println!("  Error: {}", error.red());
    }
    if !status["result"].is_null() {
        print_result(&status["result"])?;
    }
    Ok(())
}

fn print_result(result: &Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(result).context("Failed to render result")?;
    println!("{}", rendered);
    Ok(())
}

/// `@path` reads the value from a file
fn read_arg(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => {
            let path = PathBuf::from(path);
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {:?}", path))
        }
        None => Ok(value.to_string()),
    }
}

/// Values that parse as JSON keep their type; anything else is a string
fn parse_metadata(entries: &[String]) -> Result<BTreeMap<String, Value>> {
    entries
        .iter()
        .map(|entry| {
            let (key, raw) = entry
                .split_once('=')
                .with_context(|| format!("Metadata must be KEY=VALUE, got '{}'", entry))?;
            let value =
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            Ok((key.trim().to_string(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_metadata() {
        let parsed = parse_metadata(&[
            "audience=editors".to_string(),
            "words=300".to_string(),
            "draft=true".to_string(),
        ])
        .unwrap();
        assert_eq!(parsed["audience"], Value::String("editors".into()));
        assert_eq!(parsed["words"], serde_json::json!(300));
        assert_eq!(parsed["draft"], Value::Bool(true));

        assert!(parse_metadata(&["no-separator".to_string()]).is_err());
    }

    #[test]
    fn test_read_arg_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Summarise this file").unwrap();

        let arg = format!("@{}", file.path().display());
        assert_eq!(read_arg(&arg).unwrap(), "Summarise this file");
        assert_eq!(read_arg("inline").unwrap(), "inline");
        assert!(read_arg("@/definitely/not/here.txt").is_err());
    }
}
