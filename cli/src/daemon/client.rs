// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for communicating with daemon API

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use central_core::domain::job::JobId;
use central_core::domain::task::{DispatchMode, TaskRequest};
use central_core::presentation::api::CALLER_HEADER;

/// Outcome of `POST /tasks`
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Sync dispatch: the provider or aggregated result
    Completed(Value),
    /// Async dispatch: poll this job
    Queued(JobId),
}

#[derive(Debug, Clone)]
pub struct DaemonClient {
    client: Client,
    base_url: String,
    caller: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    reason: String,
}

impl DaemonClient {
    pub fn new(host: &str, port: u16, caller: Option<String>) -> Result<Self> {
        Self::with_base_url(format!("http://{}:{}", host, port), caller)
    }

    pub fn with_base_url(base_url: impl Into<String>, caller: Option<String>) -> Result<Self> {
        // Sync fan-out waits for the slowest provider
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            caller,
        })
    }

    pub async fn submit(&self, request: &TaskRequest, dispatch: DispatchMode) -> Result<SubmitOutcome> {
        let mode = match dispatch {
            DispatchMode::Single => "single",
            DispatchMode::Multi => "multi",
        };
        let response = self
            .authorized(self.client.post(format!("{}/tasks?mode={}", self.base_url, mode)))
            .json(request)
            .send()
            .await
            .context("Failed to submit task")?;

        if response.status() == StatusCode::ACCEPTED {
            #[derive(Deserialize)]
            #[serde(rename_all = "camelCase")]
            struct Accepted {
                job_id: JobId,
            }
            let accepted: Accepted = response
                .json()
                .await
                .context("Failed to parse submit response")?;
            return Ok(SubmitOutcome::Queued(accepted.job_id));
        }

        Ok(SubmitOutcome::Completed(
            read_json(response, "Failed to submit task").await?,
        ))
    }

    pub async fn job(&self, job_id: JobId) -> Result<Value> {
        let response = self
            .authorized(self.client.get(format!("{}/tasks/{}", self.base_url, job_id)))
            .send()
            .await
            .context("Failed to get job")?;
        read_json(response, "Failed to get job").await
    }

    pub async fn cancel(&self, job_id: JobId) -> Result<Value> {
        let response = self
            .authorized(self.client.delete(format!("{}/tasks/{}", self.base_url, job_id)))
            .send()
            .await
            .context("Failed to cancel job")?;
        read_json(response, "Failed to cancel job").await
    }

    pub async fn monitor_status(&self, window_minutes: Option<u64>) -> Result<Value> {
        let url = match window_minutes {
            Some(minutes) => format!("{}/monitor/status?windowMinutes={}", self.base_url, minutes),
            None => format!("{}/monitor/status", self.base_url),
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to get monitor status")?;
        read_json(response, "Failed to get monitor status").await
    }

    pub async fn health(&self) -> Result<Value> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .context("Daemon is not reachable")?;
        read_json(response, "Health check failed").await
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.caller {
            Some(caller) => builder.header(CALLER_HEADER, caller),
            None => builder,
        }
    }
}

async fn read_json(response: Response, action: &str) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => anyhow::bail!("{} ({} {}): {}", action, status.as_u16(), body.error, body.reason),
            Err(_) => anyhow::bail!("{} ({}): {}", action, status.as_u16(), text),
        }
    }
    response
        .json()
        .await
        .with_context(|| format!("{}: invalid response body", action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn summarise() -> TaskRequest {
        TaskRequest {
            kind: "summarization".to_string(),
            providers: vec!["claude".to_string()],
            instruction: "Summarise the notes".to_string(),
            context: None,
            metadata: Default::default(),
            priority: None,
            mode: Default::default(),
            compare_results: false,
            max_tokens: None,
            temperature: None,
        }
    }

    #[tokio::test]
    async fn test_submit_sync_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/tasks")
            .match_query(Matcher::UrlEncoded("mode".into(), "single".into()))
            .match_header(CALLER_HEADER, "ed")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"provider":"claude","success":true,"content":"done"}"#)
            .create_async()
            .await;

        let client = DaemonClient::with_base_url(server.url(), Some("ed".into())).unwrap();
        let outcome = client.submit(&summarise(), DispatchMode::Single).await.unwrap();

        mock.assert_async().await;
        let SubmitOutcome::Completed(body) = outcome else {
            panic!("expected a completed submission");
        };
        assert_eq!(body["content"], "done");
    }

    #[tokio::test]
    async fn test_submit_async_returns_job_id() {
        let mut server = mockito::Server::new_async().await;
        let job_id = JobId::new();
        server
            .mock("POST", "/tasks")
            .match_query(Matcher::UrlEncoded("mode".into(), "multi".into()))
            .with_status(202)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"jobId":"{}"}}"#, job_id))
            .create_async()
            .await;

        let client = DaemonClient::with_base_url(server.url(), Some("root".into())).unwrap();
        let outcome = client.submit(&summarise(), DispatchMode::Multi).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Queued(job_id));
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/tasks")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"policy_rejected","reason":"role 'user' may not submit moderation tasks"}"#)
            .create_async()
            .await;

        let client = DaemonClient::with_base_url(server.url(), Some("usr".into())).unwrap();
        let err = client
            .submit(&summarise(), DispatchMode::Single)
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("403 policy_rejected"), "{}", err);
        assert!(err.contains("may not submit moderation tasks"), "{}", err);
    }

    #[tokio::test]
    async fn test_monitor_status_passes_window() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/monitor/status")
            .match_query(Matcher::UrlEncoded("windowMinutes".into(), "15".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"alerts":[],"usage":{"attempts":0},"queueDepth":0}"#)
            .create_async()
            .await;

        let client = DaemonClient::with_base_url(server.url(), None).unwrap();
        let status = client.monitor_status(Some(15)).await.unwrap();
        mock.assert_async().await;
        assert_eq!(status["queueDepth"], 0);
    }
}
