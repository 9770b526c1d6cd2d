// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP API status codes and response bodies, exercised in-process.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use central_core::presentation::api::{app, CALLER_HEADER};
use common::{HarnessBuilder, ScriptedProvider};

fn router() -> Router {
    let harness = HarnessBuilder::new()
        .adapter(ScriptedProvider::replying("claude", 0, "a tidy summary"))
        .adapter(ScriptedProvider::replying("openai", 0, "another summary"))
        .build();
    app(harness.service)
}

fn post_task(mode: &str, caller: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(format!("/tasks?mode={}", mode))
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(caller) = caller {
        builder = builder.header(CALLER_HEADER, caller);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, caller: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(caller) = caller {
        builder = builder.header(CALLER_HEADER, caller);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn summarise(providers: &[&str]) -> Value {
    json!({
        "kind": "summarization",
        "providers": providers,
        "instruction": "Summarise the release notes"
    })
}

#[tokio::test]
async fn test_sync_single_returns_provider_result() {
    let router = router();
    let (status, body) = send(&router, post_task("single", Some("ed"), summarise(&["claude"]))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider"], "claude");
    assert_eq!(body["success"], true);
    assert_eq!(body["content"], "a tidy summary");
}

#[tokio::test]
async fn test_sync_multi_returns_aggregated_result() {
    let router = router();
    let mut request = summarise(&["claude", "openai"]);
    request["compareResults"] = json!(true);
    let (status, body) = send(&router, post_task("multi", Some("root"), request)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["comparison"]["totalProviders"], 2);
}

#[tokio::test]
async fn test_status_codes_for_rejected_submissions() {
    let router = router();

    let (status, body) = send(&router, post_task("single", None, summarise(&["claude"]))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, _) = send(&router, post_task("single", Some("mallory"), summarise(&["claude"]))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &router,
        post_task("multi", Some("ed"), summarise(&["claude", "openai"])),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "policy_rejected");
    assert_eq!(body["check"], "capability");

    let (status, body) = send(&router, post_task("single", Some("ed"), summarise(&["cohere"]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (status, _) = send(&router, post_task("sideways", Some("ed"), summarise(&["claude"]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&router, post_task("single", Some("ed"), json!({"kind": "analysis"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_async_submission_is_accepted_and_pollable() {
    let router = router();
    let mut request = summarise(&["claude"]);
    request["mode"] = json!("async");

    let (status, body) = send(&router, post_task("single", Some("ed"), request)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let (status, body) = send(&router, get(&format!("/tasks/{}", job_id), Some("ed"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "queued");
    assert_eq!(body["jobId"], job_id.as_str());

    // Hidden from other non-admin callers
    let (status, _) = send(&router, get(&format!("/tasks/{}", job_id), Some("usr"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let cancel = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/tasks/{}", job_id))
        .header(CALLER_HEADER, "ed")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&router, cancel).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "cancelled");

    let cancel_again = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/tasks/{}", job_id))
        .header(CALLER_HEADER, "ed")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&router, cancel_again).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let router = router();
    let (status, _) = send(
        &router,
        get("/tasks/00000000-0000-4000-8000-000000000000", Some("root")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&router, get("/tasks/not-a-job", Some("root"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_monitor_status_and_health() {
    let router = router();
    send(&router, post_task("single", Some("ed"), summarise(&["claude"]))).await;
    // Editors may not fan out; the rejection shows up as a security event
    send(
        &router,
        post_task("multi", Some("ed"), summarise(&["claude", "openai"])),
    )
    .await;

    let (status, body) = send(&router, get("/monitor/status?windowMinutes=5", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["usage"]["attempts"], 1);
    assert_eq!(body["security"]["totalEvents"], 1);
    assert_eq!(body["security"]["byCheck"]["capability"], 1);
    assert_eq!(body["security"]["bySeverity"]["medium"], 1);
    assert_eq!(body["security"]["riskCallers"][0]["callerId"], "ed");
    assert_eq!(body["usage"]["windowSeconds"], 300);
    assert!(body["alerts"].as_array().unwrap().is_empty());
    assert_eq!(body["queueDepth"], 0);

    let (status, _) = send(&router, get("/monitor/status?windowMinutes=0", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&router, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["providers"], json!(["claude", "openai"]));
}
