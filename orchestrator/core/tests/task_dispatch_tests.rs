// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end dispatch through the task service: policy gating, concurrent
//! fan-out, moderation consensus and the async job lifecycle.

mod common;

use common::{caller, request, HarnessBuilder, ScriptedProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use central_core::application::{Submission, TaskServiceError, WorkerPool};
use central_core::domain::job::{JobError, JobState};
use central_core::domain::llm::FailureKind;
use central_core::domain::policy::{PolicyCheck, PolicyConfig};
use central_core::domain::task::{DispatchMode, ExecutionMode, ProviderId, Role, ValidationError};
use central_core::infrastructure::llm::mock::MockAdapter;
use central_core::infrastructure::llm::VendorAdapter;

const APPROVE: &str = r#"{"approved": true, "confidence": 0.9, "reasons": ["on topic"]}"#;
const REJECT: &str = r#"{"approved": false, "confidence": 0.8, "reasons": ["spam"]}"#;

#[tokio::test(start_paused = true)]
async fn test_fan_out_waits_only_for_the_slowest_provider() {
    let claude = ScriptedProvider::replying("claude", 2000, "claude says hi");
    let openai = ScriptedProvider::replying("openai", 5000, "openai says hi");
    let gemini = ScriptedProvider::replying("gemini", 3000, "gemini says hi");
    let harness = HarnessBuilder::new()
        .adapter(claude.clone())
        .adapter(openai.clone())
        .adapter(gemini.clone())
        .build();

    let mut req = request(
        "analysis",
        &["openai", "claude", "gemini"],
        "Compare the tone of these headlines",
    );
    req.compare_results = true;

    let started = tokio::time::Instant::now();
    let submission = harness
        .service
        .submit(&caller("root", Role::Admin), req, DispatchMode::Multi)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(5000), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(5500), "elapsed {:?}", elapsed);

    let Submission::Multi(aggregated) = submission else {
        panic!("expected a multi-dispatch result");
    };
    let order: Vec<&str> = aggregated
        .results
        .iter()
        .map(|r| r.provider().as_str())
        .collect();
    assert_eq!(order, vec!["openai", "claude", "gemini"]);

    let comparison = aggregated.comparison.expect("comparison requested");
    assert_eq!(comparison.total_providers, 3);
    assert_eq!(comparison.successful_providers, 3);
    assert!(aggregated.consensus.is_none());

    assert_eq!(claude.calls() + openai.calls() + gemini.calls(), 3);
    assert_eq!(harness.monitor.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_fan_out_reports_failures_alongside_successes() {
    let harness = HarnessBuilder::new()
        .adapter(ScriptedProvider::replying("claude", 100, "fine"))
        .adapter(ScriptedProvider::failing("openai", 100, FailureKind::RateLimited))
        .build();

    let submission = harness
        .service
        .submit(
            &caller("root", Role::Admin),
            request("summarization", &["claude", "openai"], "Summarise the minutes"),
            DispatchMode::Multi,
        )
        .await
        .unwrap();

    let Submission::Multi(aggregated) = submission else {
        panic!("expected a multi-dispatch result");
    };
    assert!(aggregated.results[0].is_success());
    assert_eq!(aggregated.results[1].failure(), Some(FailureKind::RateLimited));
    assert!(!aggregated.all_failed());
}

#[tokio::test(start_paused = true)]
async fn test_fan_out_reports_vendor_timeout() {
    let stalled = Arc::new(VendorAdapter::new(
        ProviderId::new("openai"),
        Arc::new(MockAdapter::new(Duration::from_secs(60), None)),
        Duration::from_millis(5000),
        0.0,
    ));
    let harness = HarnessBuilder::new()
        .adapter(ScriptedProvider::replying("claude", 100, "fast answer"))
        .adapter(stalled)
        .build();

    let started = tokio::time::Instant::now();
    let submission = harness
        .service
        .submit(
            &caller("root", Role::Admin),
            request("analysis", &["claude", "openai"], "Assess the headline"),
            DispatchMode::Multi,
        )
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(5000), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(5500), "elapsed {:?}", elapsed);

    let Submission::Multi(aggregated) = submission else {
        panic!("expected a multi-dispatch result");
    };
    assert_eq!(aggregated.results.len(), 2);
    assert!(aggregated.results[0].is_success());
    assert_eq!(aggregated.results[1].failure(), Some(FailureKind::Timeout));
    assert_eq!(aggregated.results[1].error_reason(), Some("timeout"));
}

#[tokio::test]
async fn test_rejected_tasks_never_reach_a_provider() {
    let claude = ScriptedProvider::replying("claude", 0, "unused");
    let openai = ScriptedProvider::replying("openai", 0, "unused");
    let harness = HarnessBuilder::new()
        .adapter(claude.clone())
        .adapter(openai.clone())
        .build();

    // Role lacks the task kind
    let err = harness
        .service
        .submit(
            &caller("usr", Role::User),
            request("moderation", &["claude"], "Is this comment acceptable?"),
            DispatchMode::Single,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Rejected(ref r) if r.check == PolicyCheck::Capability
    ));

    // Only admins fan out
    let err = harness
        .service
        .submit(
            &caller("ed", Role::Editor),
            request("analysis", &["claude", "openai"], "Analyse the campaign"),
            DispatchMode::Multi,
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("multiple providers"));

    // Denylisted content
    let err = harness
        .service
        .submit(
            &caller("root", Role::Admin),
            request(
                "content-generation",
                &["claude"],
                "Write a post ending with <script>alert(1)</script>",
            ),
            DispatchMode::Single,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Rejected(ref r) if r.check == PolicyCheck::Denylist
    ));

    assert_eq!(claude.calls(), 0);
    assert_eq!(openai.calls(), 0);
    assert!(harness.monitor.is_empty());
}

#[tokio::test]
async fn test_request_quota_counts_admitted_tasks() {
    let claude = ScriptedProvider::replying("claude", 0, "ok");
    let harness = HarnessBuilder::new()
        .adapter(claude.clone())
        .policy(PolicyConfig {
            provider_roles: Default::default(),
            max_requests: 2,
            ..PolicyConfig::default()
        })
        .build();
    let editor = caller("ed", Role::Editor);

    for _ in 0..2 {
        harness
            .service
            .submit(
                &editor,
                request("summarization", &["claude"], "Summarise the thread"),
                DispatchMode::Single,
            )
            .await
            .unwrap();
    }

    let err = harness
        .service
        .submit(
            &editor,
            request("summarization", &["claude"], "Summarise the thread"),
            DispatchMode::Single,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Rejected(ref r) if r.check == PolicyCheck::Quota
    ));
    assert_eq!(claude.calls(), 2);

    // Quotas are per caller
    harness
        .service
        .submit(
            &caller("root", Role::Admin),
            request("summarization", &["claude"], "Summarise the thread"),
            DispatchMode::Single,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_request_quota_applies_to_queued_jobs() {
    let claude = ScriptedProvider::replying("claude", 0, "ok");
    let harness = HarnessBuilder::new()
        .adapter(claude.clone())
        .policy(PolicyConfig {
            provider_roles: Default::default(),
            max_requests: 1,
            ..PolicyConfig::default()
        })
        .build();
    let editor = caller("ed", Role::Editor);

    // No worker pool: nothing runs, so no usage is ever recorded
    let mut accepted = 0;
    let mut rejected = 0;
    for _ in 0..10 {
        let mut req = request("summarization", &["claude"], "Summarise overnight");
        req.mode = ExecutionMode::Async;
        match harness.service.submit(&editor, req, DispatchMode::Single).await {
            Ok(Submission::Queued(_)) => accepted += 1,
            Err(TaskServiceError::Rejected(r)) if r.check == PolicyCheck::Quota => rejected += 1,
            other => panic!("unexpected submission outcome: {:?}", other),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(rejected, 9);
    assert_eq!(harness.queue.depth(), 1);
    assert_eq!(claude.calls(), 0);

    let status = harness.service.monitor_status(None);
    assert_eq!(status.security.by_check[&PolicyCheck::Quota], 9);
}

#[tokio::test]
async fn test_concurrent_submissions_share_request_quota() {
    let harness = HarnessBuilder::new()
        .adapter(ScriptedProvider::replying("claude", 50, "ok"))
        .policy(PolicyConfig {
            provider_roles: Default::default(),
            max_requests: 3,
            ..PolicyConfig::default()
        })
        .build();

    let submissions = (0..8).map(|_| {
        let service = harness.service.clone();
        tokio::spawn(async move {
            service
                .submit(
                    &caller("ed", Role::Editor),
                    request("summarization", &["claude"], "Summarise the thread"),
                    DispatchMode::Single,
                )
                .await
                .is_ok()
        })
    });
    let accepted = futures::future::join_all(submissions)
        .await
        .into_iter()
        .filter(|joined| matches!(joined, Ok(true)))
        .count();
    assert_eq!(accepted, 3);
}

#[tokio::test]
async fn test_disabled_switch_rejects_before_dispatch() {
    let claude = ScriptedProvider::replying("claude", 0, "ok");
    let harness = HarnessBuilder::new()
        .adapter(claude.clone())
        .policy(PolicyConfig {
            provider_roles: Default::default(),
            enabled: false,
            ..PolicyConfig::default()
        })
        .build();

    let err = harness
        .service
        .submit(
            &caller("root", Role::Admin),
            request("summarization", &["claude"], "Summarise the thread"),
            DispatchMode::Single,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Rejected(ref r) if r.check == PolicyCheck::Disabled
    ));
    assert_eq!(claude.calls(), 0);
}

#[tokio::test]
async fn test_monthly_budget_stops_further_tasks() {
    // Scripted providers report 100 tokens per successful call
    let claude = ScriptedProvider::replying("claude", 0, "ok");
    let harness = HarnessBuilder::new()
        .adapter(claude.clone())
        .policy(PolicyConfig {
            provider_roles: Default::default(),
            monthly_token_budget: Some(200),
            ..PolicyConfig::default()
        })
        .build();

    for who in ["root", "ed"] {
        harness
            .service
            .submit(
                &caller(who, Role::Admin),
                request("summarization", &["claude"], "Summarise the thread"),
                DispatchMode::Single,
            )
            .await
            .unwrap();
    }

    let err = harness
        .service
        .submit(
            &caller("usr", Role::Admin),
            request("summarization", &["claude"], "Summarise the thread"),
            DispatchMode::Single,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Rejected(ref r) if r.check == PolicyCheck::Budget
    ));
    assert_eq!(claude.calls(), 2);
}

#[tokio::test]
async fn test_moderation_majority_reaches_consensus() {
    let harness = HarnessBuilder::new()
        .adapter(ScriptedProvider::replying("claude", 10, APPROVE))
        .adapter(ScriptedProvider::replying("openai", 10, REJECT))
        .adapter(ScriptedProvider::replying(
            "gemini",
            10,
            &format!("Verdict below.\n```json\n{}\n```", APPROVE),
        ))
        .build();

    let submission = harness
        .service
        .submit(
            &caller("root", Role::Admin),
            request("moderation", &["claude", "openai", "gemini"], "Review this comment"),
            DispatchMode::Multi,
        )
        .await
        .unwrap();

    let Submission::Multi(aggregated) = submission else {
        panic!("expected a multi-dispatch result");
    };
    let consensus = aggregated.consensus.expect("two of three agree");
    assert!(consensus.approved);
    assert_eq!(consensus.votes.len(), 3);
    assert!(consensus.abstained.is_empty());
    assert_eq!(consensus.reasons, vec!["on topic".to_string()]);
    assert!(aggregated.human_review.is_none());
}

#[tokio::test]
async fn test_moderation_without_enough_verdicts_needs_review() {
    let harness = HarnessBuilder::new()
        .adapter(ScriptedProvider::replying("claude", 10, APPROVE))
        .adapter(ScriptedProvider::replying("openai", 10, "I would rather not say."))
        .adapter(ScriptedProvider::failing("gemini", 10, FailureKind::Timeout))
        .build();

    let submission = harness
        .service
        .submit(
            &caller("root", Role::Admin),
            request("moderation", &["claude", "openai", "gemini"], "Review this comment"),
            DispatchMode::Multi,
        )
        .await
        .unwrap();

    let Submission::Multi(aggregated) = submission else {
        panic!("expected a multi-dispatch result");
    };
    assert!(aggregated.consensus.is_none());
    let review = aggregated.human_review.expect("one verdict is below the minimum");
    assert_eq!(review.votes.len(), 1);
    assert_eq!(review.abstained.len(), 2);
    assert!(review.reason.contains("needs human review"));
}

#[tokio::test]
async fn test_submission_validation() {
    let harness = HarnessBuilder::new()
        .adapter(ScriptedProvider::replying("claude", 0, "ok"))
        .build();
    let admin = caller("root", Role::Admin);

    let err = harness
        .service
        .submit(
            &admin,
            request("analysis", &["nonexistent"], "Analyse"),
            DispatchMode::Single,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Validation(ValidationError::UnknownProvider(_))
    ));

    let err = harness
        .service
        .submit(
            &admin,
            request("haiku-writing", &["claude"], "Write"),
            DispatchMode::Single,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Validation(ValidationError::UnknownKind(_))
    ));

    assert!(matches!(
        harness.service.authenticate(None).await,
        Err(TaskServiceError::Unauthenticated(_))
    ));
    assert!(matches!(
        harness.service.authenticate(Some("mallory")).await,
        Err(TaskServiceError::Unauthenticated(_))
    ));
    assert_eq!(
        harness.service.authenticate(Some("ed")).await.unwrap().role,
        Role::Editor
    );
}

#[tokio::test]
async fn test_async_job_lifecycle() {
    let harness = HarnessBuilder::new()
        .adapter(ScriptedProvider::replying("claude", 20, "queued answer"))
        .build();
    let editor = caller("ed", Role::Editor);

    let mut req = request("summarization", &["claude"], "Summarise overnight");
    req.mode = ExecutionMode::Async;
    let Submission::Queued(status) = harness
        .service
        .submit(&editor, req, DispatchMode::Single)
        .await
        .unwrap()
    else {
        panic!("async submissions are queued");
    };
    assert_eq!(status.state, JobState::Queued);
    assert_eq!(harness.service.monitor_status(None).queue_depth, 1);

    // Only the owner and admins can see the job
    assert!(matches!(
        harness.service.poll(&caller("usr", Role::User), status.job_id),
        Err(TaskServiceError::Job(JobError::NotFound(_)))
    ));
    assert!(harness
        .service
        .poll(&caller("root", Role::Admin), status.job_id)
        .is_ok());

    let shutdown = CancellationToken::new();
    let pool = WorkerPool::spawn(2, harness.queue.clone(), harness.service.clone(), shutdown.clone());

    let mut finished = None;
    for _ in 0..200 {
        let polled = harness.service.poll(&editor, status.job_id).unwrap();
        if polled.state.is_terminal() {
            finished = Some(polled);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let finished = finished.expect("job finished");
    assert_eq!(finished.state, JobState::Succeeded);
    let result = finished.result.expect("succeeded jobs carry a result");
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].content(), Some("queued answer"));

    shutdown.cancel();
    pool.join().await;
}

#[tokio::test]
async fn test_cancel_queued_job() {
    let claude = ScriptedProvider::replying("claude", 0, "never");
    let harness = HarnessBuilder::new().adapter(claude.clone()).build();
    let editor = caller("ed", Role::Editor);

    let mut req = request("translation", &["claude"], "Translate to French");
    req.mode = ExecutionMode::Async;
    let Submission::Queued(status) = harness
        .service
        .submit(&editor, req, DispatchMode::Single)
        .await
        .unwrap()
    else {
        panic!("async submissions are queued");
    };

    let cancelled = harness.service.cancel(&editor, status.job_id).unwrap();
    assert_eq!(cancelled.state, JobState::Cancelled);
    assert!(matches!(
        harness.service.cancel(&editor, status.job_id),
        Err(TaskServiceError::Job(JobError::InvalidTransition { .. }))
    ));

    // Workers skip the cancelled job
    let shutdown = CancellationToken::new();
    let pool = WorkerPool::spawn(1, harness.queue.clone(), harness.service.clone(), shutdown.clone());
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();
    pool.join().await;
    assert_eq!(claude.calls(), 0);
}
