// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Aggregate
//!
//! A [`Task`] is the unit of work accepted by the orchestrator: one caller
//! instruction destined for one or more external AI providers.
//!
//! Tasks are built exclusively through [`TaskRequest::into_task`], which
//! enforces the structural invariants (non-empty, duplicate-free provider list,
//! bounded fan-out, clamped priority). Everything downstream of submission can
//! rely on those invariants holding.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Task identity, classification and inbound validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::llm::GenerationOptions;

/// Upper bound on the number of providers a single task may fan out to.
pub const MAX_FANOUT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification of a task. Drives prompt fragments, capability checks and
/// whether moderation consensus is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    ContentGeneration,
    Analysis,
    Moderation,
    Summarization,
    Translation,
    #[serde(alias = "SEO-optimization")]
    SeoOptimization,
    TrendAnalysis,
    Monitoring,
}

impl TaskKind {
    pub const ALL: [TaskKind; 8] = [
        TaskKind::ContentGeneration,
        TaskKind::Analysis,
        TaskKind::Moderation,
        TaskKind::Summarization,
        TaskKind::Translation,
        TaskKind::SeoOptimization,
        TaskKind::TrendAnalysis,
        TaskKind::Monitoring,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ContentGeneration => "content-generation",
            TaskKind::Analysis => "analysis",
            TaskKind::Moderation => "moderation",
            TaskKind::Summarization => "summarization",
            TaskKind::Translation => "translation",
            TaskKind::SeoOptimization => "seo-optimization",
            TaskKind::TrendAnalysis => "trend-analysis",
            TaskKind::Monitoring => "monitoring",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownKind(s.to_string()))
    }
}

/// Identifier of a configured provider adapter (e.g. `openai`, `claude`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(pub String);

impl CallerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "ADMIN")]
    Admin,
    #[serde(alias = "EDITOR")]
    Editor,
    #[serde(alias = "USER")]
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::User => "user",
        })
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Authenticated caller as resolved by the caller directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: CallerId,
    pub role: Role,
}

/// Scheduling priority in `[1, 10]`; higher is served sooner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;
    pub const DEFAULT: u8 = 5;

    /// Out-of-range values are clamped, never rejected.
    pub fn new(value: i64) -> Self {
        Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl From<i64> for Priority {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Ordered so that prompt composition is deterministic.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl TaskPayload {
    /// Bytes counted against the payload size limit.
    pub fn size_bytes(&self) -> usize {
        let metadata = if self.metadata.is_empty() {
            0
        } else {
            serde_json::to_string(&self.metadata)
                .map(|s| s.len())
                .unwrap_or(0)
        };
        self.instruction.len() + self.context.as_ref().map_or(0, |c| c.len()) + metadata
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sync,
    Async,
}

/// Selected by the `?mode=` query parameter of `POST /tasks`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    #[default]
    Single,
    Multi,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub caller_id: CallerId,
    pub providers: Vec<ProviderId>,
    pub payload: TaskPayload,
    pub priority: Priority,
    pub mode: ExecutionMode,
    pub dispatch: DispatchMode,
    pub compare_results: bool,
    pub options: GenerationOptions,
    pub submitted_at: DateTime<Utc>,
}

impl Task {
    pub fn is_fan_out(&self) -> bool {
        self.providers.len() > 1
    }
}

/// Inbound request body of `POST /tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub kind: String,
    pub providers: Vec<String>,
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub compare_results: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl TaskRequest {
    /// Validate the request and build the task. Does not consult the
    /// configured adapter set; unknown providers are rejected by the caller.
    pub fn into_task(
        self,
        caller_id: CallerId,
        dispatch: DispatchMode,
        defaults: &GenerationOptions,
    ) -> Result<Task, ValidationError> {
        let kind: TaskKind = self.kind.parse()?;

        if self.instruction.trim().is_empty() {
            return Err(ValidationError::EmptyInstruction);
        }

        if self.providers.is_empty() {
            return Err(ValidationError::NoProviders);
        }
        if self.providers.len() > MAX_FANOUT {
            return Err(ValidationError::TooManyProviders {
                requested: self.providers.len(),
                max: MAX_FANOUT,
            });
        }

        let mut seen = HashSet::new();
        let mut providers = Vec::with_capacity(self.providers.len());
        for raw in self.providers {
            let id = raw.trim().to_string();
            if id.is_empty() {
                return Err(ValidationError::EmptyProviderId);
            }
            if !seen.insert(id.clone()) {
                return Err(ValidationError::DuplicateProvider(id));
            }
            providers.push(ProviderId(id));
        }

        match dispatch {
            DispatchMode::Single if providers.len() != 1 => {
                return Err(ValidationError::SingleDispatchProviderCount(providers.len()));
            }
            DispatchMode::Single if self.compare_results => {
                return Err(ValidationError::CompareRequiresMulti);
            }
            _ => {}
        }

        let options = GenerationOptions {
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            temperature: self.temperature.or(defaults.temperature),
            stop_sequences: defaults.stop_sequences.clone(),
        };

        Ok(Task {
            id: TaskId::new(),
            kind,
            caller_id,
            providers,
            payload: TaskPayload {
                instruction: self.instruction,
                context: self.context.filter(|c| !c.trim().is_empty()),
                metadata: self.metadata,
            },
            priority: self.priority.map(Priority::new).unwrap_or_default(),
            mode: self.mode,
            dispatch,
            compare_results: self.compare_results,
            options,
            submitted_at: Utc::now(),
        })
    }
}

/// Structural problems with a submitted task. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown task kind '{0}'")]
    UnknownKind(String),

    #[error("instruction must not be empty")]
    EmptyInstruction,

    #[error("at least one provider is required")]
    NoProviders,

    #[error("provider identifiers must not be empty")]
    EmptyProviderId,

    #[error("too many providers: {requested} requested, at most {max} allowed")]
    TooManyProviders { requested: usize, max: usize },

    #[error("provider '{0}' listed more than once")]
    DuplicateProvider(String),

    #[error("single dispatch requires exactly one provider, got {0}")]
    SingleDispatchProviderCount(usize),

    #[error("compareResults is only available for multi dispatch")]
    CompareRequiresMulti,

    #[error("provider '{0}' is not configured")]
    UnknownProvider(String),
}
