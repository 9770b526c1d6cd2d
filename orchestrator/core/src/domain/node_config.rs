// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Orchestrator Configuration Types
//
// Defines the configuration schema for an AI Central orchestrator node:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Provider adapters (vendor type, endpoint, credentials, timeout, pricing)
// - Policy gate, consensus and prompt composition settings
// - Job queue, usage monitor, network and observability settings

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::consensus::ConsensusConfig;
use crate::domain::llm::GenerationOptions;
use crate::domain::policy::PolicyConfig;
use crate::domain::task::{Caller, TaskKind};
use crate::domain::usage::AlertRules;

pub const API_VERSION: &str = "ai-central/v1";
pub const KIND: &str = "OrchestratorConfig";

/// Top-level Kubernetes-style configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// API version (must be "ai-central/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "OrchestratorConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: OrchestratorSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable node name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Configuration specification (content under spec:)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSpec {
    /// External AI providers, one adapter each
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub consensus: ConsensusConfig,

    #[serde(default)]
    pub prompts: PromptConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    /// Static caller directory used when no database is configured
    #[serde(default)]
    pub callers: Vec<Caller>,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider identifier used in task requests (e.g., "openai", "claude")
    pub name: String,

    /// Provider type
    #[serde(rename = "type")]
    pub provider_type: String, // "openai", "openai-compatible", "anthropic", "ollama", "mock"

    /// API endpoint URL
    #[serde(default)]
    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Vendor model identifier
    #[serde(default)]
    pub model: String,

    /// Whether this provider is active
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Per-attempt timeout enforced by the adapter
    #[serde(default = "default_provider_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Cost per 1,000 tokens (0.0 for local models)
    #[serde(default)]
    pub cost_per_1k_tokens: f64,

    /// Behaviour of `type: mock` providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock: Option<MockProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockProviderConfig {
    /// Simulated latency of every call
    #[serde(default = "default_mock_latency", with = "humantime_serde")]
    pub latency: Duration,

    /// Fixed response text; when absent the prompt is echoed back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl Default for MockProviderConfig {
    fn default() -> Self {
        Self {
            latency: default_mock_latency(),
            response: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Delay before the single retry of a transport failure
    #[serde(default = "default_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            retry_delay: default_retry_delay(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl ExecutionConfig {
    pub fn generation_defaults(&self) -> GenerationOptions {
        GenerationOptions {
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            stop_sequences: None,
        }
    }
}

/// Prompt fragments are Handlebars templates. Available variables:
/// `{{platform}}` and `{{kind}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_platform")]
    pub platform: String,

    /// Safety preamble prepended to every prompt
    #[serde(default = "default_guardrail")]
    pub guardrail: String,

    /// Role/style fragment per task kind; kinds without an entry fall back to
    /// the built-in fragment
    #[serde(default = "default_fragments")]
    pub fragments: BTreeMap<TaskKind, String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            guardrail: default_guardrail(),
            fragments: default_fragments(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of concurrent job workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How long finished jobs stay pollable
    #[serde(default = "default_job_retention", with = "humantime_serde")]
    pub job_retention: Duration,

    /// How often finished jobs past retention are evicted
    #[serde(default = "default_eviction_interval", with = "humantime_serde")]
    pub eviction_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            job_retention: default_job_retention(),
            eviction_interval: default_eviction_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub alert_rules: AlertRules,

    /// Window used by `GET /monitor/status` when none is requested
    #[serde(default = "default_alert_window", with = "humantime_serde")]
    pub default_window: Duration,

    /// Records older than this are pruned from the in-memory ledger
    #[serde(default = "default_usage_retention", with = "humantime_serde")]
    pub retention: Duration,

    /// Capacity of the channel feeding the durable sink
    #[serde(default = "default_sink_buffer")]
    pub sink_buffer: usize,

    #[serde(default = "default_sink_batch_size")]
    pub sink_batch_size: usize,

    #[serde(default = "default_sink_flush_interval", with = "humantime_serde")]
    pub sink_flush_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            alert_rules: AlertRules::default(),
            default_window: default_alert_window(),
            retention: default_usage_retention(),
            sink_buffer: default_sink_buffer(),
            sink_batch_size: default_sink_batch_size(),
            sink_flush_interval: default_sink_flush_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string (supports "env:VAR_NAME")
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format ("text" or "json")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig {
        name: "mock".to_string(),
        provider_type: "mock".to_string(),
        endpoint: String::new(),
        api_key: None,
        model: "mock-1".to_string(),
        enabled: true,
        timeout: default_provider_timeout(),
        cost_per_1k_tokens: 0.0,
        mock: Some(MockProviderConfig::default()),
    }]
}

fn default_provider_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_mock_latency() -> Duration {
    Duration::from_millis(50)
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_platform() -> String {
    "AI Central".to_string()
}

fn default_guardrail() -> String {
    "# {{platform}} assistant rules\n\
     - Stay within the requested {{kind}} task; do not take actions beyond it.\n\
     - Never reveal, request or invent personal data, credentials or payment details.\n\
     - Refuse harmful, illegal, deceptive or hateful content.\n\
     - Keep a professional, helpful tone and mark uncertain facts as such.\n\
     - Escalate anything that needs a human decision instead of guessing."
        .to_string()
}

fn default_fragments() -> BTreeMap<TaskKind, String> {
    BTreeMap::from([
        (
            TaskKind::ContentGeneration,
            "You are a senior editor for {{platform}}. Write original, well-structured copy \
             that matches the publication's voice."
                .to_string(),
        ),
        (
            TaskKind::Analysis,
            "You are a content analyst. Report findings as concise bullet points backed by \
             the supplied material."
                .to_string(),
        ),
        (
            TaskKind::Moderation,
            "You are a content moderator for {{platform}}. Respond only with JSON of the form \
             {\"approved\": true|false, \"confidence\": 0.0-1.0, \"reasons\": [\"...\"]}."
                .to_string(),
        ),
        (
            TaskKind::Summarization,
            "You summarise articles faithfully. Keep key facts, drop filler, never add claims."
                .to_string(),
        ),
        (
            TaskKind::Translation,
            "You are a professional translator. Preserve meaning, tone and formatting."
                .to_string(),
        ),
        (
            TaskKind::SeoOptimization,
            "You are an SEO specialist. Suggest titles, meta descriptions and keywords \
             without keyword stuffing."
                .to_string(),
        ),
        (
            TaskKind::TrendAnalysis,
            "You identify emerging topics and trends relevant to {{platform}} readers and \
             rank them by momentum."
                .to_string(),
        ),
        (
            TaskKind::Monitoring,
            "You are an operations analyst. Diagnose the reported system behaviour and \
             propose safe next steps."
                .to_string(),
        ),
    ])
}

fn default_workers() -> usize {
    4
}

fn default_job_retention() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_eviction_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_alert_window() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_usage_retention() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_sink_buffer() -> usize {
    1024
}

fn default_sink_batch_size() -> usize {
    100
}

fn default_sink_flush_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_max_connections() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for OrchestratorSpec {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            execution: ExecutionConfig::default(),
            policy: PolicyConfig::default(),
            consensus: ConsensusConfig::default(),
            prompts: PromptConfig::default(),
            queue: QueueConfig::default(),
            monitor: MonitorConfig::default(),
            network: NetworkConfig::default(),
            database: None,
            callers: vec![],
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "ai-central".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: OrchestratorSpec::default(),
        }
    }
}

/// Resolve a secret reference (supports "env:VAR_NAME" syntax)
pub fn resolve_secret(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var_name) => std::env::var(var_name)
            .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
        None => Ok(value.to_string()),
    }
}

impl OrchestratorConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. AI_CENTRAL_CONFIG_PATH environment variable
    /// 2. ./ai-central.yaml (working directory)
    /// 3. ~/.ai-central/config.yaml (user home)
    /// 4. /etc/ai-central/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("AI_CENTRAL_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./ai-central.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".ai-central").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/ai-central/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path (fail if missing/invalid)
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    /// This allows container deployments to override config via env vars
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("AI_CENTRAL_DATABASE_URL") {
            tracing::info!("Environment override: AI_CENTRAL_DATABASE_URL");
            match self.spec.database.as_mut() {
                Some(db) => db.url = url,
                None => {
                    self.spec.database = Some(DatabaseConfig {
                        url,
                        max_connections: default_max_connections(),
                    })
                }
            }
        }

        if let Ok(val) = std::env::var("AI_CENTRAL_PORT") {
            match val.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: AI_CENTRAL_PORT={}", port);
                    self.spec.network.port = port;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for AI_CENTRAL_PORT: '{}'. Expected a port number. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("AI_CENTRAL_WORKERS") {
            match val.parse::<usize>() {
                Ok(workers) if workers > 0 => {
                    tracing::info!("Environment override: AI_CENTRAL_WORKERS={}", workers);
                    self.spec.queue.workers = workers;
                }
                _ => tracing::warn!(
                    "Invalid value for AI_CENTRAL_WORKERS: '{}'. Expected a positive integer. Ignoring.",
                    val
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;
        let mut names = std::collections::HashSet::new();
        for provider in &spec.providers {
            if provider.name.is_empty() {
                anyhow::bail!("Provider name cannot be empty");
            }
            if !names.insert(provider.name.as_str()) {
                anyhow::bail!("Duplicate provider name: {}", provider.name);
            }
            match provider.provider_type.as_str() {
                "mock" => {}
                "openai" | "openai-compatible" | "anthropic" | "ollama" => {
                    if provider.model.is_empty() {
                        anyhow::bail!("Provider model cannot be empty for: {}", provider.name);
                    }
                    if provider.provider_type != "anthropic" && provider.endpoint.is_empty() {
                        anyhow::bail!("Provider endpoint cannot be empty for: {}", provider.name);
                    }
                }
                other => anyhow::bail!(
                    "Unsupported provider type '{}' for: {}",
                    other,
                    provider.name
                ),
            }
            if provider.timeout.is_zero() {
                anyhow::bail!("Provider timeout must be positive for: {}", provider.name);
            }
            if provider.cost_per_1k_tokens < 0.0 {
                anyhow::bail!("cost_per_1k_tokens cannot be negative for: {}", provider.name);
            }
        }
        if !spec.providers.iter().any(|p| p.enabled) {
            anyhow::bail!("At least one provider must be enabled");
        }

        for pattern in &spec.policy.denylist {
            regex::Regex::new(pattern)
                .map_err(|e| anyhow::anyhow!("Invalid denylist pattern '{}': {}", pattern, e))?;
        }
        if spec.policy.request_window.is_zero() || spec.policy.token_window.is_zero() {
            anyhow::bail!("Policy quota windows must be positive");
        }
        let longest_window = spec.policy.request_window.max(spec.policy.token_window);
        if spec.monitor.retention < longest_window {
            anyhow::bail!(
                "monitor.retention ({:?}) must cover the longest quota window ({:?})",
                spec.monitor.retention,
                longest_window
            );
        }
        let month = Duration::from_secs(31 * 24 * 60 * 60);
        if spec.policy.monthly_token_budget.is_some() && spec.monitor.retention < month {
            anyhow::bail!(
                "monitor.retention ({:?}) must cover a month when policy.monthly_token_budget is set",
                spec.monitor.retention
            );
        }

        spec.consensus
            .confidence_weighting
            .validate()
            .map_err(|e| anyhow::anyhow!(e))?;
        if spec.consensus.min_votes == 0 {
            anyhow::bail!("consensus.min_votes must be at least 1");
        }

        if spec.queue.workers == 0 {
            anyhow::bail!("queue.workers must be at least 1");
        }
        if spec.monitor.sink_buffer == 0 || spec.monitor.sink_batch_size == 0 {
            anyhow::bail!("monitor sink buffer and batch size must be positive");
        }

        let mut caller_ids = std::collections::HashSet::new();
        for caller in &spec.callers {
            if !caller_ids.insert(&caller.id) {
                anyhow::bail!("Duplicate caller id: {}", caller.id);
            }
        }

        Ok(())
    }
}
