// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Prompt Composer
//!
//! Builds the final provider prompt from a task, using Handlebars for the
//! configured guardrail and per-kind fragments.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Transform a task into the exact text every adapter receives
//! - **Integration:** `PromptConfig` → `ProviderManager`
//!
//! # Supported Placeholders
//!
//! - `{{platform}}` - Platform name from configuration
//! - `{{kind}}` - Task kind identifier (e.g. `content-generation`)
//!
//! Templates are rendered once at construction. `compose` only concatenates,
//! so identical tasks always yield byte-identical prompts.

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::llm::FinalPrompt;
use crate::domain::node_config::PromptConfig;
use crate::domain::task::{Task, TaskKind};

const SECTION_SEPARATOR: &str = "\n\n";

#[derive(Serialize)]
struct FragmentContext<'a> {
    platform: &'a str,
    kind: &'a str,
}

pub struct PromptComposer {
    guardrails: BTreeMap<TaskKind, String>,
    fragments: BTreeMap<TaskKind, String>,
}

impl PromptComposer {
    /// Pre-render every template. Fails on invalid Handlebars syntax.
    pub fn new(config: &PromptConfig) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape); // Prompts are plain text, not HTML

        let mut guardrails = BTreeMap::new();
        let mut fragments = BTreeMap::new();

        for kind in TaskKind::ALL {
            let context = FragmentContext {
                platform: &config.platform,
                kind: kind.as_str(),
            };

            let guardrail = handlebars
                .render_template(&config.guardrail, &context)
                .context("Failed to render guardrail template")?;
            guardrails.insert(kind, guardrail);

            if let Some(template) = config.fragments.get(&kind) {
                let fragment = handlebars
                    .render_template(template, &context)
                    .with_context(|| format!("Failed to render prompt fragment for '{}'", kind.as_str()))?;
                fragments.insert(kind, fragment);
            }
        }

        Ok(Self {
            guardrails,
            fragments,
        })
    }

    /// guardrail → fragment → context → metadata (sorted by key) → instruction
    pub fn compose(&self, task: &Task) -> FinalPrompt {
        let mut sections: Vec<String> = Vec::with_capacity(5);

        if let Some(guardrail) = self.guardrails.get(&task.kind) {
            sections.push(guardrail.clone());
        }
        if let Some(fragment) = self.fragments.get(&task.kind) {
            sections.push(fragment.clone());
        }
        if let Some(context) = &task.payload.context {
            sections.push(format!("Context:\n{}", context));
        }
        if !task.payload.metadata.is_empty() {
            let lines: Vec<String> = task
                .payload
                .metadata
                .iter()
                .map(|(key, value)| match value {
                    serde_json::Value::String(s) => format!("- {}: {}", key, s),
                    other => format!("- {}: {}", key, other),
                })
                .collect();
            sections.push(format!("Metadata:\n{}", lines.join("\n")));
        }
        sections.push(format!("Task:\n{}", task.payload.instruction));

        FinalPrompt::new(sections.join(SECTION_SEPARATOR))
    }
}
