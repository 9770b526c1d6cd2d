// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod llm;
pub mod prompt_composer;
pub mod repositories;

pub use prompt_composer::PromptComposer;
