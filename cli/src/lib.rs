// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! AI Central CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Daemon wiring and the operator commands that talk to it

pub mod commands;
pub mod daemon;
