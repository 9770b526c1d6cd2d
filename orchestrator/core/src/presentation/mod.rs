// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer
//!
//! HTTP surface over [`crate::application::task_service::TaskService`]. Handlers
//! only translate requests and map service errors to status codes.

pub mod api;
