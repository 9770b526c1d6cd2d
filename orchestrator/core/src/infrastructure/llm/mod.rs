// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each vendor client translates between our domain interface and an external
// API; `VendorAdapter` lifts a client into the provider adapter contract and
// `AdapterSet` keys the adapters by provider identifier.

pub mod adapter;
pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod registry;

pub use adapter::VendorAdapter;
pub use registry::AdapterSet;
