// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cross-provider comparison of fan-out results.
//!
//! Only successful results take part. Similarity is the Jaccard index of the
//! lower-cased word sets of two outputs; a provider's rank is its mean
//! similarity to every other successful provider, ties broken by latency.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::domain::llm::ProviderResult;
use crate::domain::task::ProviderId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairwiseSimilarity {
    pub a: ProviderId,
    pub b: ProviderId,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRanking {
    pub provider: ProviderId,
    pub mean_similarity: f64,
    pub latency_ms: u64,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub total_providers: usize,
    pub successful_providers: usize,
    pub average_latency_ms: f64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub pairwise: Vec<PairwiseSimilarity>,
    pub ranking: Vec<ProviderRanking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_provider: Option<ProviderId>,
}

impl Comparison {
    pub fn from_results(results: &[ProviderResult]) -> Self {
        let successes: Vec<&ProviderResult> = results.iter().filter(|r| r.is_success()).collect();
        let word_sets: Vec<BTreeSet<String>> = successes
            .iter()
            .map(|r| word_set(r.content().unwrap_or_default()))
            .collect();

        let mut pairwise = Vec::new();
        let mut similarity_sums = vec![0.0_f64; successes.len()];
        for i in 0..successes.len() {
            for j in (i + 1)..successes.len() {
                let similarity = jaccard(&word_sets[i], &word_sets[j]);
                similarity_sums[i] += similarity;
                similarity_sums[j] += similarity;
                pairwise.push(PairwiseSimilarity {
                    a: successes[i].provider().clone(),
                    b: successes[j].provider().clone(),
                    similarity,
                });
            }
        }

        let peers = successes.len().saturating_sub(1);
        let mut ranking: Vec<ProviderRanking> = successes
            .iter()
            .zip(similarity_sums)
            .map(|(result, sum)| ProviderRanking {
                provider: result.provider().clone(),
                // A lone success has nothing to disagree with.
                mean_similarity: if peers == 0 { 1.0 } else { sum / peers as f64 },
                latency_ms: result.latency_ms(),
                total_tokens: result.usage().total_tokens,
            })
            .collect();
        ranking.sort_by(|x, y| {
            y.mean_similarity
                .total_cmp(&x.mean_similarity)
                .then(x.latency_ms.cmp(&y.latency_ms))
                .then(x.provider.cmp(&y.provider))
        });

        let average_latency_ms = if successes.is_empty() {
            0.0
        } else {
            successes.iter().map(|r| r.latency_ms() as f64).sum::<f64>() / successes.len() as f64
        };

        Self {
            total_providers: results.len(),
            successful_providers: successes.len(),
            average_latency_ms,
            total_tokens: successes.iter().map(|r| r.usage().total_tokens as u64).sum(),
            total_cost_usd: successes.iter().map(|r| r.usage().cost_usd).sum(),
            pairwise,
            best_provider: ranking.first().map(|r| r.provider.clone()),
            ranking,
        }
    }
}

fn word_set(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Word-set similarity of two texts in `[0, 1]`.
pub fn word_similarity(a: &str, b: &str) -> f64 {
    jaccard(&word_set(a), &word_set(b))
}
