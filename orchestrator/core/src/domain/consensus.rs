// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Moderation Consensus
//!
//! Reconciles the verdicts of several providers on a moderation task.
//!
//! Each successful provider output is parsed as a verdict of the form
//! `{"approved": bool, "confidence": number, "reasons": [..]}`, optionally
//! wrapped in a fenced code block. Outputs that do not parse abstain.
//!
//! | Strategy | Decision |
//! |----------|----------|
//! | `majority` | more approve votes than reject votes |
//! | `confidence_weighted` | larger summed self-confidence wins |
//!
//! Fewer than `min_votes` verdicts, or a tie, never yields a decision: the
//! outcome is [`ConsensusOutcome::NeedsReview`].
//!
//! The reported confidence mixes inter-provider agreement (variance of the
//! binary votes) with the providers' own confidence, using
//! [`ConfidenceWeighting`].

use serde::{Deserialize, Serialize};

use crate::domain::llm::ProviderResult;
use crate::domain::task::ProviderId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusStrategy {
    /// One provider, one vote
    #[default]
    Majority,
    /// Votes weighted by each provider's self-reported confidence
    ConfidenceWeighted,
}

impl ConsensusStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusStrategy::Majority => "majority",
            ConsensusStrategy::ConfidenceWeighted => "confidence_weighted",
        }
    }
}

/// Weights used to blend agreement and self-confidence into the consensus
/// confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeighting {
    /// Weight for agreement among providers (default: 0.7)
    #[serde(default = "default_agreement_factor")]
    pub agreement_factor: f64,

    /// Weight for providers' self-confidence (default: 0.3)
    #[serde(default = "default_self_confidence_factor")]
    pub self_confidence_factor: f64,
}

impl Default for ConfidenceWeighting {
    fn default() -> Self {
        Self {
            agreement_factor: 0.7,
            self_confidence_factor: 0.3,
        }
    }
}

impl ConfidenceWeighting {
    /// Validate that weights sum to approximately 1.0
    pub fn validate(&self) -> Result<(), String> {
        let sum = self.agreement_factor + self.self_confidence_factor;
        if (sum - 1.0).abs() > 0.01 {
            return Err(format!(
                "Confidence weights must sum to 1.0, got {:.2} (agreement) + {:.2} (self-confidence) = {:.2}",
                self.agreement_factor, self.self_confidence_factor, sum
            ));
        }
        if !(0.0..=1.0).contains(&self.agreement_factor) {
            return Err(format!(
                "Agreement factor must be between 0.0 and 1.0, got {}",
                self.agreement_factor
            ));
        }
        if !(0.0..=1.0).contains(&self.self_confidence_factor) {
            return Err(format!(
                "Self-confidence factor must be between 0.0 and 1.0, got {}",
                self.self_confidence_factor
            ));
        }
        Ok(())
    }
}

fn default_agreement_factor() -> f64 {
    0.7
}

fn default_self_confidence_factor() -> f64 {
    0.3
}

fn default_min_votes() -> usize {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    #[serde(default)]
    pub strategy: ConsensusStrategy,

    /// Minimum number of parsed verdicts required to decide
    #[serde(default = "default_min_votes")]
    pub min_votes: usize,

    #[serde(default)]
    pub confidence_weighting: ConfidenceWeighting,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            strategy: ConsensusStrategy::default(),
            min_votes: default_min_votes(),
            confidence_weighting: ConfidenceWeighting::default(),
        }
    }
}

/// Verdict a provider returns for a moderation task.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModerationVerdict {
    pub approved: bool,
    #[serde(default = "default_verdict_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
}

fn default_verdict_confidence() -> f64 {
    0.5
}

impl ModerationVerdict {
    /// Parse a verdict from raw provider output. Returns `None` when the
    /// output carries no recognisable verdict.
    pub fn parse(output: &str) -> Option<Self> {
        let candidate = extract_json(output).unwrap_or_else(|| output.trim().to_string());
        let mut verdict: ModerationVerdict = serde_json::from_str(&candidate)
            .ok()
            .or_else(|| {
                // Prose around a bare object: take the outermost braces.
                let start = output.find('{')?;
                let end = output.rfind('}')?;
                (start < end)
                    .then(|| serde_json::from_str(&output[start..=end]).ok())
                    .flatten()
            })?;
        if !verdict.confidence.is_finite() {
            verdict.confidence = default_verdict_confidence();
        }
        verdict.confidence = verdict.confidence.clamp(0.0, 1.0);
        Some(verdict)
    }
}

fn extract_json(text: &str) -> Option<String> {
    // Find start of markdown code block
    let start_marker = "```json";
    if let Some(start) = text.find(start_marker) {
        let content_start = start + start_marker.len();
        if let Some(end_offset) = text[content_start..].find("```") {
            let content_end = content_start + end_offset;
            return Some(text[content_start..content_end].trim().to_string());
        }
    }

    let generic_marker = "```";
    if let Some(start) = text.find(generic_marker) {
        let content_start = start + generic_marker.len();
        if let Some(end_offset) = text[content_start..].find("```") {
            let content_end = content_start + end_offset;
            return Some(text[content_start..content_end].trim().to_string());
        }
    }

    None
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub provider: ProviderId,
    pub approved: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationConsensus {
    pub approved: bool,
    pub confidence: f64,
    pub strategy: ConsensusStrategy,
    pub votes: Vec<Vote>,
    /// Providers whose output could not be used as a verdict
    pub abstained: Vec<ProviderId>,
    /// Reasons given by the winning side, de-duplicated in first-seen order
    pub reasons: Vec<String>,
}

/// Emitted instead of a consensus when the providers could not decide.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanReview {
    pub reason: String,
    pub votes: Vec<Vote>,
    pub abstained: Vec<ProviderId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsensusOutcome {
    Reached(ModerationConsensus),
    NeedsReview(HumanReview),
}

impl ConsensusOutcome {
    pub fn into_parts(self) -> (Option<ModerationConsensus>, Option<HumanReview>) {
        match self {
            ConsensusOutcome::Reached(consensus) => (Some(consensus), None),
            ConsensusOutcome::NeedsReview(review) => (None, Some(review)),
        }
    }
}

/// Compute the moderation consensus over every result of a fan-out.
pub fn evaluate(config: &ConsensusConfig, results: &[ProviderResult]) -> ConsensusOutcome {
    let mut votes = Vec::new();
    let mut reasons_by_vote = Vec::new();
    let mut abstained = Vec::new();

    for result in results {
        match result.content().and_then(ModerationVerdict::parse) {
            Some(verdict) => {
                votes.push(Vote {
                    provider: result.provider().clone(),
                    approved: verdict.approved,
                    confidence: verdict.confidence,
                });
                reasons_by_vote.push(verdict.reasons);
            }
            None => abstained.push(result.provider().clone()),
        }
    }

    let min_votes = config.min_votes.max(1);
    if votes.len() < min_votes {
        return ConsensusOutcome::NeedsReview(HumanReview {
            reason: format!(
                "needs human review: only {} of {} providers returned a usable verdict (minimum {})",
                votes.len(),
                results.len(),
                min_votes
            ),
            votes,
            abstained,
        });
    }

    let (approve_weight, reject_weight) = match config.strategy {
        ConsensusStrategy::Majority => {
            let approvals = votes.iter().filter(|v| v.approved).count() as f64;
            (approvals, votes.len() as f64 - approvals)
        }
        ConsensusStrategy::ConfidenceWeighted => votes.iter().fold((0.0, 0.0), |(a, r), v| {
            if v.approved {
                (a + v.confidence, r)
            } else {
                (a, r + v.confidence)
            }
        }),
    };

    if (approve_weight - reject_weight).abs() < f64::EPSILON {
        return ConsensusOutcome::NeedsReview(HumanReview {
            reason: format!(
                "needs human review: providers are split ({:.2} approve vs {:.2} reject under {})",
                approve_weight,
                reject_weight,
                config.strategy.as_str()
            ),
            votes,
            abstained,
        });
    }

    let approved = approve_weight > reject_weight;
    let confidence = consensus_confidence(&votes, &config.confidence_weighting);

    let mut reasons: Vec<String> = Vec::new();
    for (vote, vote_reasons) in votes.iter().zip(reasons_by_vote) {
        if vote.approved != approved {
            continue;
        }
        for reason in vote_reasons {
            if !reasons.contains(&reason) {
                reasons.push(reason);
            }
        }
    }

    ConsensusOutcome::Reached(ModerationConsensus {
        approved,
        confidence,
        strategy: config.strategy,
        votes,
        abstained,
        reasons,
    })
}

fn consensus_confidence(votes: &[Vote], weighting: &ConfidenceWeighting) -> f64 {
    let count = votes.len() as f64;
    if count == 0.0 {
        return 0.0;
    }

    // Votes as 1.0 / 0.0; maximum variance of a binary variable is 0.25.
    let mean = votes.iter().filter(|v| v.approved).count() as f64 / count;
    let variance = votes
        .iter()
        .map(|v| {
            let x = if v.approved { 1.0 } else { 0.0 };
            (x - mean).powi(2)
        })
        .sum::<f64>()
        / count;
    let agreement = 1.0 - (variance / 0.25).min(1.0);
    let self_confidence = votes.iter().map(|v| v.confidence).sum::<f64>() / count;

    (agreement * weighting.agreement_factor + self_confidence * weighting.self_confidence_factor)
        .clamp(0.0, 1.0)
}
