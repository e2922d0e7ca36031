//! # Similarity Resolver
//!
//! Decides whether a freshly embedded idea is new or the same as a stored one.
//!
//! The default policy walks matches in the order the index returned them and picks the
//! first whose score is strictly above the threshold. That is only "the best match" when
//! the index returns results in descending score order, which is the index's contract
//! and not something checked here beyond a warning. `MatchPolicy::BestOverThreshold`
//! removes the dependence on ordering.

use crate::{
    constants::{SIMILARITY_THRESHOLD, TOP_K},
    errors::ProviderError,
    providers::db::VectorIndex,
    types::{Decision, VectorMatch},
};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    #[default]
    FirstOverThreshold,
    BestOverThreshold,
}

fn is_descending(matches: &[VectorMatch]) -> bool {
    matches.windows(2).all(|w| w[0].score >= w[1].score)
}

/// Pure decision rule over a ranked match list.
pub fn decide(matches: Vec<VectorMatch>, threshold: f64, policy: MatchPolicy) -> Decision {
    if !is_descending(&matches) {
        warn!("Vector index returned matches out of score order; policy {policy:?} applies as-is.");
    }

    let chosen = match policy {
        MatchPolicy::FirstOverThreshold => matches.into_iter().find(|m| m.score > threshold),
        MatchPolicy::BestOverThreshold => matches
            .into_iter()
            .filter(|m| m.score > threshold)
            .max_by(|a, b| a.score.total_cmp(&b.score)),
    };

    match chosen {
        Some(m) => Decision::Merge(m),
        None => Decision::New,
    }
}

#[derive(Debug, Clone)]
pub struct SimilarityResolver {
    pub threshold: f64,
    pub top_k: usize,
    pub policy: MatchPolicy,
}

impl Default for SimilarityResolver {
    fn default() -> Self {
        Self {
            threshold: SIMILARITY_THRESHOLD,
            top_k: TOP_K,
            policy: MatchPolicy::default(),
        }
    }
}

impl SimilarityResolver {
    pub fn new(threshold: f64, top_k: usize, policy: MatchPolicy) -> Self {
        Self {
            threshold,
            top_k,
            policy,
        }
    }

    /// Queries the index for the `top_k` nearest stored ideas and applies the policy.
    pub async fn resolve(
        &self,
        index: &dyn VectorIndex,
        embedding: &[f32],
    ) -> Result<Decision, ProviderError> {
        let matches = index.query(embedding, self.top_k).await?;
        debug!(
            "Similarity query returned {} matches (top score {:?}).",
            matches.len(),
            matches.first().map(|m| m.score)
        );
        Ok(decide(matches, self.threshold, self.policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IdeaDraft, IdeaMetadata};

    fn hit(id: &str, score: f64) -> VectorMatch {
        VectorMatch {
            id: id.to_string(),
            score,
            metadata: IdeaMetadata {
                draft: IdeaDraft {
                    title: id.to_string(),
                    category: "Startup".into(),
                    problem_statement: String::new(),
                    solution: String::new(),
                    target_audience: String::new(),
                    innovation_score: 5.0,
                    potential_applications: String::new(),
                    prerequisites: String::new(),
                    additional_notes: String::new(),
                },
                source_fingerprint: None,
                count: 1,
            },
        }
    }

    fn merged_id(decision: Decision) -> Option<String> {
        match decision {
            Decision::Merge(m) => Some(m.id),
            Decision::New => None,
        }
    }

    #[test]
    fn score_above_threshold_merges() {
        let decision = decide(
            vec![hit("Smart Home AI Router", 0.81), hit("Other", 0.40)],
            0.75,
            MatchPolicy::FirstOverThreshold,
        );
        assert_eq!(merged_id(decision).as_deref(), Some("Smart Home AI Router"));
    }

    #[test]
    fn threshold_is_strict_and_empty_is_new() {
        assert_eq!(
            decide(vec![hit("A", 0.75)], 0.75, MatchPolicy::FirstOverThreshold),
            Decision::New
        );
        assert_eq!(
            decide(vec![], 0.75, MatchPolicy::FirstOverThreshold),
            Decision::New
        );
    }

    #[test]
    fn first_policy_follows_index_order_best_policy_does_not() {
        let unordered = vec![hit("Lower", 0.78), hit("Higher", 0.93)];
        assert_eq!(
            merged_id(decide(
                unordered.clone(),
                0.75,
                MatchPolicy::FirstOverThreshold
            ))
            .as_deref(),
            Some("Lower")
        );
        assert_eq!(
            merged_id(decide(unordered, 0.75, MatchPolicy::BestOverThreshold)).as_deref(),
            Some("Higher")
        );
    }
}
