//! Deterministic tie-break post-processors.
//!
//! Retrieval scores are rounded to a fixed resolution, then runs of equal
//! rounded scores are perturbed downward so every document carries a unique
//! score and downstream consumers (evaluation tools, score-sorted merges)
//! see one unambiguous order. [`ScoreTiesAdjuster`] keeps the incoming order
//! and only touches scores; [`Tiebreaker`] additionally re-sorts ties by
//! external id first.

use crate::config;
use crate::rerank::{RerankContext, Reranker, ScoredDocument};

/// Rounds a score to the tie-detection resolution.
fn round_score(score: f32) -> f32 {
    (score / config::SCORE_ROUNDING).round() * config::SCORE_ROUNDING
}

/// Rounds every score and perturbs runs of equal rounded scores in place.
///
/// The i-th duplicate in a run loses `i` perturbation steps, so a run keeps
/// its relative order while becoming strictly descending.
fn adjust_ties(docs: &mut [ScoredDocument]) {
    let mut prev: Option<f32> = None;
    let mut duplicates = 0u32;
    for doc in docs.iter_mut() {
        let mut score = round_score(doc.score);
        match prev {
            Some(p) if p - score <= config::SCORE_ROUNDING => {
                duplicates += 1;
                score -= config::TIE_PERTURBATION * duplicates as f32;
            }
            _ => duplicates = 0,
        }
        doc.score = score;
        prev = Some(score);
    }
}

/// Rounds scores and perturbs ties without changing document order.
///
/// Use this when the upstream engine already ordered ties the way you want
/// and only the scores need disambiguation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreTiesAdjuster;

impl Reranker for ScoreTiesAdjuster {
    fn rerank(
        &self,
        mut docs: Vec<ScoredDocument>,
        _context: &RerankContext<'_>,
    ) -> Vec<ScoredDocument> {
        adjust_ties(&mut docs);
        docs
    }

    fn tag(&self) -> String {
        "ScoreTiesAdjuster".to_string()
    }
}

/// Re-sorts ties by external id, then perturbs scores.
///
/// Rounded scores sort descending with equal scores ordered by external id
/// lexicographically ascending, making the final ranking independent of the
/// engine's internal document order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tiebreaker;

impl Reranker for Tiebreaker {
    fn rerank(
        &self,
        mut docs: Vec<ScoredDocument>,
        _context: &RerankContext<'_>,
    ) -> Vec<ScoredDocument> {
        docs.sort_by(|a, b| {
            round_score(b.score)
                .partial_cmp(&round_score(a.score))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });
        adjust_ties(&mut docs);
        docs
    }

    fn tag(&self) -> String {
        "Tiebreaker".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;

    fn doc(ext: &str, score: f32) -> ScoredDocument {
        ScoredDocument {
            doc_id: 0,
            external_id: ext.to_string(),
            score,
        }
    }

    fn ctx(idx: &MemoryIndex) -> RerankContext<'_> {
        RerankContext::new(idx, "q", vec!["q".to_string()], "contents", 10)
    }

    #[test]
    fn test_rounding_resolution() {
        assert!((round_score(22.08743) - 22.0874).abs() < 1e-6);
        assert!((round_score(22.08747) - 22.0875).abs() < 1e-6);
        assert_eq!(round_score(0.0), 0.0);
    }

    #[test]
    fn test_adjuster_breaks_ties_and_keeps_order() {
        let idx = MemoryIndex::new("contents");
        // Second and third round to the same 22.0874.
        let docs = vec![
            doc("a", 23.43927),
            doc("b", 22.08743),
            doc("c", 22.08744),
            doc("d", 21.60251),
        ];
        let out = ScoreTiesAdjuster.rerank(docs, &ctx(&idx));
        let ids: Vec<&str> = out.iter().map(|d| d.external_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c", "d"], "input order preserved");
        for pair in out.windows(2) {
            assert!(pair[0].score > pair[1].score, "strictly descending");
        }
        // The perturbation stays below the rounding resolution.
        assert!(out[1].score - out[2].score < config::SCORE_ROUNDING);
    }

    #[test]
    fn test_adjuster_run_of_three() {
        let idx = MemoryIndex::new("contents");
        let docs = vec![doc("a", 5.0), doc("b", 5.0), doc("c", 5.0)];
        let out = ScoreTiesAdjuster.rerank(docs, &ctx(&idx));
        assert!(out[0].score > out[1].score);
        assert!(out[1].score > out[2].score);
        assert!((out[0].score - out[2].score).abs() < config::SCORE_ROUNDING);
    }

    #[test]
    fn test_tiebreaker_reorders_ties_by_external_id() {
        let idx = MemoryIndex::new("contents");
        let docs = vec![
            doc("zulu", 5.0),
            doc("alpha", 5.0),
            doc("mike", 7.0),
        ];
        let out = Tiebreaker.rerank(docs, &ctx(&idx));
        let ids: Vec<&str> = out.iter().map(|d| d.external_id.as_str()).collect();
        assert_eq!(ids, ["mike", "alpha", "zulu"]);
        assert!(out[1].score > out[2].score);
    }

    #[test]
    fn test_distinct_scores_pass_through() {
        let idx = MemoryIndex::new("contents");
        let docs = vec![doc("a", 3.0), doc("b", 2.0), doc("c", 1.0)];
        let out = ScoreTiesAdjuster.rerank(docs, &ctx(&idx));
        assert_eq!(out[0].score, 3.0);
        assert_eq!(out[1].score, 2.0);
        assert_eq!(out[2].score, 1.0);
    }

    #[test]
    fn test_empty_input() {
        let idx = MemoryIndex::new("contents");
        assert!(ScoreTiesAdjuster.rerank(Vec::new(), &ctx(&idx)).is_empty());
        assert!(Tiebreaker.rerank(Vec::new(), &ctx(&idx)).is_empty());
    }
}
