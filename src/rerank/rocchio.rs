//! Rocchio centroid feedback.
//!
//! `q_new = α·q + β·centroid(top docs) − γ·centroid(bottom docs)`.
//! Unlike RM3, feedback documents contribute unweighted by retrieval score:
//! each document adds its L2-normalized term vector to a centroid average.
//! An optional relevance-feedback mode consumes judged documents instead of
//! the pseudo-relevant top of the ranking.

use crate::config;
use crate::feature_vector::FeatureVector;
use crate::query::WeightedQuery;
use crate::rerank::{
    execute_or_fallback, feedback_doc_vector, RerankContext, Reranker, ScoredDocument,
};
use serde::{Deserialize, Serialize};

/// Rocchio parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RocchioConfig {
    /// Expansion terms kept in the positive centroid.
    pub top_fb_terms: usize,
    /// Documents feeding the positive centroid (head of the ranking).
    pub top_fb_docs: usize,
    /// Expansion terms kept in the negative centroid.
    pub bottom_fb_terms: usize,
    /// Documents feeding the negative centroid (tail of the ranking).
    pub bottom_fb_docs: usize,
    /// Weight of the original query vector.
    pub alpha: f32,
    /// Weight of the positive centroid.
    pub beta: f32,
    /// Weight of the negative centroid.
    pub gamma: f32,
    /// Whether to compute the negative centroid at all.
    pub use_negative: bool,
    /// Relevance-feedback mode: scores are judgments; every document with a
    /// positive score participates (not just the top `top_fb_docs`).
    pub relevance_feedback: bool,
}

impl Default for RocchioConfig {
    fn default() -> Self {
        Self {
            top_fb_terms: config::ROCCHIO_DEFAULT_FB_TERMS,
            top_fb_docs: config::ROCCHIO_DEFAULT_FB_DOCS,
            bottom_fb_terms: config::ROCCHIO_DEFAULT_FB_TERMS,
            bottom_fb_docs: config::ROCCHIO_DEFAULT_FB_DOCS,
            alpha: config::ROCCHIO_DEFAULT_ALPHA,
            beta: config::ROCCHIO_DEFAULT_BETA,
            gamma: config::ROCCHIO_DEFAULT_GAMMA,
            use_negative: false,
            relevance_feedback: false,
        }
    }
}

/// Rocchio reranker stage.
pub struct RocchioReranker {
    config: RocchioConfig,
}

impl RocchioReranker {
    /// Creates a Rocchio stage with the given parameters.
    pub fn new(config: RocchioConfig) -> Self {
        Self { config }
    }

    /// Documents feeding the positive centroid.
    fn positive_docs<'d>(&self, docs: &'d [ScoredDocument]) -> Vec<&'d ScoredDocument> {
        if self.config.relevance_feedback {
            docs.iter().filter(|d| d.score > 0.0).collect()
        } else {
            docs.iter().take(self.config.top_fb_docs).collect()
        }
    }

    /// Documents feeding the negative centroid.
    fn negative_docs<'d>(&self, docs: &'d [ScoredDocument]) -> Vec<&'d ScoredDocument> {
        if self.config.relevance_feedback {
            docs.iter().filter(|d| d.score <= 0.0).collect()
        } else {
            docs.iter().rev().take(self.config.bottom_fb_docs).collect()
        }
    }

    /// Mean of L2-normalized document vectors, pruned and L2-scaled.
    ///
    /// Documents whose vector cannot be read are skipped (fail-soft);
    /// documents with a near-zero norm stay in the denominator but
    /// contribute nothing, so they dilute rather than distort the mean.
    fn centroid(
        &self,
        docs: &[&ScoredDocument],
        fb_terms: usize,
        context: &RerankContext<'_>,
    ) -> FeatureVector {
        let mut centroid = FeatureVector::new();
        let mut count = 0usize;

        for doc in docs {
            let terms = match context.index.term_vector(doc.doc_id, &context.field) {
                Ok(tv) => tv,
                Err(e) => {
                    tracing::warn!("skipping feedback doc {}: {e}", doc.external_id);
                    continue;
                }
            };
            let fv = match feedback_doc_vector(&terms, context.index, &context.field) {
                Ok(fv) => fv,
                Err(e) => {
                    tracing::warn!("skipping feedback doc {}: {e}", doc.external_id);
                    continue;
                }
            };
            count += 1;

            let norm = fv.l2_norm();
            if norm <= config::MIN_DOC_NORM {
                continue;
            }
            for (term, weight) in fv.iter() {
                centroid.add_weight(term, weight / norm);
            }
        }

        if count > 0 {
            centroid.scale(1.0 / count as f32);
        }

        centroid.prune_to_size(fb_terms);
        centroid.scale_to_unit_l2_norm();
        centroid
    }

    /// `α·q + β·positive − γ·negative`, dropping non-positive weights.
    fn combine(
        &self,
        query: &FeatureVector,
        positive: &FeatureVector,
        negative: &FeatureVector,
    ) -> FeatureVector {
        let mut combined = FeatureVector::new();
        let mut push = |term: &str, out: &mut FeatureVector| {
            if out.contains(term) {
                return;
            }
            let w = self.config.alpha * query.weight(term)
                + self.config.beta * positive.weight(term)
                - self.config.gamma * negative.weight(term);
            if w > 0.0 {
                out.add_weight(term, w);
            }
        };
        for term in query.terms() {
            push(term, &mut combined);
        }
        for term in positive.terms() {
            push(term, &mut combined);
        }
        for term in negative.terms() {
            push(term, &mut combined);
        }
        combined
    }
}

impl Reranker for RocchioReranker {
    fn rerank(&self, docs: Vec<ScoredDocument>, context: &RerankContext<'_>) -> Vec<ScoredDocument> {
        let mut query_vector = FeatureVector::from_terms(&context.query_tokens);
        query_vector.scale_to_unit_l2_norm();

        let positive = self.centroid(
            &self.positive_docs(&docs),
            self.config.top_fb_terms,
            context,
        );
        let negative = if self.config.use_negative {
            self.centroid(
                &self.negative_docs(&docs),
                self.config.bottom_fb_terms,
                context,
            )
        } else {
            FeatureVector::new()
        };

        let combined = self.combine(&query_vector, &positive, &negative);

        let mut query = WeightedQuery::from_feature_vector(&context.field, &combined)
            .with_filter(context.filter.clone());
        if query.is_empty() {
            query = WeightedQuery::from_terms(&context.field, &context.query_tokens)
                .with_filter(context.filter.clone());
            if query.is_empty() {
                return docs;
            }
        }

        tracing::debug!("{} expanded to {} terms", self.tag(), query.clauses.len());
        execute_or_fallback(&query, docs, context)
    }

    fn tag(&self) -> String {
        format!(
            "Rocchio(topFbDocs={},topFbTerms={},bottomFbDocs={},bottomFbTerms={},alpha={},beta={},gamma={})",
            self.config.top_fb_docs,
            self.config.top_fb_terms,
            self.config.bottom_fb_docs,
            self.config.bottom_fb_terms,
            self.config.alpha,
            self.config.beta,
            self.config.gamma
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;

    fn feedback_corpus() -> MemoryIndex {
        let mut idx = MemoryIndex::new("contents");
        idx.add_document("docA", "dog dog dog bark bark");
        idx.add_document("docB", "dog cat cat");
        for i in 0..18 {
            idx.add_document(&format!("filler{i}"), &format!("zzfill{i} other{i}"));
        }
        idx
    }

    fn scored(id: u32, ext: &str, score: f32) -> ScoredDocument {
        ScoredDocument {
            doc_id: id,
            external_id: ext.to_string(),
            score,
        }
    }

    #[test]
    fn test_centroid_ignores_retrieval_scores() {
        let idx = feedback_corpus();
        let ctx = RerankContext::new(&idx, "dog", vec!["dog".to_string()], "contents", 10);
        let reranker = RocchioReranker::new(RocchioConfig::default());

        // Wildly different scores must not change the centroid.
        let low = vec![scored(0, "docA", 0.1), scored(1, "docB", 0.2)];
        let high = vec![scored(0, "docA", 90.0), scored(1, "docB", 1.0)];
        let c1 = reranker.centroid(&low.iter().collect::<Vec<_>>(), 10, &ctx);
        let c2 = reranker.centroid(&high.iter().collect::<Vec<_>>(), 10, &ctx);
        for term in ["dog", "bark", "cat"] {
            assert!((c1.weight(term) - c2.weight(term)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_centroid_is_mean_of_normalized_vectors() {
        let idx = feedback_corpus();
        let ctx = RerankContext::new(&idx, "dog", vec!["dog".to_string()], "contents", 10);
        let reranker = RocchioReranker::new(RocchioConfig::default());
        let docs = vec![scored(0, "docA", 1.0), scored(1, "docB", 1.0)];
        let c = reranker.centroid(&docs.iter().collect::<Vec<_>>(), 10, &ctx);

        // docA {dog:3, bark:2} has norm √13, docB {dog:1, cat:2} norm √5.
        let norm_a = 13.0f32.sqrt();
        let norm_b = 5.0f32.sqrt();
        let raw_dog = (3.0 / norm_a + 1.0 / norm_b) / 2.0;
        let raw_bark = (2.0 / norm_a) / 2.0;
        let raw_cat = (2.0 / norm_b) / 2.0;
        let total = (raw_dog * raw_dog + raw_bark * raw_bark + raw_cat * raw_cat).sqrt();
        assert!((c.weight("dog") - raw_dog / total).abs() < 1e-5);
        assert!((c.weight("bark") - raw_bark / total).abs() < 1e-5);
        assert!((c.weight("cat") - raw_cat / total).abs() < 1e-5);
    }

    #[test]
    fn test_negative_centroid_subtracts_but_never_goes_negative() {
        let idx = feedback_corpus();
        let ctx = RerankContext::new(&idx, "dog", vec!["dog".to_string()], "contents", 10);
        let reranker = RocchioReranker::new(RocchioConfig {
            alpha: 0.0,
            beta: 1.0,
            gamma: 10.0,
            use_negative: true,
            top_fb_docs: 1,
            bottom_fb_docs: 1,
            ..RocchioConfig::default()
        });
        // docA positive, docB negative: dog appears in both, with a huge
        // gamma its combined weight dips below zero and must be dropped.
        let docs = vec![scored(0, "docA", 2.0), scored(1, "docB", 1.0)];
        let pos = reranker.centroid(&reranker.positive_docs(&docs), 10, &ctx);
        let neg = reranker.centroid(&reranker.negative_docs(&docs), 10, &ctx);
        let combined = reranker.combine(&FeatureVector::new(), &pos, &neg);
        assert!(!combined.contains("dog"));
        assert!(!combined.contains("cat"), "negative-only terms never enter");
        assert!(combined.weight("bark") > 0.0);
    }

    #[test]
    fn test_relevance_feedback_mode_uses_all_judged_positive() {
        let idx = feedback_corpus();
        let reranker = RocchioReranker::new(RocchioConfig {
            relevance_feedback: true,
            top_fb_docs: 1, // ignored in rf mode
            ..RocchioConfig::default()
        });
        let docs = vec![
            scored(0, "docA", 1.0),
            scored(1, "docB", 1.0),
            scored(2, "filler0", 0.0),
        ];
        let positive = reranker.positive_docs(&docs);
        assert_eq!(positive.len(), 2, "all positively judged docs participate");
        assert!(positive.iter().all(|d| d.score > 0.0));
    }

    #[test]
    fn test_rerank_returns_results() {
        let idx = feedback_corpus();
        let ctx = RerankContext::new(&idx, "dog", vec!["dog".to_string()], "contents", 10);
        let reranker = RocchioReranker::new(RocchioConfig::default());
        let docs = vec![scored(0, "docA", 2.0), scored(1, "docB", 1.0)];
        let out = reranker.rerank(docs, &ctx);
        assert!(!out.is_empty());
        let ids: Vec<&str> = out.iter().map(|d| d.external_id.as_str()).collect();
        assert!(ids.contains(&"docA"));
    }
}
