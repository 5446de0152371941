//! RM3 relevance-model feedback.
//!
//! Estimates a probability distribution over terms from the top feedback
//! documents — each document's normalized term vector weighted by its
//! first-pass retrieval score — then interpolates it with the original
//! query distribution and re-executes the interpolated query.

use crate::config;
use crate::feature_vector::FeatureVector;
use crate::query::WeightedQuery;
use crate::rerank::{
    execute_or_fallback, feedback_doc_vector, RerankContext, Reranker, ScoredDocument,
};
use serde::{Deserialize, Serialize};

/// RM3 parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rm3Config {
    /// Number of expansion terms kept in the relevance model.
    pub fb_terms: usize,
    /// Number of top documents treated as pseudo-relevant.
    pub fb_docs: usize,
    /// Interpolation weight λ of the original query, in `[0, 1]`.
    pub original_query_weight: f32,
}

impl Default for Rm3Config {
    fn default() -> Self {
        Self {
            fb_terms: config::RM3_DEFAULT_FB_TERMS,
            fb_docs: config::RM3_DEFAULT_FB_DOCS,
            original_query_weight: config::RM3_DEFAULT_ORIGINAL_QUERY_WEIGHT,
        }
    }
}

/// RM3 reranker stage.
pub struct Rm3Reranker {
    config: Rm3Config,
}

impl Rm3Reranker {
    /// Creates an RM3 stage with the given parameters.
    pub fn new(config: Rm3Config) -> Self {
        Self { config }
    }

    /// Estimates the relevance model from the feedback documents.
    ///
    /// Each feedback document contributes `w(t)/‖d‖₁ · score(d)`; documents
    /// whose vector norm falls below the guard threshold are skipped rather
    /// than dividing by zero. The result is pruned to `fb_terms` and
    /// L1-normalized.
    fn estimate_relevance_model(
        &self,
        docs: &[ScoredDocument],
        context: &RerankContext<'_>,
    ) -> FeatureVector {
        let num_docs = docs.len().min(self.config.fb_docs);
        let mut rm = FeatureVector::new();

        for doc in &docs[..num_docs] {
            let terms = match context.index.term_vector(doc.doc_id, &context.field) {
                Ok(tv) => tv,
                Err(e) => {
                    tracing::warn!("skipping feedback doc {}: {e}", doc.external_id);
                    continue;
                }
            };
            let mut fv = match feedback_doc_vector(&terms, context.index, &context.field) {
                Ok(fv) => fv,
                Err(e) => {
                    tracing::warn!("skipping feedback doc {}: {e}", doc.external_id);
                    continue;
                }
            };
            fv.prune_to_size(self.config.fb_terms);

            let norm = fv.l1_norm();
            if norm <= config::MIN_DOC_NORM {
                continue;
            }
            for (term, weight) in fv.iter() {
                rm.add_weight(term, weight / norm * doc.score);
            }
        }

        rm.prune_to_size(self.config.fb_terms);
        rm.scale_to_unit_l1_norm();
        rm
    }
}

impl Reranker for Rm3Reranker {
    fn rerank(&self, docs: Vec<ScoredDocument>, context: &RerankContext<'_>) -> Vec<ScoredDocument> {
        let mut query_vector = FeatureVector::from_terms(&context.query_tokens);
        query_vector.scale_to_unit_l1_norm();

        let relevance_model = self.estimate_relevance_model(&docs, context);
        let interpolated = FeatureVector::interpolate(
            &query_vector,
            &relevance_model,
            self.config.original_query_weight,
        );

        let mut query = WeightedQuery::from_feature_vector(&context.field, &interpolated)
            .with_filter(context.filter.clone());
        if query.is_empty() {
            // Nothing survived estimation; fall back to the original query.
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
            "Rm3(fbDocs={},fbTerms={},originalQueryWeight={})",
            self.config.fb_docs, self.config.fb_terms, self.config.original_query_weight
        )
    }
}
