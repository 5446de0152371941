//! BM25 pseudo-relevance feedback.
//!
//! Expansion terms are drawn from the top feedback documents and weighted by
//! the Robertson/Sparck-Jones relevance weight; candidates are ranked for
//! selection by offer weight (relevance weight scaled by feedback document
//! frequency). The rewritten query re-executes under BM25 with flat IDF,
//! since the relevance weight already encodes term discriminativeness.

use crate::config;
use crate::feature_vector::FeatureVector;
use crate::query::{Bm25Params, WeightedQuery};
use crate::rerank::{
    execute_or_fallback, is_clean_term, RerankContext, Reranker, ScoredDocument,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// BM25PRF parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bm25PrfConfig {
    /// Expansion terms kept after offer-weight selection.
    pub fb_terms: usize,
    /// Top documents treated as pseudo-relevant.
    pub fb_docs: usize,
    /// BM25 `k1` for query re-execution.
    pub k1: f32,
    /// BM25 `b` for query re-execution.
    pub b: f32,
    /// Relevance-weight multiplier applied to expansion (non-query) terms.
    pub new_term_weight: f32,
}

impl Default for Bm25PrfConfig {
    fn default() -> Self {
        Self {
            fb_terms: config::BM25_PRF_DEFAULT_FB_TERMS,
            fb_docs: config::BM25_PRF_DEFAULT_FB_DOCS,
            k1: config::BM25_PRF_DEFAULT_K1,
            b: config::BM25_PRF_DEFAULT_B,
            new_term_weight: config::BM25_PRF_DEFAULT_NEW_TERM_WEIGHT,
        }
    }
}

/// A feedback term candidate with its collection and feedback statistics.
#[derive(Debug, Clone)]
struct PrfFeature {
    term: String,
    /// Collection document frequency.
    df: u64,
    /// Frequency among the feedback documents.
    df_rel: u64,
    /// Multiplier on the relevance weight (1.0 for original query terms).
    weight: f64,
}

impl PrfFeature {
    /// Robertson/Sparck-Jones relevance weight, clamped to a small positive
    /// floor so every selected term keeps a usable boost.
    fn rel_weight(&self, num_docs: u64, num_rel: u64) -> f64 {
        let n = num_docs as f64;
        let r = num_rel as f64;
        let df = self.df as f64;
        let df_rel = self.df_rel as f64;
        let odds = ((df_rel + 0.5) * (n - df - r + df_rel + 0.5))
            / ((df - df_rel + 0.5) * (r - df_rel + 0.5));
        (odds.ln() * self.weight).max(config::MIN_REL_WEIGHT)
    }

    /// Selection score: relevance weight scaled by how often the term shows
    /// up among feedback documents. Used only to rank candidates, never as a
    /// query boost.
    fn offer_weight(&self, num_docs: u64, num_rel: u64) -> f64 {
        self.rel_weight(num_docs, num_rel) * (self.df_rel as f64).max(config::MIN_REL_WEIGHT).ln()
    }
}

/// BM25PRF reranker stage.
pub struct Bm25PrfReranker {
    config: Bm25PrfConfig,
}

impl Bm25PrfReranker {
    /// Creates a BM25PRF stage with the given parameters.
    pub fn new(config: Bm25PrfConfig) -> Self {
        Self { config }
    }

    /// Collects expansion candidates from the feedback documents.
    ///
    /// A candidate must pass term hygiene, not be all digits, not be an
    /// original query term, and appear in at least two feedback documents.
    /// Candidates are ranked by offer weight and cut to `fb_terms`.
    fn select_expansion_terms(
        &self,
        feedback_sets: &[HashSet<String>],
        original_terms: &HashSet<String>,
        context: &RerankContext<'_>,
    ) -> Vec<PrfFeature> {
        let mut df_rel: HashMap<&str, u64> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for set in feedback_sets {
            for term in set {
                if original_terms.contains(term.as_str())
                    || !is_clean_term(term)
                    || term.chars().all(|c| c.is_ascii_digit())
                {
                    continue;
                }
                let count = df_rel.entry(term.as_str()).or_insert(0);
                if *count == 0 {
                    order.push(term.as_str());
                }
                *count += 1;
            }
        }

        let num_docs = context.index.num_docs(&context.field);
        let num_rel = feedback_sets.len() as u64;
        let mut candidates: Vec<PrfFeature> = Vec::new();
        for term in order {
            let count = df_rel[term];
            if count < 2 {
                continue;
            }
            let df = match context.index.doc_freq(&context.field, term) {
                Ok(df) => df,
                Err(e) => {
                    tracing::warn!("dropping candidate '{term}': {e}");
                    continue;
                }
            };
            candidates.push(PrfFeature {
                term: term.to_string(),
                df,
                df_rel: count,
                weight: self.config.new_term_weight as f64,
            });
        }

        candidates.sort_by(|a, b| {
            let wa = a.offer_weight(num_docs, num_rel);
            let wb = b.offer_weight(num_docs, num_rel);
            wb.partial_cmp(&wa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.term.cmp(&b.term))
        });
        candidates.truncate(self.config.fb_terms);
        candidates
    }

    /// Original query terms as features with full weight, exempt from both
    /// the candidate filters and the `fb_terms` cut.
    fn original_features(
        &self,
        feedback_sets: &[HashSet<String>],
        context: &RerankContext<'_>,
    ) -> Vec<PrfFeature> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut features = Vec::new();
        for token in &context.query_tokens {
            if !seen.insert(token.as_str()) {
                continue;
            }
            let df = match context.index.doc_freq(&context.field, token) {
                Ok(df) => df,
                Err(e) => {
                    tracing::warn!("no statistics for query term '{token}': {e}");
                    0
                }
            };
            let df_rel = feedback_sets.iter().filter(|s| s.contains(token)).count() as u64;
            features.push(PrfFeature {
                term: token.clone(),
                df,
                df_rel,
                weight: 1.0,
            });
        }
        features
    }
}

impl Reranker for Bm25PrfReranker {
    fn rerank(&self, docs: Vec<ScoredDocument>, context: &RerankContext<'_>) -> Vec<ScoredDocument> {
        let num_rel = docs.len().min(self.config.fb_docs);
        let mut feedback_sets: Vec<HashSet<String>> = Vec::with_capacity(num_rel);
        for doc in &docs[..num_rel] {
            match context.index.term_vector(doc.doc_id, &context.field) {
                Ok(tv) => {
                    feedback_sets.push(tv.iter().map(|(t, _)| t.to_string()).collect());
                }
                Err(e) => {
                    tracing::warn!("skipping feedback doc {}: {e}", doc.external_id);
                }
            }
        }

        let original_terms: HashSet<String> = context.query_tokens.iter().cloned().collect();
        let mut features = self.original_features(&feedback_sets, context);
        features.extend(self.select_expansion_terms(&feedback_sets, &original_terms, context));

        let num_docs = context.index.num_docs(&context.field);
        let num_rel = feedback_sets.len() as u64;
        let mut fv = FeatureVector::new();
        for feature in &features {
            fv.add_weight(&feature.term, feature.rel_weight(num_docs, num_rel) as f32);
        }

        let query = WeightedQuery::from_feature_vector(&context.field, &fv)
            .with_similarity(Bm25Params {
                k1: self.config.k1,
                b: self.config.b,
                flat_idf: true,
            })
            .with_filter(context.filter.clone());
        if query.is_empty() {
            return docs;
        }

        tracing::debug!("{} expanded to {} terms", self.tag(), query.clauses.len());
        execute_or_fallback(&query, docs, context)
    }

    fn tag(&self) -> String {
        format!(
            "Bm25Prf(fbDocs={},fbTerms={},k1={},b={},newTermWeight={})",
            self.config.fb_docs,
            self.config.fb_terms,
            self.config.k1,
            self.config.b,
            self.config.new_term_weight
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{MemoryIndex, TermStatisticsProvider};

    fn feature(term: &str, df: u64, df_rel: u64, weight: f64) -> PrfFeature {
        PrfFeature {
            term: term.to_string(),
            df,
            df_rel,
            weight,
        }
    }

    #[test]
    fn test_rel_weight_formula() {
        // N=20, R=2, df=2, dfRel=2, weight=0.2:
        // ln(2.5·18.5/(0.5·0.5))·0.2 = ln(185)·0.2.
        let f = feature("dog", 2, 2, 0.2);
        let expected = 185.0f64.ln() * 0.2;
        assert!((f.rel_weight(20, 2) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_rel_weight_clamped_to_floor() {
        // Common term, rarely in feedback docs: log odds go negative.
        let f = feature("common", 18, 0, 1.0);
        assert_eq!(f.rel_weight(20, 2), config::MIN_REL_WEIGHT);
    }

    #[test]
    fn test_offer_weight_grows_with_feedback_frequency() {
        let rare = feature("rare", 3, 2, 0.2);
        let frequent = feature("freq", 3, 5, 0.2);
        assert!(frequent.offer_weight(100, 5) > rare.offer_weight(100, 5));
    }

    fn corpus() -> MemoryIndex {
        let mut idx = MemoryIndex::new("contents");
        idx.add_document("d0", "dog leash bark leash");
        idx.add_document("d1", "dog leash collar");
        idx.add_document("d2", "dog bone");
        for i in 0..17 {
            idx.add_document(&format!("filler{i}"), &format!("zzfill{i} misc{i}"));
        }
        idx
    }

    fn first_pass(idx: &MemoryIndex, ctx: &RerankContext<'_>) -> Vec<ScoredDocument> {
        let q = WeightedQuery::from_terms(&ctx.field, &ctx.query_tokens);
        idx.search(&q, ctx.hits, ctx.tie_break).unwrap()
    }

    #[test]
    fn test_terms_in_single_feedback_doc_are_excluded() {
        let idx = corpus();
        let ctx = RerankContext::new(&idx, "dog", vec!["dog".to_string()], "contents", 10);
        let reranker = Bm25PrfReranker::new(Bm25PrfConfig {
            fb_docs: 3,
            ..Bm25PrfConfig::default()
        });
        let sets: Vec<HashSet<String>> = first_pass(&idx, &ctx)[..3]
            .iter()
            .map(|d| {
                idx.term_vector(d.doc_id, "contents")
                    .unwrap()
                    .iter()
                    .map(|(t, _)| t.to_string())
                    .collect()
            })
            .collect();
        let originals: HashSet<String> = ["dog".to_string()].into();
        let selected = reranker.select_expansion_terms(&sets, &originals, &ctx);
        let terms: Vec<&str> = selected.iter().map(|f| f.term.as_str()).collect();
        // "leash" is in two feedback docs, "bone" and "collar" in one each.
        assert!(terms.contains(&"leash"));
        assert!(!terms.contains(&"bone"));
        assert!(!terms.contains(&"collar"));
        assert!(!terms.contains(&"dog"), "query terms are not candidates");
    }

    #[test]
    fn test_all_digit_terms_are_excluded() {
        let mut idx = MemoryIndex::new("contents");
        idx.add_document("d0", "dog 1999 treaty");
        idx.add_document("d1", "dog 1999 treaty");
        for i in 0..18 {
            idx.add_document(&format!("filler{i}"), &format!("zzfill{i}"));
        }
        let ctx = RerankContext::new(&idx, "dog", vec!["dog".to_string()], "contents", 10);
        let reranker = Bm25PrfReranker::new(Bm25PrfConfig::default());
        let sets: Vec<HashSet<String>> = (0..2)
            .map(|i| {
                idx.term_vector(i, "contents")
                    .unwrap()
                    .iter()
                    .map(|(t, _)| t.to_string())
                    .collect()
            })
            .collect();
        let originals: HashSet<String> = ["dog".to_string()].into();
        let selected = reranker.select_expansion_terms(&sets, &originals, &ctx);
        let terms: Vec<&str> = selected.iter().map(|f| f.term.as_str()).collect();
        assert!(!terms.contains(&"1999"));
        assert!(terms.contains(&"treaty"));
    }

    #[test]
    fn test_original_terms_always_survive() {
        let idx = corpus();
        let ctx = RerankContext::new(
            &idx,
            "dog unseen",
            vec!["dog".to_string(), "unseen".to_string()],
            "contents",
            10,
        );
        let reranker = Bm25PrfReranker::new(Bm25PrfConfig {
            fb_terms: 0, // no expansion budget at all
            ..Bm25PrfConfig::default()
        });
        let docs = first_pass(&idx, &ctx);
        let out = reranker.rerank(docs, &ctx);
        // Even with zero expansion terms the original query still runs;
        // "unseen" has df 0 but keeps its floor weight.
        assert!(!out.is_empty());
        assert!(out.iter().any(|d| d.external_id == "d0"));
    }

    #[test]
    fn test_rerank_is_deterministic() {
        let idx = corpus();
        let ctx = RerankContext::new(&idx, "dog", vec!["dog".to_string()], "contents", 10);
        let reranker = Bm25PrfReranker::new(Bm25PrfConfig {
            fb_docs: 3,
            ..Bm25PrfConfig::default()
        });
        let out1 = reranker.rerank(first_pass(&idx, &ctx), &ctx);
        let out2 = reranker.rerank(first_pass(&idx, &ctx), &ctx);
        assert!(!out1.is_empty());
        assert_eq!(
            out1.iter().map(|d| &d.external_id).collect::<Vec<_>>(),
            out2.iter().map(|d| &d.external_id).collect::<Vec<_>>()
        );
    }
}
