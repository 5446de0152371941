//! Reranker trait, pipeline, and the PRF feedback model implementations.
//!
//! Every stage — feedback estimator or post-processor — implements the same
//! `rerank(docs, context) -> docs` contract and composes into a
//! [`RerankerPipeline`] applied in sequence. No stage ever fails hard:
//! reranking degrades to the best ranking computed so far.

/// Axiomatic feedback: mutual-information term selection over a sampled pool.
pub mod axiom;
/// BM25PRF: Robertson/Sparck-Jones offer-weight feedback.
pub mod bm25_prf;
/// RM3 relevance-model estimation.
pub mod rm3;
/// Rocchio centroid feedback.
pub mod rocchio;
/// Deterministic tie-break post-processors.
pub mod tiebreak;
/// Rank-list truncation post-processor.
pub mod truncate;

pub use axiom::{AxiomConfig, AxiomaticReranker};
pub use bm25_prf::{Bm25PrfConfig, Bm25PrfReranker};
pub use rm3::{Rm3Config, Rm3Reranker};
pub use rocchio::{RocchioConfig, RocchioReranker};
pub use tiebreak::{ScoreTiesAdjuster, Tiebreaker};
pub use truncate::TruncateHits;

use crate::config;
use crate::feature_vector::FeatureVector;
use crate::index::{IndexError, TermStatisticsProvider, TermVector};
use crate::query::{StructuralFilter, WeightedQuery};
use serde::{Deserialize, Serialize};

/// A document with its first-pass or reranked retrieval score.
///
/// Rank is implied by position in the list. Instances are immutable once
/// produced by a search call; rerankers build new lists rather than mutate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// Internal index document id.
    pub doc_id: u32,
    /// Collection (external) document id.
    pub external_id: String,
    /// Retrieval score; interpretation depends on the producing stage.
    pub score: f32,
}

/// How the search engine orders documents with equal scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TieBreakPolicy {
    /// Whatever order the engine produces; fastest, not reproducible.
    Arbitrary,
    /// Equal scores order by external id lexicographically ascending.
    ByExternalId,
}

/// Immutable per-call bundle handed to every reranker stage.
pub struct RerankContext<'a> {
    /// Primary index handle, shared read-only across concurrent calls.
    pub index: &'a dyn TermStatisticsProvider,
    /// Raw query text, used only for logging and last-resort fallback.
    pub query_text: String,
    /// Pre-analyzed query tokens; analysis happens outside this crate.
    pub query_tokens: Vec<String>,
    /// Searchable field all statistics and queries apply to.
    pub field: String,
    /// Hits cutoff for re-executed queries.
    pub hits: usize,
    /// Tie-break policy for re-executed queries.
    pub tie_break: TieBreakPolicy,
    /// Optional structural constraint ANDed with every feedback query.
    pub filter: Option<StructuralFilter>,
}

impl<'a> RerankContext<'a> {
    /// Builds a context with the common defaults: reproducible tie-breaking,
    /// no structural filter.
    pub fn new(
        index: &'a dyn TermStatisticsProvider,
        query_text: &str,
        query_tokens: Vec<String>,
        field: &str,
        hits: usize,
    ) -> Self {
        Self {
            index,
            query_text: query_text.to_string(),
            query_tokens,
            field: field.to_string(),
            hits,
            tie_break: TieBreakPolicy::ByExternalId,
            filter: None,
        }
    }
}

/// A reranking stage: feedback model or post-processor.
///
/// The contract is total: implementations never fail, they fall back to the
/// input ranking when anything goes wrong.
pub trait Reranker: Send + Sync {
    /// Transforms a ranked list into a (hopefully better) ranked list.
    fn rerank(&self, docs: Vec<ScoredDocument>, context: &RerankContext<'_>) -> Vec<ScoredDocument>;

    /// Short identifier with the stage's effective parameters, for run logs.
    fn tag(&self) -> String;
}

/// An ordered chain of reranking stages applied in sequence.
#[derive(Default)]
pub struct RerankerPipeline {
    stages: Vec<Box<dyn Reranker>>,
}

impl RerankerPipeline {
    /// Creates an empty pipeline; reranking with it returns the input as-is.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    pub fn add_stage(mut self, stage: Box<dyn Reranker>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True when no stage has been added.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Tags of all stages in application order.
    pub fn tags(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.tag()).collect()
    }

    /// Runs every stage in order.
    pub fn rerank(
        &self,
        mut docs: Vec<ScoredDocument>,
        context: &RerankContext<'_>,
    ) -> Vec<ScoredDocument> {
        for stage in &self.stages {
            docs = stage.rerank(docs, context);
        }
        docs
    }
}

/// Executes a feedback query, falling back to the input ranking on failure.
///
/// This is the single fail-open point shared by all estimators: a malformed
/// or unexecutable expanded query must never make results unavailable.
pub(crate) fn execute_or_fallback(
    query: &WeightedQuery,
    fallback: Vec<ScoredDocument>,
    context: &RerankContext<'_>,
) -> Vec<ScoredDocument> {
    match context.index.search(query, context.hits, context.tie_break) {
        Ok(results) => results,
        Err(e) => {
            tracing::warn!("feedback query failed, keeping first-pass ranking: {e}");
            fallback
        }
    }
}

/// True for terms eligible as feedback: length bounds and `[a-z0-9]+`.
pub(crate) fn is_clean_term(term: &str) -> bool {
    term.len() >= config::MIN_FEEDBACK_TERM_LEN
        && term.len() <= config::MAX_FEEDBACK_TERM_LEN
        && term
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Builds a feedback document vector from a stored term vector.
///
/// Applies the shared term hygiene: length bounds, `[a-z0-9]+`, and the
/// document-frequency-ratio stoplist (terms in more than `MAX_DF_RATIO` of
/// the collection are treated as stopwords). Weights are raw term
/// frequencies; normalization is the caller's business.
pub(crate) fn feedback_doc_vector(
    terms: &TermVector,
    index: &dyn TermStatisticsProvider,
    field: &str,
) -> Result<FeatureVector, IndexError> {
    let num_docs = index.num_docs(field);
    let mut fv = FeatureVector::new();

    for (term, entry) in terms.iter() {
        if !is_clean_term(term) {
            continue;
        }
        let df = index.doc_freq(field, term)?;
        if num_docs > 0 && df as f32 / num_docs as f32 > config::MAX_DF_RATIO {
            continue;
        }
        fv.add_weight(term, entry.freq as f32);
    }

    Ok(fv)
}
