//! Axiomatic semantic feedback.
//!
//! Expansion terms are selected by mutual information of document
//! co-occurrence over a reranking pool: the top of the first-pass ranking
//! plus documents sampled uniformly from the collection. A separate feedback
//! corpus can be injected as a second statistics provider; the expanded
//! query always executes against the primary index.

use crate::config;
use crate::index::TermStatisticsProvider;
use crate::query::WeightedQuery;
use crate::rerank::{execute_or_fallback, RerankContext, Reranker, ScoredDocument};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

/// Axiomatic feedback parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AxiomConfig {
    /// Top first-pass documents seeding the pool (`M`).
    pub fb_docs: usize,
    /// Pool multiplier (`R`): the pool holds `R·M` distinct documents.
    pub multiplier: usize,
    /// Scaling factor applied to cross-term MI scores (`β`).
    pub beta: f32,
    /// Candidates kept per query term before aggregation (`L`).
    pub per_term_candidates: usize,
    /// Final expansion term budget (`K`).
    pub fb_terms: usize,
    /// Sample the pool with a seeded RNG for reproducible runs.
    pub deterministic: bool,
    /// Seed used when `deterministic` is set.
    pub seed: u64,
}

impl Default for AxiomConfig {
    fn default() -> Self {
        Self {
            fb_docs: config::AXIOM_DEFAULT_FB_DOCS,
            multiplier: config::AXIOM_DEFAULT_MULTIPLIER,
            beta: config::AXIOM_DEFAULT_BETA,
            per_term_candidates: config::AXIOM_DEFAULT_PER_TERM_CANDIDATES,
            fb_terms: config::AXIOM_DEFAULT_FB_TERMS,
            deterministic: false,
            seed: config::AXIOM_DEFAULT_SEED,
        }
    }
}

/// Axiomatic reranker stage.
///
/// The deterministic docid cache is the only cross-call state: built once
/// from the feedback provider on first use, then shared read-only. All other
/// state (pool, inverted map, score accumulators) is call-local.
pub struct AxiomaticReranker {
    config: AxiomConfig,
    external: Option<Arc<dyn TermStatisticsProvider>>,
    docid_cache: OnceLock<Vec<u32>>,
}

impl AxiomaticReranker {
    /// Creates an axiomatic stage over the context's primary index.
    pub fn new(config: AxiomConfig) -> Self {
        Self {
            config,
            external: None,
            docid_cache: OnceLock::new(),
        }
    }

    /// Creates an axiomatic stage drawing feedback vocabulary from a
    /// separate corpus with the same field schema.
    pub fn with_external_index(
        config: AxiomConfig,
        external: Arc<dyn TermStatisticsProvider>,
    ) -> Self {
        Self {
            config,
            external: Some(external),
            docid_cache: OnceLock::new(),
        }
    }

    fn feedback_provider<'c>(&'c self, context: &RerankContext<'c>) -> &'c dyn TermStatisticsProvider {
        match &self.external {
            Some(ext) => ext.as_ref(),
            None => context.index,
        }
    }

    /// Selects the `R·M` document pool: first-pass seeds plus uniformly
    /// random distinct documents from the collection.
    fn select_pool(
        &self,
        seeds: &[ScoredDocument],
        provider: &dyn TermStatisticsProvider,
        context: &RerankContext<'_>,
    ) -> HashSet<u32> {
        let mut pool: HashSet<u32> = seeds
            .iter()
            .take(self.config.fb_docs)
            .map(|d| d.doc_id)
            .collect();
        let target = self.config.multiplier * self.config.fb_docs;
        if pool.len() >= target {
            return pool;
        }

        let sampled_ids: Vec<u32>;
        let ids: &[u32] = if self.config.deterministic {
            self.docid_cache
                .get_or_init(|| match provider.doc_ids(&context.field) {
                    Ok(ids) => ids,
                    Err(e) => {
                        tracing::warn!("docid cache unavailable: {e}");
                        Vec::new()
                    }
                })
        } else {
            match provider.doc_ids(&context.field) {
                Ok(ids) => {
                    sampled_ids = ids;
                    &sampled_ids
                }
                Err(e) => {
                    tracing::warn!("cannot sample pool documents: {e}");
                    return pool;
                }
            }
        };
        if ids.is_empty() {
            return pool;
        }

        // The collection may hold fewer distinct docs than R·M.
        let target = target.min(ids.len());
        let mut rng = if self.config.deterministic {
            StdRng::seed_from_u64(self.config.seed)
        } else {
            StdRng::from_entropy()
        };
        while pool.len() < target {
            pool.insert(ids[rng.gen_range(0..ids.len())]);
        }
        pool
    }

    /// Extracts a pool-restricted inverted map: term → containing doc ids.
    ///
    /// Only alphabetic terms of length ≥ 2 enter the candidate vocabulary.
    fn extract_terms(
        &self,
        pool: &HashSet<u32>,
        provider: &dyn TermStatisticsProvider,
        context: &RerankContext<'_>,
    ) -> HashMap<String, HashSet<u32>> {
        let mut inverted: HashMap<String, HashSet<u32>> = HashMap::new();
        for &doc_id in pool {
            let terms = match provider.term_vector(doc_id, &context.field) {
                Ok(tv) => tv,
                Err(e) => {
                    tracing::warn!("skipping pool doc {doc_id}: {e}");
                    continue;
                }
            };
            for (term, _) in terms.iter() {
                if term.len() < config::MIN_FEEDBACK_TERM_LEN
                    || !term.chars().all(|c| c.is_ascii_lowercase())
                {
                    continue;
                }
                inverted.entry(term.to_string()).or_default().insert(doc_id);
            }
        }
        inverted
    }

    /// Scores every candidate against every query term and aggregates.
    ///
    /// Per query term `x`, candidate `y` scores `β·qtf(x)·MI(x,y)/MI(x,x)`
    /// (the query term itself scores `qtf(x)`); the top `L` candidates per
    /// query term are summed across query terms, divided by query length,
    /// and the global top `K` survive.
    fn compute_term_scores(
        &self,
        inverted: &HashMap<String, HashSet<u32>>,
        context: &RerankContext<'_>,
    ) -> Vec<(String, f64)> {
        if context.query_tokens.is_empty() {
            return Vec::new();
        }

        // Query term counts in first-appearance order.
        let mut counts: Vec<(String, usize)> = Vec::new();
        for token in &context.query_tokens {
            match counts.iter_mut().find(|(t, _)| t == token) {
                Some((_, c)) => *c += 1,
                None => counts.push((token.clone(), 1)),
            }
        }

        let pool_doc_count = inverted
            .values()
            .flatten()
            .collect::<HashSet<_>>()
            .len();

        let mut aggregated: HashMap<String, f64> = HashMap::new();
        for (query_term, qtf) in &counts {
            let Some(x) = inverted.get(query_term) else {
                continue;
            };
            let self_mi = mutual_information(x, x, pool_doc_count);

            let mut candidates: Vec<(String, f64)> = inverted
                .iter()
                .map(|(term, y)| {
                    let score = if term == query_term {
                        *qtf as f64
                    } else if self_mi > 0.0 {
                        self.config.beta as f64 * *qtf as f64
                            * mutual_information(x, y, pool_doc_count)
                            / self_mi
                    } else {
                        0.0
                    };
                    (term.clone(), score)
                })
                .collect();
            candidates.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            candidates.truncate(self.config.per_term_candidates);

            for (term, score) in candidates {
                if score > config::AXIOM_MIN_SCORE {
                    *aggregated.entry(term).or_insert(0.0) += score;
                }
            }
        }

        let query_len = context.query_tokens.len() as f64;
        let mut scores: Vec<(String, f64)> = aggregated
            .into_iter()
            .map(|(term, s)| (term, s / query_len))
            .collect();
        scores.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scores.truncate(self.config.fb_terms);
        scores
    }
}

impl Reranker for AxiomaticReranker {
    fn rerank(&self, docs: Vec<ScoredDocument>, context: &RerankContext<'_>) -> Vec<ScoredDocument> {
        let provider = self.feedback_provider(context);

        // With an external corpus the first pass is re-run against it so the
        // pool seeds come from the same collection as the statistics.
        let seeds: Vec<ScoredDocument> = if self.external.is_some() {
            let q = WeightedQuery::from_terms(&context.field, &context.query_tokens);
            match provider.search(&q, self.config.fb_docs, context.tie_break) {
                Ok(results) => results,
                Err(e) => {
                    tracing::warn!("external first pass failed: {e}");
                    return docs;
                }
            }
        } else {
            docs.iter().take(self.config.fb_docs).cloned().collect()
        };

        let pool = self.select_pool(&seeds, provider, context);
        let inverted = self.extract_terms(&pool, provider, context);
        let term_scores = self.compute_term_scores(&inverted, context);

        let query = if term_scores.is_empty() {
            tracing::debug!("{}: empty expansion, using original query", self.tag());
            WeightedQuery::from_terms(&context.field, &context.query_tokens)
        } else {
            let mut fv = crate::feature_vector::FeatureVector::new();
            for (term, score) in &term_scores {
                fv.add_weight(term, *score as f32);
            }
            WeightedQuery::from_feature_vector(&context.field, &fv)
        }
        .with_filter(context.filter.clone());
        if query.is_empty() {
            return docs;
        }

        tracing::debug!("{} expanded to {} terms", self.tag(), query.clauses.len());
        execute_or_fallback(&query, docs, context)
    }

    fn tag(&self) -> String {
        format!(
            "Axiom(fbDocs={},multiplier={},beta={},fbTerms={})",
            self.config.fb_docs, self.config.multiplier, self.config.beta, self.config.fb_terms
        )
    }
}

/// Mutual information of two terms' document co-occurrence over the pool.
///
/// Computed over the 2×2 contingency table of presence/absence; any cell
/// with zero probability contributes zero. Degenerate marginals (a term in
/// all or none of the pool documents) yield zero outright.
fn mutual_information(x: &HashSet<u32>, y: &HashSet<u32>, pool_size: usize) -> f64 {
    let n = pool_size as f64;
    let x1 = x.len();
    let y1 = y.len();
    let x0 = pool_size.saturating_sub(x1);
    let y0 = pool_size.saturating_sub(y1);
    if x1 == 0 || x0 == 0 || y1 == 0 || y0 == 0 {
        return 0.0;
    }

    let both = x.intersection(y).count();
    let x_only = x1 - both;
    let y_only = y1 - both;
    let neither = pool_size - both - x_only - y_only;

    let p_x0 = x0 as f64 / n;
    let p_x1 = x1 as f64 / n;
    let p_y0 = y0 as f64 / n;
    let p_y1 = y1 as f64 / n;

    let mut mi = 0.0;
    let p = neither as f64 / n;
    if p > 0.0 {
        mi += p * (p / (p_x0 * p_y0)).ln();
    }
    let p = y_only as f64 / n;
    if p > 0.0 {
        mi += p * (p / (p_x0 * p_y1)).ln();
    }
    let p = x_only as f64 / n;
    if p > 0.0 {
        mi += p * (p / (p_x1 * p_y0)).ln();
    }
    let p = both as f64 / n;
    if p > 0.0 {
        mi += p * (p / (p_x1 * p_y1)).ln();
    }
    mi
}
