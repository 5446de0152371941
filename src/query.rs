//! Weighted Boolean-OR queries produced by query rewriting.
//!
//! Every feedback estimator converts its expanded term-weight vector into a
//! [`WeightedQuery`]: a disjunction of boosted term clauses over one field,
//! optionally constrained by a [`StructuralFilter`] and executed under a
//! [`Bm25Params`] similarity override.

use crate::feature_vector::FeatureVector;
use serde::{Deserialize, Serialize};

/// A single boosted term clause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermBoost {
    /// The query term.
    pub term: String,
    /// Multiplicative boost applied to the term's score contribution.
    pub boost: f32,
}

/// Conjunctive structural constraint ANDed with the feedback disjunction.
///
/// A document matches only when it contains every required term. This models
/// date/collection constraints that must survive query expansion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuralFilter {
    /// Terms the document must contain, all of them.
    pub required_terms: Vec<String>,
}

/// BM25 similarity override for query re-execution.
///
/// `flat_idf` forces IDF to 1, used by BM25PRF where the relevance weight
/// already encodes term discriminativeness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f32,
    /// Document length normalization.
    pub b: f32,
    /// Force IDF to 1 during scoring.
    pub flat_idf: bool,
}

/// Weighted Boolean-OR query over a single searchable field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedQuery {
    /// Field the clauses apply to.
    pub field: String,
    /// OR clauses; a document matching any clause is a candidate.
    pub clauses: Vec<TermBoost>,
    /// Optional conjunctive constraint ANDed with the disjunction.
    pub filter: Option<StructuralFilter>,
    /// Optional similarity override; `None` uses the index default.
    pub similarity: Option<Bm25Params>,
}

impl WeightedQuery {
    /// Builds a query from a feature vector, one clause per term.
    ///
    /// Non-finite and non-positive weights are dropped here so no estimator
    /// can feed a degenerate boost into the search engine.
    pub fn from_feature_vector(field: &str, fv: &FeatureVector) -> Self {
        let clauses = fv
            .iter()
            .filter(|(_, w)| w.is_finite() && *w > 0.0)
            .map(|(term, w)| TermBoost {
                term: term.to_string(),
                boost: w,
            })
            .collect();
        Self {
            field: field.to_string(),
            clauses,
            filter: None,
            similarity: None,
        }
    }

    /// Builds a unit-boost query from raw tokens, the original-query fallback.
    pub fn from_terms<I, S>(field: &str, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let clauses = terms
            .into_iter()
            .map(|t| TermBoost {
                term: t.as_ref().to_string(),
                boost: 1.0,
            })
            .collect();
        Self {
            field: field.to_string(),
            clauses,
            filter: None,
            similarity: None,
        }
    }

    /// Attaches a structural filter.
    pub fn with_filter(mut self, filter: Option<StructuralFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Attaches a similarity override.
    pub fn with_similarity(mut self, similarity: Bm25Params) -> Self {
        self.similarity = Some(similarity);
        self
    }

    /// True when no clause survived construction.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}
