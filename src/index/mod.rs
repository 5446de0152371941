//! Index access abstraction consumed by all feedback models.
//!
//! The inverted index and query execution engine live outside this crate;
//! rerankers see them only through [`TermStatisticsProvider`]. The
//! [`memory::MemoryIndex`] reference implementation backs the crate's own
//! tests and doubles as the executable definition of the contract.

/// In-memory reference index with BM25 scoring.
pub mod memory;

pub use memory::MemoryIndex;

use crate::query::WeightedQuery;
use crate::rerank::{ScoredDocument, TieBreakPolicy};
use std::collections::BTreeMap;
use std::fmt;

/// Per-term entry of a stored document vector.
#[derive(Debug, Clone, Default)]
pub struct TermVectorEntry {
    /// Occurrences of the term in the document.
    pub freq: u32,
    /// Token positions of each occurrence, ascending.
    pub positions: Vec<u32>,
}

/// Stored document vector: term → (frequency, positions).
///
/// Terms iterate in lexicographic order, mirroring a sorted terms
/// enumeration, so downstream feature vectors get a reproducible
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct TermVector {
    /// Sorted term entries.
    pub entries: BTreeMap<String, TermVectorEntry>,
}

impl TermVector {
    /// True when the document stored no terms for the field.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates terms in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TermVectorEntry)> + '_ {
        self.entries.iter().map(|(t, e)| (t.as_str(), e))
    }
}

/// Why an index read failed.
#[derive(Debug)]
pub enum IndexError {
    /// No document with this internal id.
    DocNotFound(u32),
    /// The field is not indexed.
    UnknownField(String),
    /// Underlying storage failure (corrupt or unavailable segment).
    Io(String),
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::DocNotFound(id) => write!(f, "document {id} not found"),
            IndexError::UnknownField(field) => write!(f, "unknown field '{field}'"),
            IndexError::Io(msg) => write!(f, "index I/O failure: {msg}"),
        }
    }
}

impl std::error::Error for IndexError {}

/// Read-only term-level statistics and search execution over a built index.
///
/// All calls may block on disk I/O; no caching is guaranteed beyond what the
/// caller provides. Implementations must support concurrent reads from
/// multiple reranker invocations without locking.
pub trait TermStatisticsProvider: Send + Sync {
    /// Number of documents containing `term` in `field`.
    fn doc_freq(&self, field: &str, term: &str) -> Result<u64, IndexError>;

    /// Total occurrences of `term` across the collection in `field`.
    fn collection_freq(&self, field: &str, term: &str) -> Result<u64, IndexError>;

    /// Stored document vector of `doc_id` for `field`.
    fn term_vector(&self, doc_id: u32, field: &str) -> Result<TermVector, IndexError>;

    /// Number of documents carrying `field`.
    fn num_docs(&self, field: &str) -> u64;

    /// Total token count of `field` across the collection.
    fn total_term_freq(&self, field: &str) -> u64;

    /// All internal document ids carrying `field`, ascending.
    ///
    /// Feeds the axiomatic sampling pool and its deterministic docid cache.
    fn doc_ids(&self, field: &str) -> Result<Vec<u32>, IndexError>;

    /// External (collection) id of an internal document id.
    fn external_id(&self, doc_id: u32) -> Result<String, IndexError>;

    /// Executes a weighted query, returning the top `k` scored documents.
    fn search(
        &self,
        query: &WeightedQuery,
        k: usize,
        policy: TieBreakPolicy,
    ) -> Result<Vec<ScoredDocument>, IndexError>;
}
