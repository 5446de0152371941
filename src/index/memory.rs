//! In-memory reference index implementing [`TermStatisticsProvider`].
//!
//! Holds postings, stored document vectors, and document lengths for a single
//! field, scoring queries with Okapi BM25. Immutable after construction, so
//! concurrent rerank calls can share it freely. This is the test/demo
//! provider; production deployments wrap a real index behind the same trait.

use crate::config;
use crate::index::{IndexError, TermStatisticsProvider, TermVector, TermVectorEntry};
use crate::query::WeightedQuery;
use crate::rerank::{ScoredDocument, TieBreakPolicy};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// A single entry in a term's postings list.
#[derive(Debug, Clone)]
struct Posting {
    doc_id: u32,
    term_frequency: u32,
}

/// Single-field in-memory inverted index with stored document vectors.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    field: String,
    postings: HashMap<String, Vec<Posting>>,
    doc_vectors: Vec<TermVector>,
    external_ids: Vec<String>,
    doc_lengths: Vec<u32>,
    total_term_freq: u64,
}

impl MemoryIndex {
    /// Creates an empty index over `field`.
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ..Self::default()
        }
    }

    /// Indexes a document, assigning the next internal id.
    ///
    /// Tokenization is deliberately trivial (lowercase, split on
    /// non-alphanumeric): analysis belongs to the real index, and feedback
    /// models only consume what this tokenizer produces.
    pub fn add_document(&mut self, external_id: &str, text: &str) -> u32 {
        let doc_id = self.doc_vectors.len() as u32;
        let tokens = tokenize(text);

        let mut vector = TermVector::default();
        for (pos, token) in tokens.iter().enumerate() {
            let entry = vector
                .entries
                .entry(token.clone())
                .or_insert_with(TermVectorEntry::default);
            entry.freq += 1;
            entry.positions.push(pos as u32);
        }

        for (term, entry) in &vector.entries {
            self.postings
                .entry(term.clone())
                .or_default()
                .push(Posting {
                    doc_id,
                    term_frequency: entry.freq,
                });
        }

        self.doc_lengths.push(tokens.len() as u32);
        self.total_term_freq += tokens.len() as u64;
        self.doc_vectors.push(vector);
        self.external_ids.push(external_id.to_string());
        doc_id
    }

    /// Average document length, for BM25 length normalization.
    fn average_doc_length(&self) -> f32 {
        if self.doc_vectors.is_empty() {
            return 0.0;
        }
        self.total_term_freq as f32 / self.doc_vectors.len() as f32
    }

    fn check_field(&self, field: &str) -> Result<(), IndexError> {
        if field == self.field {
            Ok(())
        } else {
            Err(IndexError::UnknownField(field.to_string()))
        }
    }

    /// True when the document contains every term of the filter.
    fn matches_filter(&self, doc_id: u32, query: &WeightedQuery) -> bool {
        match &query.filter {
            None => true,
            Some(filter) => {
                let vector = &self.doc_vectors[doc_id as usize];
                filter
                    .required_terms
                    .iter()
                    .all(|t| vector.entries.contains_key(t))
            }
        }
    }
}

impl TermStatisticsProvider for MemoryIndex {
    fn doc_freq(&self, field: &str, term: &str) -> Result<u64, IndexError> {
        self.check_field(field)?;
        Ok(self.postings.get(term).map_or(0, |p| p.len() as u64))
    }

    fn collection_freq(&self, field: &str, term: &str) -> Result<u64, IndexError> {
        self.check_field(field)?;
        Ok(self
            .postings
            .get(term)
            .map_or(0, |p| p.iter().map(|e| e.term_frequency as u64).sum()))
    }

    fn term_vector(&self, doc_id: u32, field: &str) -> Result<TermVector, IndexError> {
        self.check_field(field)?;
        self.doc_vectors
            .get(doc_id as usize)
            .cloned()
            .ok_or(IndexError::DocNotFound(doc_id))
    }

    fn num_docs(&self, field: &str) -> u64 {
        if field == self.field {
            self.doc_vectors.len() as u64
        } else {
            0
        }
    }

    fn total_term_freq(&self, field: &str) -> u64 {
        if field == self.field {
            self.total_term_freq
        } else {
            0
        }
    }

    fn doc_ids(&self, field: &str) -> Result<Vec<u32>, IndexError> {
        self.check_field(field)?;
        Ok((0..self.doc_vectors.len() as u32).collect())
    }

    fn external_id(&self, doc_id: u32) -> Result<String, IndexError> {
        self.external_ids
            .get(doc_id as usize)
            .cloned()
            .ok_or(IndexError::DocNotFound(doc_id))
    }

    fn search(
        &self,
        query: &WeightedQuery,
        k: usize,
        policy: TieBreakPolicy,
    ) -> Result<Vec<ScoredDocument>, IndexError> {
        self.check_field(&query.field)?;
        if query.is_empty() || self.doc_vectors.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let n = self.doc_vectors.len() as f32;
        let avgdl = self.average_doc_length();
        let (k1, b, flat_idf) = match query.similarity {
            Some(p) => (p.k1, p.b, p.flat_idf),
            None => (config::BM25_K1, config::BM25_B, false),
        };

        let mut scores: HashMap<u32, f32> = HashMap::new();
        for clause in &query.clauses {
            let Some(postings) = self.postings.get(&clause.term) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf = if flat_idf {
                1.0
            } else {
                ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
            };

            for posting in postings {
                if !self.matches_filter(posting.doc_id, query) {
                    continue;
                }
                let dl = self.doc_lengths[posting.doc_id as usize] as f32;
                let tf = posting.term_frequency as f32;
                let tf_norm = (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / avgdl));
                *scores.entry(posting.doc_id).or_insert(0.0) += clause.boost * idf * tf_norm;
            }
        }

        let results = match policy {
            TieBreakPolicy::Arbitrary => {
                // Partial sort: O(n log k) via min-heap of size k
                let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, u32)>> =
                    BinaryHeap::with_capacity(k + 1);
                for (id, score) in scores {
                    heap.push(Reverse((OrderedFloat(score), id)));
                    if heap.len() > k {
                        heap.pop();
                    }
                }
                let mut out: Vec<(u32, f32)> =
                    heap.into_iter().map(|Reverse((s, id))| (id, s.0)).collect();
                out.sort_unstable_by(|a, b| {
                    b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
                });
                out
            }
            TieBreakPolicy::ByExternalId => {
                let mut out: Vec<(u32, f32)> = scores.into_iter().collect();
                out.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| {
                            self.external_ids[a.0 as usize].cmp(&self.external_ids[b.0 as usize])
                        })
                });
                out.truncate(k);
                out
            }
        };

        Ok(results
            .into_iter()
            .map(|(doc_id, score)| ScoredDocument {
                doc_id,
                external_id: self.external_ids[doc_id as usize].clone(),
                score,
            })
            .collect())
    }
}

/// Lowercases and splits on non-alphanumeric characters.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Bm25Params, StructuralFilter};

    fn build_corpus() -> MemoryIndex {
        let mut idx = MemoryIndex::new("contents");
        idx.add_document("doc1", "rust programming systems language fast");
        idx.add_document("doc2", "python programming scripting easy");
        idx.add_document("doc3", "java enterprise programming verbose");
        idx.add_document("doc4", "rust memory safety zero cost abstractions");
        idx
    }

    #[test]
    fn test_search_finds_matching_docs() {
        let idx = build_corpus();
        let q = WeightedQuery::from_terms("contents", ["rust"]);
        let results = idx.search(&q, 10, TieBreakPolicy::Arbitrary).unwrap();
        let ids: Vec<&str> = results.iter().map(|d| d.external_id.as_str()).collect();
        assert!(ids.contains(&"doc1"));
        assert!(ids.contains(&"doc4"));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_search_ranking_order() {
        let mut idx = MemoryIndex::new("contents");
        idx.add_document("a", "rust rust rust");
        idx.add_document("b", "rust programming");
        let q = WeightedQuery::from_terms("contents", ["rust"]);
        let results = idx.search(&q, 10, TieBreakPolicy::Arbitrary).unwrap();
        assert_eq!(results[0].external_id, "a", "higher TF ranks first");
    }

    #[test]
    fn test_boost_scales_scores() {
        let idx = build_corpus();
        let unit = WeightedQuery::from_terms("contents", ["rust"]);
        let mut boosted = unit.clone();
        boosted.clauses[0].boost = 2.0;
        let r1 = idx.search(&unit, 10, TieBreakPolicy::Arbitrary).unwrap();
        let r2 = idx.search(&boosted, 10, TieBreakPolicy::Arbitrary).unwrap();
        assert!((r2[0].score - 2.0 * r1[0].score).abs() < 1e-5);
    }

    #[test]
    fn test_tie_break_by_external_id() {
        let mut idx = MemoryIndex::new("contents");
        idx.add_document("zebra", "same words here");
        idx.add_document("apple", "same words here");
        let q = WeightedQuery::from_terms("contents", ["same"]);
        let results = idx.search(&q, 10, TieBreakPolicy::ByExternalId).unwrap();
        assert_eq!(results[0].external_id, "apple");
        assert_eq!(results[1].external_id, "zebra");
    }

    #[test]
    fn test_flat_idf_changes_scores() {
        let idx = build_corpus();
        let q = WeightedQuery::from_terms("contents", ["rust"]);
        let flat = q.clone().with_similarity(Bm25Params {
            k1: config::BM25_K1,
            b: config::BM25_B,
            flat_idf: true,
        });
        let normal = idx.search(&q, 10, TieBreakPolicy::ByExternalId).unwrap();
        let flattened = idx.search(&flat, 10, TieBreakPolicy::ByExternalId).unwrap();
        assert!((normal[0].score - flattened[0].score).abs() > 1e-6);
    }

    #[test]
    fn test_structural_filter_excludes_documents() {
        let idx = build_corpus();
        let q = WeightedQuery::from_terms("contents", ["programming"]).with_filter(Some(
            StructuralFilter {
                required_terms: vec!["python".to_string()],
            },
        ));
        let results = idx.search(&q, 10, TieBreakPolicy::Arbitrary).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].external_id, "doc2");
    }

    #[test]
    fn test_term_vector_has_freqs_and_positions() {
        let mut idx = MemoryIndex::new("contents");
        let id = idx.add_document("a", "dog bark dog");
        let tv = idx.term_vector(id, "contents").unwrap();
        assert_eq!(tv.entries["dog"].freq, 2);
        assert_eq!(tv.entries["dog"].positions, vec![0, 2]);
        assert_eq!(tv.entries["bark"].freq, 1);
    }

    #[test]
    fn test_statistics() {
        let idx = build_corpus();
        assert_eq!(idx.num_docs("contents"), 4);
        assert_eq!(idx.doc_freq("contents", "programming").unwrap(), 3);
        assert_eq!(idx.doc_freq("contents", "absent").unwrap(), 0);
        assert_eq!(idx.doc_ids("contents").unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        let idx = build_corpus();
        assert!(idx.doc_freq("title", "rust").is_err());
        assert!(idx.term_vector(0, "title").is_err());
    }

    #[test]
    fn test_missing_document_is_an_error() {
        let idx = build_corpus();
        assert!(matches!(
            idx.term_vector(99, "contents"),
            Err(IndexError::DocNotFound(99))
        ));
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let idx = build_corpus();
        let q = WeightedQuery::from_terms("contents", Vec::<String>::new());
        assert!(idx
            .search(&q, 10, TieBreakPolicy::Arbitrary)
            .unwrap()
            .is_empty());
    }
}
