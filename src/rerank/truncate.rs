//! Rank-list truncation.

use crate::rerank::{RerankContext, Reranker, ScoredDocument};

/// Cuts the ranked list to its top `k` entries, preserving order.
///
/// Typically the last pipeline stage, after feedback models have re-executed
/// with a deeper hits cutoff than the caller asked for.
#[derive(Debug, Clone, Copy)]
pub struct TruncateHits {
    /// Number of documents kept.
    pub k: usize,
}

impl TruncateHits {
    /// Creates a truncation stage keeping `k` documents.
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl Reranker for TruncateHits {
    fn rerank(
        &self,
        mut docs: Vec<ScoredDocument>,
        _context: &RerankContext<'_>,
    ) -> Vec<ScoredDocument> {
        docs.truncate(self.k);
        docs
    }

    fn tag(&self) -> String {
        format!("TruncateHits(k={})", self.k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;

    #[test]
    fn test_truncates_to_k_in_order() {
        let idx = MemoryIndex::new("contents");
        let ctx = RerankContext::new(&idx, "q", vec!["q".to_string()], "contents", 10);
        let docs: Vec<ScoredDocument> = (0..8)
            .map(|i| ScoredDocument {
                doc_id: i,
                external_id: format!("doc{i}"),
                score: 8.0 - i as f32,
            })
            .collect();
        let out = TruncateHits::new(5).rerank(docs, &ctx);
        assert_eq!(out.len(), 5);
        for (i, d) in out.iter().enumerate() {
            assert_eq!(d.doc_id, i as u32);
        }
    }

    #[test]
    fn test_short_list_unchanged() {
        let idx = MemoryIndex::new("contents");
        let ctx = RerankContext::new(&idx, "q", vec!["q".to_string()], "contents", 10);
        let docs = vec![ScoredDocument {
            doc_id: 0,
            external_id: "only".to_string(),
            score: 1.0,
        }];
        let out = TruncateHits::new(5).rerank(docs, &ctx);
        assert_eq!(out.len(), 1);
    }
}
