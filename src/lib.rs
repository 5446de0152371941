//! # prf-rerank
//!
//! Pseudo-relevance-feedback (PRF) reranking over an inverted index:
//! take a first-pass ranked list, mine term statistics from the documents
//! assumed relevant, synthesize an expanded weighted query, and re-execute
//! search for an improved ranking.
//!
//! ## Features
//!
//! - **RM3** relevance-model estimation interpolated with the original query
//! - **Rocchio** centroid feedback with optional negative centroid and true
//!   relevance-feedback mode
//! - **Axiomatic feedback** via mutual information over a sampled document
//!   pool, with optional external feedback corpus and seeded determinism
//! - **BM25PRF** Robertson/Sparck-Jones offer-weight feedback with a
//!   flat-IDF rescoring pass
//! - **Deterministic tie-breaking** (score rounding + perturbation) and
//!   rank-list truncation post-processors
//!
//! ## Architecture
//!
//! ```text
//! first-pass hits → RerankerPipeline [ RM3 | Rocchio | Axiom | BM25PRF ]
//!                                    → ScoreTiesAdjuster / Tiebreaker
//!                                    → TruncateHits
//! Index access: TermStatisticsProvider trait (df, cf, term vectors, search)
//! ```
//!
//! The index itself is an external collaborator behind the
//! [`index::TermStatisticsProvider`] trait; [`index::MemoryIndex`] is a
//! compact in-memory reference implementation used for tests and demos.

/// Named defaults and numeric guard constants for all feedback models.
pub mod config;
/// Sparse term→weight vectors: pruning, normalization, interpolation.
pub mod feature_vector;
/// Index access abstraction: term statistics provider trait, term vectors, and the in-memory reference index.
pub mod index;
/// Weighted Boolean-OR queries, structural filters, and similarity overrides.
pub mod query;
/// Reranker trait, pipeline, scored documents, and the feedback model implementations.
pub mod rerank;
