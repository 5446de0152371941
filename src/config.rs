//! Global configuration constants for prf-rerank.
//!
//! Default feedback parameters and numeric guard values are defined here.
//! Per-call configuration is carried by the config structs in [`crate::rerank`];
//! their `Default` impls read from these constants.

/// Default number of expansion terms kept by RM3.
pub const RM3_DEFAULT_FB_TERMS: usize = 10;

/// Default number of feedback documents consumed by RM3.
pub const RM3_DEFAULT_FB_DOCS: usize = 10;

/// Default interpolation weight of the original query in RM3.
///
/// `final(t) = λ·q(t) + (1−λ)·rm(t)`; 0.5 gives the query and the relevance
/// model equal say.
pub const RM3_DEFAULT_ORIGINAL_QUERY_WEIGHT: f32 = 0.5;

/// Default number of expansion terms kept per Rocchio centroid.
pub const ROCCHIO_DEFAULT_FB_TERMS: usize = 128;

/// Default number of feedback documents per Rocchio centroid.
pub const ROCCHIO_DEFAULT_FB_DOCS: usize = 10;

/// Default Rocchio weight of the original query vector.
pub const ROCCHIO_DEFAULT_ALPHA: f32 = 1.0;

/// Default Rocchio weight of the positive (relevant) centroid.
pub const ROCCHIO_DEFAULT_BETA: f32 = 0.75;

/// Default Rocchio weight of the negative (non-relevant) centroid.
///
/// Zero by default: negative feedback rarely helps without judgments.
pub const ROCCHIO_DEFAULT_GAMMA: f32 = 0.0;

/// Default number of top first-pass documents seeding the axiomatic pool.
pub const AXIOM_DEFAULT_FB_DOCS: usize = 20;

/// Default axiomatic pool multiplier: the pool holds `multiplier · fb_docs`
/// distinct documents, the remainder drawn at random from the collection.
pub const AXIOM_DEFAULT_MULTIPLIER: usize = 30;

/// Default axiomatic scaling factor applied to cross-term MI scores.
pub const AXIOM_DEFAULT_BETA: f32 = 0.4;

/// Default number of candidates kept per query term before aggregation.
pub const AXIOM_DEFAULT_PER_TERM_CANDIDATES: usize = 1000;

/// Default number of expansion terms in the final axiomatic query.
pub const AXIOM_DEFAULT_FB_TERMS: usize = 20;

/// Default RNG seed for deterministic axiomatic pool sampling.
pub const AXIOM_DEFAULT_SEED: u64 = 42;

/// Aggregated axiomatic term scores at or below this threshold are discarded.
pub const AXIOM_MIN_SCORE: f64 = 1e-8;

/// Default number of expansion terms kept by BM25PRF.
pub const BM25_PRF_DEFAULT_FB_TERMS: usize = 20;

/// Default number of feedback documents consumed by BM25PRF.
pub const BM25_PRF_DEFAULT_FB_DOCS: usize = 10;

/// Default BM25 `k1` for the PRF rescoring pass.
pub const BM25_PRF_DEFAULT_K1: f32 = 0.9;

/// Default BM25 `b` for the PRF rescoring pass.
pub const BM25_PRF_DEFAULT_B: f32 = 0.4;

/// Default weight applied to newly introduced BM25PRF expansion terms.
pub const BM25_PRF_DEFAULT_NEW_TERM_WEIGHT: f32 = 0.2;

/// Floor for Robertson/Sparck-Jones relevance weights and `ln(df_rel)`
/// arguments. Keeps degenerate contingency tables from producing −∞.
pub const MIN_REL_WEIGHT: f64 = 1e-6;

/// Minimum length of a term eligible for feedback.
pub const MIN_FEEDBACK_TERM_LEN: usize = 2;

/// Maximum length of a term eligible for feedback.
pub const MAX_FEEDBACK_TERM_LEN: usize = 20;

/// Document-frequency-ratio stoplist threshold: a term appearing in more
/// than this fraction of the collection is discarded as a stopword.
pub const MAX_DF_RATIO: f32 = 0.1;

/// Feedback documents with a vector norm at or below this value are skipped
/// to avoid division by zero in per-document normalization.
pub const MIN_DOC_NORM: f32 = 1e-3;

/// Scores are rounded to this resolution before tie detection.
pub const SCORE_ROUNDING: f32 = 1e-4;

/// Perturbation subtracted per duplicate to break score ties.
pub const TIE_PERTURBATION: f32 = 1e-6;

/// BM25 Okapi term frequency saturation parameter of the reference index.
pub const BM25_K1: f32 = 1.2;

/// BM25 Okapi document length normalization parameter of the reference index.
pub const BM25_B: f32 = 0.75;
