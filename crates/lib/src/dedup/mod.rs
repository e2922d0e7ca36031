//! # Deduplication and Merge Core
//!
//! Filter → Normalizer → Similarity Resolver → Count Reconciliation.

pub mod normalizer;
pub mod reconcile;
pub mod resolver;
pub mod url_filter;

pub use normalizer::{normalize, normalize_all, NormalizeOutcome, RejectReason};
pub use reconcile::{ReconcileError, ReconcileOutcome, Reconciler, RepairReport};
pub use resolver::{decide, MatchPolicy, SimilarityResolver};
pub use url_filter::{
    canonicalize, filter_against_ledger, filter_urls, fingerprint, CandidateUrl,
    CanonicalizeError, FilterOutcome,
};
