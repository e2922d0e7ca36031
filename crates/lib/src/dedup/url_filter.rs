//! # URL Deduplication Filter
//!
//! Collapses a batch of discovered links to one per canonical URL and removes links the
//! ledger has already seen. The ledger is only read here; inserting new records is the
//! pipeline's job once the articles have actually been fetched.

use crate::{errors::ProviderError, providers::db::Ledger, types::UrlFingerprint};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum CanonicalizeError {
    #[error("invalid URL '{url}': {reason}")]
    Invalid { url: String, reason: String },
    #[error("unsupported scheme '{scheme}' in '{url}'")]
    UnsupportedScheme { url: String, scheme: String },
}

/// Normalizes a URL: lowercase scheme and host, no fragment, no default port, sorted
/// query parameters, and no trailing slash except on the root path.
pub fn canonicalize(raw: &str) -> Result<String, CanonicalizeError> {
    let mut parsed = Url::parse(raw.trim()).map_err(|e| CanonicalizeError::Invalid {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CanonicalizeError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: parsed.scheme().to_string(),
        });
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(CanonicalizeError::Invalid {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }

    // Default ports (`:80`, `:443`) are already dropped by the parser.
    parsed.set_fragment(None);

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        pairs.sort();
        parsed.query_pairs_mut().clear().extend_pairs(pairs);
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    Ok(parsed.to_string())
}

/// Fingerprint of the canonical form of `raw`.
pub fn fingerprint(raw: &str) -> Result<UrlFingerprint, CanonicalizeError> {
    canonicalize(raw).map(|c| UrlFingerprint::of_canonical(&c))
}

/// A link that survived filtering, with its fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateUrl {
    pub url: String,
    pub fingerprint: UrlFingerprint,
}

/// Output of one filter pass plus the per-stage counts the pipeline reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
    pub urls: Vec<CandidateUrl>,
    pub found: usize,
    pub malformed: usize,
    pub intra_batch_duplicates: usize,
    pub already_seen: usize,
}

impl FilterOutcome {
    /// URLs left after intra-batch deduplication, before the ledger check.
    pub fn unique(&self) -> usize {
        self.found - self.malformed - self.intra_batch_duplicates
    }
}

/// Filters `raw_urls` against an in-memory set of seen fingerprints. Order is preserved
/// and the first occurrence of each canonical URL wins.
pub fn filter_urls<S: AsRef<str>>(raw_urls: &[S], seen: &HashSet<UrlFingerprint>) -> FilterOutcome {
    let mut outcome = FilterOutcome {
        found: raw_urls.len(),
        ..Default::default()
    };
    let mut batch_fingerprints = HashSet::new();

    for raw in raw_urls {
        let raw = raw.as_ref();
        let fp = match fingerprint(raw) {
            Ok(fp) => fp,
            Err(e) => {
                warn!("Dropping malformed URL: {e}");
                outcome.malformed += 1;
                continue;
            }
        };

        if !batch_fingerprints.insert(fp.clone()) {
            outcome.intra_batch_duplicates += 1;
            continue;
        }
        if seen.contains(&fp) {
            outcome.already_seen += 1;
            continue;
        }
        outcome.urls.push(CandidateUrl {
            url: raw.trim().to_string(),
            fingerprint: fp,
        });
    }

    outcome
}

/// Loads the ledger's fingerprints and filters `raw_urls` against them.
pub async fn filter_against_ledger<S: AsRef<str>>(
    raw_urls: &[S],
    ledger: &dyn Ledger,
) -> Result<FilterOutcome, ProviderError> {
    let seen = ledger.fetch_all_fingerprints().await?;
    let outcome = filter_urls(raw_urls, &seen);
    info!(
        "URLs found: {}, unique: {}, new: {}",
        outcome.found,
        outcome.unique(),
        outcome.urls.len()
    );
    Ok(outcome)
}
