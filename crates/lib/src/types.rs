//! # Core Data Types
//!
//! Strongly-typed records shared by the deduplication core, the storage providers
//! and the external collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// MD5 digest (lowercase hex) of a canonicalized URL. The deduplication key for links.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlFingerprint(String);

impl UrlFingerprint {
    /// Hashes an already canonicalized URL.
    pub fn of_canonical(canonical_url: &str) -> Self {
        Self(format!("{:x}", md5::compute(canonical_url.as_bytes())))
    }

    /// Accepts a previously computed fingerprint, e.g. one recovered from a batch `custom_id`.
    /// Returns `None` unless the input is 32 hex characters.
    pub fn parse(hex: &str) -> Option<Self> {
        let hex = hex.trim();
        if hex.len() == 32 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self(hex.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UrlFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A row of the seen-URL ledger. Inserted once, never updated, removed only by purge.
#[derive(Debug, Clone, PartialEq)]
pub struct SeenUrlRecord {
    pub fingerprint: UrlFingerprint,
    pub url: String,
    pub title: String,
    pub discovered_at: DateTime<Utc>,
}

/// The validated, descriptive part of an idea as produced by the extraction service.
///
/// Field names follow the extraction output schema (`problemStatement`, `type`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaDraft {
    pub title: String,
    #[serde(rename = "type")]
    pub category: String,
    pub problem_statement: String,
    pub solution: String,
    pub target_audience: String,
    pub innovation_score: f64,
    pub potential_applications: String,
    pub prerequisites: String,
    pub additional_notes: String,
}

/// An idea flowing through the pipeline after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Idea {
    pub draft: IdeaDraft,
    pub url_fingerprint: Option<UrlFingerprint>,
    pub embedding: Vec<f32>,
    pub count: u32,
}

impl Idea {
    pub fn new(draft: IdeaDraft, url_fingerprint: Option<UrlFingerprint>) -> Self {
        Self {
            draft,
            url_fingerprint,
            embedding: Vec::new(),
            count: 1,
        }
    }

    pub fn title(&self) -> &str {
        &self.draft.title
    }

    /// The text sent to the embedding service.
    pub fn embedding_text(&self) -> String {
        format!("{}_{}", self.draft.problem_statement, self.draft.solution)
    }

    /// Metadata stored alongside the vector for this idea.
    pub fn metadata(&self) -> IdeaMetadata {
        IdeaMetadata {
            draft: self.draft.clone(),
            source_fingerprint: self.url_fingerprint.clone(),
            count: self.count,
        }
    }
}

fn default_count() -> u32 {
    1
}

/// The metadata payload of a vector-index entry. `count` here is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaMetadata {
    #[serde(flatten)]
    pub draft: IdeaDraft,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_fingerprint: Option<UrlFingerprint>,
    #[serde(default = "default_count")]
    pub count: u32,
}

/// One nearest-neighbour hit returned by the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub score: f64,
    pub metadata: IdeaMetadata,
}

/// A full vector-index entry, as returned by `fetch` and `list_entries`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub id: String,
    pub metadata: IdeaMetadata,
}

/// Outcome of the similarity check for one idea.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The idea is the same as an existing entry.
    Merge(VectorMatch),
    New,
}

/// Provenance attached to a newly created display record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceInfo {
    pub url: String,
    pub title: String,
    pub discovered_at: Option<DateTime<Utc>>,
}

impl From<SeenUrlRecord> for SourceInfo {
    fn from(record: SeenUrlRecord) -> Self {
        Self {
            url: record.url,
            title: record.title,
            discovered_at: Some(record.discovered_at),
        }
    }
}

/// A display record as seen through the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRecord {
    pub record_id: String,
    pub title: String,
    pub count: Option<u32>,
}

/// A submitted batch extraction job.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJobRecord {
    pub job_id: String,
    pub created_at: DateTime<Utc>,
}

/// Extracted readable content for one article.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// Raw extraction output tied to the article it came from.
#[derive(Debug, Clone)]
pub struct ExtractedDrafts {
    pub url_fingerprint: Option<UrlFingerprint>,
    pub drafts: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_parse_accepts_only_md5_hex() {
        let fp = UrlFingerprint::of_canonical("https://example.com/a");
        assert_eq!(UrlFingerprint::parse(fp.as_str()), Some(fp.clone()));
        assert_eq!(
            UrlFingerprint::parse(&fp.as_str().to_uppercase()),
            Some(fp)
        );
        assert!(UrlFingerprint::parse("not-a-hash").is_none());
        assert!(UrlFingerprint::parse("abc").is_none());
    }

    #[test]
    fn metadata_serializes_with_extraction_field_names() {
        let idea = Idea::new(
            IdeaDraft {
                title: "Smart Home AI Router".into(),
                category: "Startup".into(),
                problem_statement: "p".into(),
                solution: "s".into(),
                target_audience: "a".into(),
                innovation_score: 7.5,
                potential_applications: "x".into(),
                prerequisites: "y".into(),
                additional_notes: "z".into(),
            },
            None,
        );
        let json = serde_json::to_value(idea.metadata()).unwrap();
        assert_eq!(json["type"], "Startup");
        assert_eq!(json["problemStatement"], "p");
        assert_eq!(json["count"], 1);
        assert!(json.get("sourceFingerprint").is_none());

        let back: IdeaMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, idea.metadata());
    }
}
