//! # Idea Normalizer
//!
//! Validates raw extraction output into typed `Idea`s. Records with a missing or
//! ill-typed required field are rejected individually; they never abort the batch.

use crate::types::{ExtractedDrafts, Idea, IdeaDraft, UrlFingerprint};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RejectReason {
    #[error("draft is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` has an unusable value")]
    InvalidField(&'static str),
}

/// Fields that must carry non-blank text; the others may be empty strings.
const NON_BLANK: &[&str] = &["title", "type", "problemStatement", "solution"];

fn text_field(obj: &Map<String, Value>, key: &'static str) -> Result<String, RejectReason> {
    let text = match obj.get(key) {
        None | Some(Value::Null) => return Err(RejectReason::MissingField(key)),
        Some(Value::String(s)) => s.trim().to_string(),
        // Models occasionally return short lists for the descriptive fields.
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                _ => Err(RejectReason::InvalidField(key)),
            })
            .collect::<Result<Vec<_>, _>>()?
            .join(", "),
        Some(_) => return Err(RejectReason::InvalidField(key)),
    };
    if text.is_empty() && NON_BLANK.contains(&key) {
        return Err(RejectReason::MissingField(key));
    }
    Ok(text)
}

fn score_field(obj: &Map<String, Value>, key: &'static str) -> Result<f64, RejectReason> {
    let score = match obj.get(key) {
        None | Some(Value::Null) => Err(RejectReason::MissingField(key)),
        Some(Value::Number(n)) => n.as_f64().ok_or(RejectReason::InvalidField(key)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| RejectReason::InvalidField(key)),
        Some(_) => Err(RejectReason::InvalidField(key)),
    }?;
    if score.is_finite() {
        Ok(score)
    } else {
        Err(RejectReason::InvalidField(key))
    }
}

/// Validates one raw draft and attaches the fingerprint of the article it came from.
pub fn normalize(raw: &Value, url_fingerprint: Option<&UrlFingerprint>) -> Result<Idea, RejectReason> {
    let obj = raw.as_object().ok_or(RejectReason::NotAnObject)?;
    let draft = IdeaDraft {
        title: text_field(obj, "title")?,
        category: text_field(obj, "type")?,
        problem_statement: text_field(obj, "problemStatement")?,
        solution: text_field(obj, "solution")?,
        target_audience: text_field(obj, "targetAudience")?,
        innovation_score: score_field(obj, "innovationScore")?,
        potential_applications: text_field(obj, "potentialApplications")?,
        prerequisites: text_field(obj, "prerequisites")?,
        additional_notes: text_field(obj, "additionalNotes")?,
    };
    Ok(Idea::new(draft, url_fingerprint.cloned()))
}

#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub ideas: Vec<Idea>,
    pub rejected: usize,
}

/// Normalizes every draft of every article, counting rejects.
pub fn normalize_all(extracted: &[ExtractedDrafts]) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();
    for article in extracted {
        for raw in &article.drafts {
            match normalize(raw, article.url_fingerprint.as_ref()) {
                Ok(idea) => outcome.ideas.push(idea),
                Err(reason) => {
                    let title = raw.get("title").and_then(Value::as_str).unwrap_or("<untitled>");
                    warn!(title = %title, "Rejecting idea: {reason}");
                    outcome.rejected += 1;
                }
            }
        }
    }
    outcome
}
