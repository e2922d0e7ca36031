//! # Batch Task Codec
//!
//! Builds the per-article chat-completion tasks submitted as one batch job and parses
//! the JSONL result file back into idea drafts. The article's fingerprint travels in
//! the task's `custom_id` (`task-<fingerprint>`).

use crate::{
    constants::BATCH_TASK_PREFIX,
    errors::ProviderError,
    providers::ai::local::{ChatCompletionRequest, ChatCompletionResponse},
    types::{ExtractedDrafts, UrlFingerprint},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// One line of a batch input file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BatchTask {
    pub custom_id: String,
    pub method: String,
    pub url: String,
    pub body: ChatCompletionRequest,
}

impl BatchTask {
    pub fn new(
        fingerprint: &UrlFingerprint,
        model: &str,
        temperature: f32,
        prompt: &str,
        content: &str,
    ) -> Self {
        Self {
            custom_id: format!("{BATCH_TASK_PREFIX}{fingerprint}"),
            method: "POST".to_string(),
            url: "/v1/chat/completions".to_string(),
            body: ChatCompletionRequest::for_extraction(model, temperature, prompt, content),
        }
    }
}

pub fn tasks_to_jsonl(tasks: &[BatchTask]) -> Result<String, ProviderError> {
    let mut lines = Vec::with_capacity(tasks.len());
    for task in tasks {
        lines.push(serde_json::to_string(task)?);
    }
    Ok(lines.join("\n"))
}

/// Parses model output of the form `{"output": [ ...ideas... ]}`.
///
/// A missing or null `output` (e.g. the model ended early) yields no drafts.
/// Markdown code fences around the JSON are tolerated.
pub fn parse_idea_envelope(raw: &str) -> Result<Vec<Value>, ProviderError> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end().trim_end_matches("```").trim())
        .unwrap_or(trimmed);

    let parsed: Value = serde_json::from_str(trimmed)?;
    match parsed {
        Value::Object(mut map) => match map.remove("output") {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => {
                if let Some(reason) = map.get("endReason") {
                    debug!("Model returned no ideas (endReason: {reason})");
                }
                Ok(Vec::new())
            }
            Some(other) => {
                warn!("Ignoring non-array `output` field: {other}");
                Ok(Vec::new())
            }
        },
        Value::Array(items) => Ok(items),
        _ => Ok(Vec::new()),
    }
}

#[derive(Deserialize, Debug)]
struct ResultLine {
    custom_id: String,
    response: Option<ResultResponse>,
}

#[derive(Deserialize, Debug)]
struct ResultResponse {
    body: ChatCompletionResponse,
}

/// Result of parsing a batch output file.
#[derive(Debug, Default)]
pub struct BatchParseOutcome {
    pub extracted: Vec<ExtractedDrafts>,
    pub rejected_lines: usize,
}

fn parse_result_line(line: &str) -> Result<ExtractedDrafts, String> {
    let result: ResultLine = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let body = result
        .response
        .ok_or_else(|| format!("{} has no response", result.custom_id))?
        .body;
    let content = body
        .first_content()
        .ok_or_else(|| format!("{} has no choices", result.custom_id))?;
    let drafts = parse_idea_envelope(content).map_err(|e| e.to_string())?;

    let url_fingerprint = result
        .custom_id
        .strip_prefix(BATCH_TASK_PREFIX)
        .and_then(UrlFingerprint::parse);
    if url_fingerprint.is_none() {
        warn!(
            "Batch result '{}' carries no usable fingerprint; source metadata will be empty.",
            result.custom_id
        );
    }

    Ok(ExtractedDrafts {
        url_fingerprint,
        drafts,
    })
}

/// Parses every line of a batch output file. Unparseable lines are logged and counted,
/// never fatal.
pub fn parse_batch_results(jsonl: &str) -> BatchParseOutcome {
    let mut outcome = BatchParseOutcome::default();
    for (line_no, line) in jsonl.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_result_line(line) {
            Ok(extracted) => outcome.extracted.push(extracted),
            Err(e) => {
                warn!("Dropping batch result line {}: {e}", line_no + 1);
                outcome.rejected_lines += 1;
            }
        }
    }
    outcome
}
