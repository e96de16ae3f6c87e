//! Response parsing.
//!
//! The service answers either with the structured object directly or with
//! the object embedded in text: inside an envelope field, inside a fenced
//! code block, or surrounded by prose.

use serde::Deserialize;
use serde_json::Value;
use vlens_models::{AnalysisData, FrameAnalysis};

use crate::error::{AnalysisError, AnalysisResult};

/// Envelope fields that may carry the model's text output.
const ENVELOPE_FIELDS: [&str; 3] = ["text", "content", "response"];

/// Bound on envelope and text-in-JSON nesting.
const MAX_NESTING: usize = 12;

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    summary: Option<String>,
    #[serde(
        default,
        rename = "perFrameAnalysis",
        alias = "per_frame_analysis",
        alias = "frameAnalyses"
    )]
    per_frame_analysis: Option<Vec<FrameAnalysis>>,
}

fn looks_like_analysis(value: &Value) -> bool {
    value.as_object().is_some_and(|obj| {
        obj.contains_key("summary")
            || obj.contains_key("perFrameAnalysis")
            || obj.contains_key("per_frame_analysis")
            || obj.contains_key("frameAnalyses")
    })
}

/// Content of the first ```json (or bare ```) fenced block.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let lang = after[..body_start].trim();
    if !lang.is_empty() && !lang.eq_ignore_ascii_case("json") {
        return None;
    }
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Slice from the first `{` to the last `}`.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Locate the analysis object in a JSON value, following envelopes.
fn find_in_value(value: &Value, depth: usize) -> Option<Value> {
    if depth > MAX_NESTING {
        return None;
    }
    if looks_like_analysis(value) {
        return Some(value.clone());
    }
    match value {
        Value::Object(obj) => ENVELOPE_FIELDS
            .iter()
            .filter_map(|field| obj.get(*field))
            .find_map(|inner| find_in_value(inner, depth + 1)),
        Value::String(text) => find_in_text(text, depth + 1),
        Value::Array(items) => items.iter().find_map(|item| find_in_value(item, depth + 1)),
        _ => None,
    }
}

fn find_in_text(text: &str, depth: usize) -> Option<Value> {
    if depth > MAX_NESTING {
        return None;
    }
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(found) = find_in_value(&value, depth + 1) {
            return Some(found);
        }
    }

    [fenced_block(trimmed), outermost_object(trimmed)]
        .into_iter()
        .flatten()
        .filter_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .find_map(|value| find_in_value(&value, depth + 1))
}

/// Parse a service response body into analysis data.
pub fn parse_response(body: &str) -> AnalysisResult<AnalysisData> {
    if body.trim().is_empty() {
        return Err(AnalysisError::parse("empty response body"));
    }

    let value = find_in_text(body, 0).ok_or_else(|| {
        let preview: String = body.chars().take(120).collect();
        AnalysisError::parse(format!("no analysis object found in response: {}", preview))
    })?;

    let raw: RawAnalysis = serde_json::from_value(value)
        .map_err(|e| AnalysisError::parse(format!("malformed analysis object: {}", e)))?;

    let frame_analyses = raw.per_frame_analysis.unwrap_or_default();
    if frame_analyses.is_empty() {
        return Err(AnalysisError::schema_invalid("no per-frame analyses"));
    }

    Ok(AnalysisData {
        summary: raw.summary.unwrap_or_default().trim().to_string(),
        frame_analyses,
    })
}

/// Fill missing timestamps from the timestamps of the submitted frames.
pub fn attach_timestamps(data: &mut AnalysisData, timestamps: &[f64]) {
    for (position, analysis) in data.frame_analyses.iter_mut().enumerate() {
        if analysis.timestamp.is_none() {
            let index = if analysis.frame_index < timestamps.len() {
                analysis.frame_index
            } else {
                position
            };
            analysis.timestamp = timestamps.get(index).copied();
        }
    }
}
