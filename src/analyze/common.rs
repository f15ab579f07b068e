use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, SrtfixError};

/// One suspect word reported by an analyzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerFinding {
    pub subtitle_id: u32,
    pub original_word: String,
    pub context: String,
    pub reason: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Some models wrap the array in an object
#[derive(Debug, Deserialize)]
struct FindingsEnvelope {
    #[serde(alias = "issues", alias = "findings")]
    errors: Vec<AnalyzerFinding>,
}

/// Build the review instructions sent with the document
pub fn build_review_prompt(document: &str, language: &str, max_suggestions: usize) -> String {
    format!(
        r#"Analyze the following SRT subtitle content. Your only task is to identify these specific kinds of errors:
1. Spelling mistakes (typos).
2. Words that do not exist in a standard dictionary.

IMPORTANT: Do not correct grammar or awkward sentences when the words themselves are spelled correctly. The subtitles are a verbatim transcription of a speaker, such as a lecturer. If the speaker stutters a word into a non-word (for example "isis" instead of "is"), flag it. If a sentence merely sounds unnatural but contains no misspelled word, do not flag it.

For each error found, provide: the numeric subtitle ID, the original incorrect word, the full line of text containing it, a short reason written in {language} (for example "typo" or "not a dictionary word"), and at most {max_suggestions} suggested corrections, best first.

Return ONLY a JSON array of objects with the fields "subtitleId", "originalWord", "context", "reason" and "suggestions". Return [] when there are no errors.

SRT content:
---
{document}
---"#
    )
}

/// Decode an analyzer's text output into findings.
///
/// Accepts a bare JSON array, an object wrapping the array, markdown code
/// fences, and JSON embedded in surrounding prose.
pub fn parse_findings(text: &str) -> Result<Vec<AnalyzerFinding>> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SrtfixError::Analysis("Analyzer returned an empty response".to_string()));
    }

    if let Some(findings) = try_decode(text) {
        return Ok(findings);
    }

    let cleaned = remove_markdown_code_blocks(text);
    if cleaned != text {
        debug!("Removed markdown code blocks, trying to parse: {}", cleaned);
        if let Some(findings) = try_decode(&cleaned) {
            return Ok(findings);
        }
    }

    for (open, close) in [('[', ']'), ('{', '}')] {
        if let (Some(start), Some(end)) = (cleaned.find(open), cleaned.rfind(close)) {
            if start < end {
                let candidate = &cleaned[start..=end];
                debug!("Extracted JSON from mixed text: {}", candidate);
                if let Some(findings) = try_decode(candidate) {
                    return Ok(findings);
                }
            }
        }
    }

    warn!("Failed to decode analyzer response: {}", text);
    Err(SrtfixError::Analysis(
        "Analyzer response is not a valid list of findings".to_string(),
    ))
}

fn try_decode(text: &str) -> Option<Vec<AnalyzerFinding>> {
    let value = serde_json::from_str::<Value>(text).ok()?;
    match value {
        Value::Array(_) => serde_json::from_value::<Vec<AnalyzerFinding>>(value).ok(),
        Value::Object(_) => serde_json::from_value::<FindingsEnvelope>(value)
            .ok()
            .map(|envelope| envelope.errors),
        _ => None,
    }
}

fn remove_markdown_code_blocks(text: &str) -> String {
    let text = text.trim();

    if let Some(inner) = text.strip_prefix("```json").and_then(|rest| rest.strip_suffix("```")) {
        return inner.trim().to_string();
    }

    if let Some(inner) = text.strip_prefix("```").and_then(|rest| rest.strip_suffix("```")) {
        return inner.trim().to_string();
    }

    text.to_string()
}

/// Drop blank suggestions and cap the list length
pub fn normalize_findings(findings: Vec<AnalyzerFinding>, max_suggestions: usize) -> Vec<AnalyzerFinding> {
    findings
        .into_iter()
        .map(|mut finding| {
            finding.suggestions.retain(|s| !s.trim().is_empty());
            finding.suggestions.truncate(max_suggestions);
            finding
        })
        .collect()
}
