use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::AnalyzerConfig;
use crate::error::{Result, SrtfixError};
use super::{Analyzer, build_http_client, common::{build_review_prompt, normalize_findings, parse_findings, AnalyzerFinding}};

/// Spelling review through the Gemini `generateContent` API
pub struct GeminiAnalyzer {
    client: Client,
    config: AnalyzerConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(&config)?,
            config,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Request body asking for a JSON array matching the finding schema
    fn build_request(&self, document: &str) -> Value {
        let prompt = build_review_prompt(document, &self.config.language, self.config.max_suggestions);
        json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "subtitleId": {
                                "type": "INTEGER",
                                "description": "The numeric ID of the subtitle block where the error is located."
                            },
                            "originalWord": {
                                "type": "STRING",
                                "description": "The specific word or phrase that is incorrect."
                            },
                            "context": {
                                "type": "STRING",
                                "description": "The full line of text containing the error."
                            },
                            "reason": {
                                "type": "STRING",
                                "description": format!("A short explanation of why the word is an error, written in {}.", self.config.language)
                            },
                            "suggestions": {
                                "type": "ARRAY",
                                "items": { "type": "STRING" },
                                "description": "An array of suggested correction strings."
                            }
                        },
                        "required": ["subtitleId", "originalWord", "context", "reason", "suggestions"]
                    }
                }
            }
        })
    }
}

/// Concatenate the text parts of the first candidate
fn extract_text(response: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(SrtfixError::Analysis(format!("Gemini blocked the request: {}", reason)));
    }

    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(SrtfixError::Analysis("Gemini returned no content".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl Analyzer for GeminiAnalyzer {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    fn requires_credential(&self) -> bool {
        true
    }

    async fn find_errors(
        &self,
        document: &str,
        credential: Option<String>,
    ) -> Result<Vec<AnalyzerFinding>> {
        let api_key = credential
            .filter(|key| !key.trim().is_empty())
            .ok_or(SrtfixError::MissingCredential)?;

        let url = self.url();
        info!("Requesting spelling review from Gemini model {}", self.config.model);
        debug!("Sending review request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key.trim())
            .json(&self.build_request(document))
            .send()
            .await
            .map_err(|e| SrtfixError::Analysis(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SrtfixError::Analysis(format!(
                "Gemini API error {}: {}", status, error_text
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| SrtfixError::Analysis(format!("Failed to parse response: {}", e)))?;

        let text = extract_text(body)?;
        debug!("Raw Gemini response: {}", text);

        let findings = parse_findings(&text)?;
        Ok(normalize_findings(findings, self.config.max_suggestions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> GeminiAnalyzer {
        GeminiAnalyzer::new(AnalyzerConfig::default()).unwrap()
    }

    #[test]
    fn test_url_uses_model() {
        let mut config = AnalyzerConfig::default();
        config.endpoint = "https://example.test/".to_string();
        let analyzer = GeminiAnalyzer::new(config).unwrap();
        assert_eq!(
            analyzer.url(),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_carries_schema_and_document() {
        let body = analyzer().build_request("1\n00:00:01,000 --> 00:00:02,000\nHello wrold");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        let required = body["generationConfig"]["responseSchema"]["items"]["required"]
            .as_array()
            .unwrap();
        assert_eq!(required.len(), 5);
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("Hello wrold"));
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"[{\"subtitleId\":1,"},{"text":"\"originalWord\":\"wrold\",\"context\":\"Hello wrold\",\"reason\":\"typo\",\"suggestions\":[\"world\"]}]"}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let text = extract_text(response).unwrap();
        let findings = parse_findings(&text).unwrap();
        assert_eq!(findings[0].original_word, "wrold");
    }

    #[test]
    fn test_extract_text_reports_block_and_empty() {
        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(matches!(extract_text(blocked), Err(SrtfixError::Analysis(msg)) if msg.contains("SAFETY")));

        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(extract_text(empty), Err(SrtfixError::Analysis(_))));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let result = analyzer().find_errors("1\n00:00:01,000 --> 00:00:02,000\nx", Some("  ".to_string())).await;
        assert!(matches!(result, Err(SrtfixError::MissingCredential)));
    }
}
