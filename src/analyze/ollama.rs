use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AnalyzerConfig;
use crate::error::{Result, SrtfixError};
use super::{Analyzer, build_http_client, common::{build_review_prompt, normalize_findings, parse_findings, AnalyzerFinding}};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

/// Spelling review through a local Ollama server
pub struct OllamaAnalyzer {
    client: Client,
    config: AnalyzerConfig,
}

impl OllamaAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(&config)?,
            config,
        })
    }

    fn build_request(&self, document: &str) -> GenerateRequest {
        GenerateRequest {
            model: self.config.model.clone(),
            prompt: build_review_prompt(document, &self.config.language, self.config.max_suggestions),
            stream: false,
            format: "json".to_string(),
        }
    }
}

#[async_trait]
impl Analyzer for OllamaAnalyzer {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    fn requires_credential(&self) -> bool {
        false
    }

    async fn find_errors(
        &self,
        document: &str,
        _credential: Option<String>,
    ) -> Result<Vec<AnalyzerFinding>> {
        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        info!("Requesting spelling review from Ollama model {}", self.config.model);
        debug!("Sending review request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&self.build_request(document))
            .send()
            .await
            .map_err(|e| SrtfixError::Analysis(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SrtfixError::Analysis(format!(
                "Ollama API error {}: {}", status, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SrtfixError::Analysis(format!("Failed to read response: {}", e)))?;
        let generated = decode_response(&body)?;

        debug!("Raw Ollama response: {}", generated.response);

        let findings = parse_findings(&generated.response)?;
        Ok(normalize_findings(findings, self.config.max_suggestions))
    }
}

fn decode_response(body: &str) -> Result<GenerateResponse> {
    Ok(serde_json::from_str(body)?)
}
