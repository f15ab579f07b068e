// Pluggable spelling-review services
//
// This module provides analyzer implementations through a factory pattern:
// - Gemini: Google Gemini generateContent API with a JSON response schema
// - Ollama: local Ollama server using JSON output mode
//
// Every implementation resolves once with the full batch of findings or
// fails with a single `SrtfixError::Analysis` carrying a readable message.

pub mod common;
pub mod gemini;
pub mod ollama;

use async_trait::async_trait;

pub use common::*;
use crate::config::{AnalyzerConfig, AnalyzerProvider};
use crate::error::Result;

/// Main trait for subtitle review services
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Human-readable service name used in logs and messages
    fn name(&self) -> &'static str;

    /// Whether `find_errors` needs an API key
    fn requires_credential(&self) -> bool;

    /// Send the whole SRT document and return the flagged words
    async fn find_errors(
        &self,
        document: &str,
        credential: Option<String>,
    ) -> Result<Vec<AnalyzerFinding>>;
}

/// Factory for creating analyzer instances
pub struct AnalyzerFactory;

impl AnalyzerFactory {
    /// Create an analyzer based on the configured provider
    pub fn create(config: &AnalyzerConfig) -> Result<Box<dyn Analyzer>> {
        match config.provider {
            AnalyzerProvider::Gemini => Ok(Box::new(gemini::GeminiAnalyzer::new(config.clone())?)),
            AnalyzerProvider::Ollama => Ok(Box::new(ollama::OllamaAnalyzer::new(config.clone())?)),
        }
    }
}

/// Shared HTTP client construction
pub(crate) fn build_http_client(config: &AnalyzerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .user_agent(concat!("srtfix/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_selects_provider() {
        let mut config = AnalyzerConfig::default();
        let gemini = AnalyzerFactory::create(&config).unwrap();
        assert_eq!(gemini.name(), "Gemini");
        assert!(gemini.requires_credential());

        config.provider = AnalyzerProvider::Ollama;
        let ollama = AnalyzerFactory::create(&config).unwrap();
        assert_eq!(ollama.name(), "Ollama");
        assert!(!ollama.requires_credential());
    }
}
