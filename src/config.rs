use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, SrtfixError};

fn default_max_suggestions() -> usize {
    3
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_language() -> String {
    "English".to_string()
}

fn default_export_prefix() -> String {
    "corrected_".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Which review service to call
    pub provider: AnalyzerProvider,
    /// Base URL of the service
    pub endpoint: String,
    /// Model name passed to the service
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on suggestions kept per flagged word
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
    /// Language the analyzer writes its `reason` labels in
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalyzerProvider {
    /// Google Gemini `generateContent` API, requires an API key
    Gemini,
    /// Local Ollama server, no API key
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// File the API key is persisted in
    pub path: PathBuf,
    /// Environment variable that overrides the stored key when set
    pub env_var: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Prefix prepended to the source file name on export
    #[serde(default = "default_export_prefix")]
    pub prefix: String,
    /// Directory corrected files are written to; defaults to the source directory
    pub output_dir: Option<PathBuf>,
}

impl AnalyzerProvider {
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash",
            Self::Ollama => "llama3.2:3b",
        }
    }
}

impl std::str::FromStr for AnalyzerProvider {
    type Err = SrtfixError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            _ => Err(SrtfixError::Config(format!(
                "Invalid analyzer provider '{}'. Valid providers: gemini, ollama",
                s
            ))),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        let provider = AnalyzerProvider::Gemini;
        Self {
            provider,
            endpoint: provider.default_endpoint().to_string(),
            model: provider.default_model().to_string(),
            timeout_secs: default_timeout_secs(),
            max_suggestions: default_max_suggestions(),
            language: default_language(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".srtfix/credentials.toml"),
            env_var: Some("GEMINI_API_KEY".to_string()),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            prefix: default_export_prefix(),
            output_dir: None,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SrtfixError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SrtfixError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SrtfixError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SrtfixError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Switch provider, resetting endpoint and model to that provider's defaults
    pub fn use_provider(&mut self, provider: AnalyzerProvider) {
        if self.analyzer.provider != provider {
            self.analyzer.provider = provider;
            self.analyzer.endpoint = provider.default_endpoint().to_string();
            self.analyzer.model = provider.default_model().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("srtfix.toml");

        let mut config = Config::default();
        config.analyzer.max_suggestions = 2;
        config.export.output_dir = Some(PathBuf::from("out"));
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.analyzer.provider, AnalyzerProvider::Gemini);
        assert_eq!(loaded.analyzer.max_suggestions, 2);
        assert_eq!(loaded.export.output_dir, Some(PathBuf::from("out")));
        assert_eq!(loaded.export.prefix, "corrected_");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("srtfix.toml");
        std::fs::write(
            &path,
            "[analyzer]\nprovider = \"Ollama\"\nendpoint = \"http://gpu-box:11434\"\nmodel = \"qwen2.5:7b\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.analyzer.provider, AnalyzerProvider::Ollama);
        assert_eq!(config.analyzer.max_suggestions, 3);
        assert_eq!(config.analyzer.timeout_secs, 300);
        assert_eq!(config.credentials.env_var.as_deref(), Some("GEMINI_API_KEY"));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("srtfix.toml");
        std::fs::write(&path, "[analyzer\n").unwrap();
        assert!(matches!(Config::from_file(&path), Err(SrtfixError::Config(_))));
    }

    #[test]
    fn test_use_provider_resets_endpoint() {
        let mut config = Config::default();
        config.use_provider(AnalyzerProvider::Ollama);
        assert_eq!(config.analyzer.endpoint, "http://localhost:11434");
        assert_eq!(config.analyzer.model, "llama3.2:3b");
        assert_eq!("OLLAMA".parse::<AnalyzerProvider>().unwrap(), AnalyzerProvider::Ollama);
        assert!("openai".parse::<AnalyzerProvider>().is_err());
    }
}
