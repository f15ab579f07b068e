use thiserror::Error;

#[derive(Error, Debug)]
pub enum SrtfixError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not parse any subtitles from {0}")]
    Parse(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("An analysis is already in progress for this session")]
    AnalysisInProgress,

    #[error("Analysis result belongs to document version {received}, current version is {current}")]
    StaleAnalysis { received: u64, current: u64 },

    #[error("No API key is configured; run `srtfix key set <KEY>` first")]
    MissingCredential,

    #[error("Credential store error: {0}")]
    Credential(String),

    #[error("No subtitle document has been loaded")]
    NoDocument,

    #[error("Subtitle {0} does not exist in the current document")]
    UnknownSubtitle(u32),

    #[error("Flagged error {0} is not outstanding")]
    UnknownError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, SrtfixError>;
