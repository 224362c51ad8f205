use thiserror::Error;

#[derive(Debug, Error)]
pub enum EyeControlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    /// The proposer reply had no extractable action object.
    #[error("Malformed model response: {raw}")]
    MalformedResponse { raw: String },

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Sandbox error: {0}")]
    Sandbox(String),

    #[error("Preview error: {0}")]
    Preview(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type EyeControlResult<T> = Result<T, EyeControlError>;
