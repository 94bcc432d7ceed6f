use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubtransError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Cue source error: {0}")]
    CueSource(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, SubtransError>;
