use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, SubtransError};

/// Environment variable consulted when `translate.api_key` is empty
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_TRANSLATE_API_KEY";

const GOOGLE_ENDPOINT: &str = "https://translation.googleapis.com";
const OLLAMA_ENDPOINT: &str = "http://localhost:11434";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub translate: TranslateConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of cues submitted to the backend in one call
    pub batch_size: usize,
    /// Delay between scheduler cycles in milliseconds
    pub batch_interval_ms: u64,
    /// Maximum number of backend calls awaiting a response per file
    pub max_in_flight: usize,
    /// Language tags of subtitle tracks eligible for translation. Untagged tracks are accepted too.
    pub source_languages: Vec<String>,
    /// Language every cue is translated into
    pub target_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Which translation service handles the batches
    pub backend: BackendKind,
    /// Base URL of the translation service, empty for the backend's default
    pub endpoint: String,
    /// API key for Google Cloud Translation
    pub api_key: String,
    /// Model name, only used by the Ollama backend
    pub model: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Google Cloud Translation v2 REST API
    Google,
    /// Local LLM served by Ollama
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
    /// File extensions picked up when scanning a directory
    pub extensions: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 2,
            batch_interval_ms: 8000,
            max_in_flight: 1,
            source_languages: vec!["en".to_string(), "eng".to_string()],
            target_language: "zh-cn".to_string(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Google,
            endpoint: String::new(),
            api_key: String::new(),
            model: "llama3.2:3b".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            extensions: vec!["mkv".to_string()],
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubtransError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SubtransError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubtransError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubtransError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let pipeline = &self.pipeline;
        if pipeline.batch_size == 0 {
            return Err(SubtransError::Config("batch_size must be at least 1".to_string()));
        }
        if pipeline.batch_interval_ms == 0 {
            return Err(SubtransError::Config("batch_interval_ms must be at least 1".to_string()));
        }
        if pipeline.max_in_flight == 0 {
            return Err(SubtransError::Config("max_in_flight must be at least 1".to_string()));
        }
        if pipeline.target_language.trim().is_empty() {
            return Err(SubtransError::Config("target_language must not be empty".to_string()));
        }
        if self.translate.timeout_secs == 0 {
            return Err(SubtransError::Config("translate.timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// API key from the config file, or from the environment when left empty
    pub fn google_api_key(&self) -> Option<String> {
        if !self.translate.api_key.is_empty() {
            return Some(self.translate.api_key.clone());
        }
        std::env::var(GOOGLE_API_KEY_ENV).ok().filter(|key| !key.is_empty())
    }
}

impl TranslateConfig {
    /// Configured endpoint without trailing slash, or the backend's public default
    pub fn base_url(&self) -> &str {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if !endpoint.is_empty() {
            return endpoint;
        }
        match self.backend {
            BackendKind::Google => GOOGLE_ENDPOINT,
            BackendKind::Ollama => OLLAMA_ENDPOINT,
        }
    }
}
