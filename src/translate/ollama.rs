use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::TranslateConfig;
use crate::error::{Result, SubtransError};
use super::{TranslationBackend, common::{build_client, ensure_same_length, language_code_to_name}};

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
    pub done: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct BatchResult {
    translations: Vec<String>,
}

/// Ollama backend: one JSON-format generate call per batch
pub struct OllamaTranslator {
    client: Client,
    config: TranslateConfig,
}

impl OllamaTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(&config)?,
            config,
        })
    }

    fn build_prompt(&self, texts: &[String], target_language: &str) -> Result<String> {
        let language_name = language_code_to_name(target_language);
        let lines = serde_json::to_string(texts)?;

        Ok(format!(
            "You are a professional subtitle translator.\n\
             \n\
             Translate each subtitle line of the JSON array below to {} (language code: {}).\n\
             Keep the same number of lines and the same order. Do not merge or split lines.\n\
             \n\
             Return ONLY JSON in the form {{\"translations\":[\"line 1\",\"line 2\"]}}.\n\
             \n\
             [Lines]\n\
             {}\n",
            language_name, target_language, lines
        ))
    }
}

#[async_trait]
impl TranslationBackend for OllamaTranslator {
    async fn translate_batch(&self, texts: &[String], target_language: &str) -> Result<Vec<String>> {
        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: self.build_prompt(texts, target_language)?,
            stream: false,
            format: "json".to_string(),
        };

        let url = format!("{}/api/generate", self.config.base_url());
        debug!("Sending translation request to: {}", url);

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SubtransError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SubtransError::Translation(format!(
                "Ollama API error {}: {}", status, error_text
            )));
        }

        let generated: GenerateResponse = response.json().await
            .map_err(|e| SubtransError::Translation(format!("Failed to parse response: {}", e)))?;

        debug!("Raw Ollama response: {}", generated.response);
        parse_translations(&generated.response, texts.len())
    }

    fn name(&self) -> &'static str {
        "ollama"
    }

    /// Check that Ollama answers and the configured model is present
    async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/api/show", self.config.base_url());

        let response = self.client
            .post(&url)
            .json(&json!({ "name": self.config.model }))
            .send()
            .await
            .map_err(|e| SubtransError::Translation(format!("Failed to connect to Ollama: {}", e)))?;

        if response.status().is_success() {
            info!("Ollama model '{}' is available", self.config.model);
            Ok(())
        } else {
            Err(SubtransError::Translation(format!(
                "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
                self.config.model, self.config.model
            )))
        }
    }
}

/// Parse the model's JSON answer into translations
fn parse_translations(raw: &str, requested: usize) -> Result<Vec<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SubtransError::Translation("Empty translation received".to_string()));
    }

    let result: BatchResult = serde_json::from_str(raw)
        .map_err(|e| SubtransError::Translation(format!("Model did not return the expected JSON: {}", e)))?;

    let translations = result.translations
        .into_iter()
        .map(|t| t.trim().to_string())
        .collect();

    ensure_same_length(requested, translations)
}
