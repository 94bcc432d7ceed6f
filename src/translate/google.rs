use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{Result, SubtransError};
use super::{TranslationBackend, common::{build_client, ensure_same_length}};

#[derive(Debug, Serialize)]
struct GoogleRequest<'a> {
    q: &'a [String],
    target: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    data: GoogleData,
}

#[derive(Debug, Deserialize)]
struct GoogleData {
    translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTranslation {
    translated_text: String,
}

/// Google Cloud Translation (v2) backend
pub struct GoogleTranslator {
    client: Client,
    config: TranslateConfig,
    api_key: String,
}

impl GoogleTranslator {
    pub fn new(config: TranslateConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_client(&config)?,
            config,
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}/language/translate/v2", self.config.base_url())
    }
}

#[async_trait]
impl TranslationBackend for GoogleTranslator {
    async fn translate_batch(&self, texts: &[String], target_language: &str) -> Result<Vec<String>> {
        let request = GoogleRequest {
            q: texts,
            target: target_language,
            format: "text",
        };

        let url = self.url();
        debug!("Sending {} texts to {}", texts.len(), url);

        let response = self.client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| SubtransError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SubtransError::Translation(format!(
                "Google Translate API error {}: {}", status, error_text
            )));
        }

        let body = response.text().await
            .map_err(|e| SubtransError::Translation(format!("Failed to read response: {}", e)))?;

        parse_response(&body, texts.len())
    }

    fn name(&self) -> &'static str {
        "google"
    }
}

/// Extract translations from a v2 response body, in request order
fn parse_response(body: &str, requested: usize) -> Result<Vec<String>> {
    let response: GoogleResponse = serde_json::from_str(body)
        .map_err(|e| SubtransError::Translation(format!("Failed to parse response: {}", e)))?;

    let translations = response.data.translations
        .into_iter()
        .map(|t| t.translated_text)
        .collect();

    ensure_same_length(requested, translations)
}
