use reqwest::Client;
use std::time::Duration;

use crate::config::TranslateConfig;
use crate::error::{Result, SubtransError};

/// Build the HTTP client shared by the backends
pub fn build_client(config: &TranslateConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(concat!("subtrans/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(SubtransError::Http)
}

/// Enforce the positional pairing contract of a batch response
pub fn ensure_same_length(requested: usize, translations: Vec<String>) -> Result<Vec<String>> {
    if translations.len() != requested {
        return Err(SubtransError::Translation(format!(
            "Backend returned {} translations for {} texts",
            translations.len(),
            requested
        )));
    }
    Ok(translations)
}

/// Convert language code to full language name for clearer prompts
pub fn language_code_to_name(code: &str) -> String {
    let primary = code.split(['-', '_']).next().unwrap_or(code);
    match primary.to_lowercase().as_str() {
        "zh" => match code.to_lowercase().as_str() {
            "zh-tw" | "zh-hk" | "zh-hant" => "Traditional Chinese".to_string(),
            _ => "Simplified Chinese".to_string(),
        },
        "en" => "English".to_string(),
        "ja" => "Japanese".to_string(),
        "ko" => "Korean".to_string(),
        "fr" => "French".to_string(),
        "de" => "German".to_string(),
        "es" => "Spanish".to_string(),
        "ru" => "Russian".to_string(),
        "it" => "Italian".to_string(),
        "pt" => "Portuguese".to_string(),
        "pl" => "Polish".to_string(),
        "nl" => "Dutch".to_string(),
        "tr" => "Turkish".to_string(),
        "ar" => "Arabic".to_string(),
        "hi" => "Hindi".to_string(),
        "th" => "Thai".to_string(),
        "vi" => "Vietnamese".to_string(),
        "sv" => "Swedish".to_string(),
        "uk" => "Ukrainian".to_string(),
        _ => code.to_string(),
    }
}
