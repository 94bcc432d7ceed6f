// Translation backends
//
// A backend takes an ordered batch of texts and returns their translations in
// the same order. Implementations are selected through a factory:
// - Google: Cloud Translation v2 REST API
// - Ollama: local LLM asked for a JSON array of translations

pub mod common;
pub mod google;
pub mod ollama;

use async_trait::async_trait;
use std::sync::Arc;

pub use common::*;
use crate::config::{BackendKind, Config};
use crate::error::{Result, SubtransError};

/// Batch translation service.
///
/// The returned list must have the same length as `texts`, and item `i` must be
/// the translation of `texts[i]`. Callers pair results by position.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Translate every text of the batch into `target_language`
    async fn translate_batch(&self, texts: &[String], target_language: &str) -> Result<Vec<String>>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Verify the service is reachable before any file is processed
    async fn check_availability(&self) -> Result<()> {
        Ok(())
    }
}

/// Factory for creating translation backends
pub struct BackendFactory;

impl BackendFactory {
    /// Create the backend configured in `translate.backend`
    pub fn create_backend(config: &Config) -> Result<Arc<dyn TranslationBackend>> {
        match config.translate.backend {
            BackendKind::Google => {
                let api_key = config.google_api_key().ok_or_else(|| {
                    SubtransError::Config(format!(
                        "Google backend needs translate.api_key or {}",
                        crate::config::GOOGLE_API_KEY_ENV
                    ))
                })?;
                Ok(Arc::new(google::GoogleTranslator::new(config.translate.clone(), api_key)?))
            }
            BackendKind::Ollama => Ok(Arc::new(ollama::OllamaTranslator::new(config.translate.clone())?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creates_ollama_without_key() {
        let mut config = Config::default();
        config.translate.backend = BackendKind::Ollama;

        let backend = BackendFactory::create_backend(&config).unwrap();
        assert_eq!(backend.name(), "ollama");
    }

    #[test]
    fn test_factory_uses_configured_google_key() {
        let mut config = Config::default();
        config.translate.api_key = "secret".to_string();

        let backend = BackendFactory::create_backend(&config).unwrap();
        assert_eq!(backend.name(), "google");
    }
}
