use crate::error::{AppError, Result};
use dotenvy::dotenv;
use std::env;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// API connection settings, passed explicitly into the client and pipeline
/// constructors. There is no ambient global configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_key: String,
    /// Endpoint base, e.g. `https://api.openai.com/v1`. Stored without a
    /// trailing slash.
    pub api_base_url: String,
    pub model_name: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();

        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| AppError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let api_base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let model_name = env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Self::builder()
            .with_api_key(&api_key)
            .with_base_url(&api_base_url)
            .with_model(&model_name)
            .build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Whether enough is configured to attempt a network call.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Builder for [`Config`], used when values come from the settings UI
/// instead of the environment.
#[derive(Default)]
pub struct ConfigBuilder {
    api_key: String,
    api_base_url: Option<String>,
    model_name: Option<String>,
}

impl ConfigBuilder {
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = key.trim().to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.api_base_url = Some(base_url.trim().to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model_name = Some(model.trim().to_string());
        self
    }

    pub fn build(self) -> Result<Config> {
        let base_url = self
            .api_base_url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        url::Url::parse(&base_url)
            .map_err(|e| AppError::config(format!("Invalid base URL '{}': {}", base_url, e)))?;

        Ok(Config {
            api_key: self.api_key,
            api_base_url: base_url.trim_end_matches('/').to_string(),
            model_name: self
                .model_name
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_trims_trailing_slash() {
        let config = Config::builder()
            .with_api_key("sk-test")
            .with_base_url("https://example.com/v1/")
            .build()
            .unwrap();
        assert_eq!(config.api_base_url, "https://example.com/v1");
    }

    #[test]
    fn builder_rejects_invalid_base_url() {
        let result = Config::builder()
            .with_api_key("sk-test")
            .with_base_url("not a url")
            .build();
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn builder_defaults_model_and_base_url() {
        let config = Config::builder().with_api_key("sk-test").build().unwrap();
        assert_eq!(config.api_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model_name, DEFAULT_MODEL);
        assert!(config.has_api_key());
    }

    #[test]
    fn empty_api_key_is_detected() {
        let config = Config::builder().with_api_key("  ").build().unwrap();
        assert!(!config.has_api_key());
    }
}
