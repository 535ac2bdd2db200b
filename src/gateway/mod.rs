mod openai;

use async_trait::async_trait;
use std::sync::Arc;

pub use openai::OpenAiGateway;

use crate::types::Message;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur talking to the upstream provider
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("provider returned no usable content")]
    GeneratedEmpty,

    #[error("invalid gateway configuration: {0}")]
    Config(String),
}

/// Fixed preamble prepended to every completion request
pub const SYSTEM_PREAMBLE: &str = "You are a helpful AI assistant for the FlowChat platform. \
    You provide accurate, helpful, and thoughtful responses.";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
pub const DEFAULT_IMAGE_QUALITY: &str = "standard";

/// Size descriptors accepted by `generate_image`
pub const SUPPORTED_IMAGE_SIZES: &[&str] =
    &["256x256", "512x512", "1024x1024", "1792x1024", "1024x1792"];

/// Quality labels accepted by `generate_image`
pub const SUPPORTED_IMAGE_QUALITIES: &[&str] = &["standard", "hd"];

/// Per-request tuning for completions; unset fields use the configured defaults
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Per-request tuning for image generation
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    pub size: Option<String>,
    pub quality: Option<String>,
}

/// Adapter from application message history to one upstream provider call.
///
/// Every call is a direct passthrough with no caching, retries, or timeouts.
/// A single upstream failure propagates straight to the caller.
#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Request one assistant reply for the given conversation history
    async fn complete(&self, history: &[Message], options: ChatOptions) -> GatewayResult<Message>;

    /// Request one base64-encoded image for the given prompt
    async fn generate_image(&self, prompt: &str, options: ImageOptions)
        -> GatewayResult<Message>;

    /// Provider name, for logging and metrics
    fn name(&self) -> &str;
}

/// Gateway settings, loaded from the environment
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: Option<String>,
    /// Override for OpenAI-compatible providers; `None` uses the stock endpoint
    pub api_base: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

fn non_blank(value: Result<String, std::env::VarError>) -> Option<String> {
    value.ok().and_then(|raw| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_key: non_blank(std::env::var("OPENAI_API_KEY")),
            api_base: non_blank(std::env::var("OPENAI_API_BASE")),
            model: non_blank(std::env::var("OPENAI_MODEL")).unwrap_or(defaults.model),
            temperature: non_blank(std::env::var("LLM_TEMPERATURE"))
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.temperature),
            max_tokens: non_blank(std::env::var("LLM_MAX_TOKENS"))
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tokens),
        }
    }

    /// Build the production gateway, failing when no API key is configured
    pub fn build_gateway(&self) -> GatewayResult<Arc<dyn AiGateway>> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            GatewayError::Config("no API key configured. Set OPENAI_API_KEY".to_string())
        })?;

        Ok(Arc::new(OpenAiGateway::new(self, api_key)))
    }
}

/// Map a "WxH" descriptor to the provider size enum
pub fn parse_image_size(label: &str) -> Option<async_openai::types::ImageSize> {
    use async_openai::types::ImageSize;

    match label {
        "256x256" => Some(ImageSize::S256x256),
        "512x512" => Some(ImageSize::S512x512),
        "1024x1024" => Some(ImageSize::S1024x1024),
        "1792x1024" => Some(ImageSize::S1792x1024),
        "1024x1792" => Some(ImageSize::S1024x1792),
        _ => None,
    }
}

pub fn parse_image_quality(label: &str) -> Option<async_openai::types::ImageQuality> {
    use async_openai::types::ImageQuality;

    match label {
        "standard" => Some(ImageQuality::Standard),
        "hd" => Some(ImageQuality::HD),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 1000);
        assert!(config.api_key.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        std::env::set_var("OPENAI_MODEL", "gpt-4o-mini");
        std::env::set_var("LLM_TEMPERATURE", "0.2");
        std::env::set_var("LLM_MAX_TOKENS", "256");

        let config = GatewayConfig::from_env();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.max_tokens, 256);

        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("OPENAI_MODEL");
        std::env::remove_var("LLM_TEMPERATURE");
        std::env::remove_var("LLM_MAX_TOKENS");
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_blank_values() {
        std::env::set_var("OPENAI_API_KEY", "   ");
        std::env::set_var("OPENAI_MODEL", "");

        let config = GatewayConfig::from_env();
        assert!(config.api_key.is_none());
        assert_eq!(config.model, "gpt-3.5-turbo");

        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("OPENAI_MODEL");
    }

    #[test]
    fn test_build_gateway_requires_api_key() {
        let config = GatewayConfig::default();
        let result = config.build_gateway();
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_parse_image_size_accepts_supported_labels() {
        for label in SUPPORTED_IMAGE_SIZES {
            assert!(parse_image_size(label).is_some(), "rejected {}", label);
        }
        assert!(parse_image_size("640x480").is_none());
    }

    #[test]
    fn test_parse_image_quality() {
        assert!(parse_image_quality("standard").is_some());
        assert!(parse_image_quality("hd").is_some());
        assert!(parse_image_quality("ultra").is_none());
    }
}
