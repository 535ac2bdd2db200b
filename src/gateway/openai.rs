use super::*;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateImageRequestArgs, Image, ImageResponseFormat,
    },
    Client,
};

use crate::types::{Message, MessageContent, MessageRole, TokenUsage};

/// OpenAI-compatible provider implementation
pub struct OpenAiGateway {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiGateway {
    /// Create a gateway from the given config and API key
    pub fn new(config: &GatewayConfig, api_key: String) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = &config.api_base {
            openai_config = openai_config.with_api_base(base);
        }

        Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Map stored history into provider chat turns, preamble first.
    ///
    /// Image entries carry no text and are skipped.
    fn wire_history(history: &[Message]) -> GatewayResult<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::with_capacity(history.len() + 1);

        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PREAMBLE)
                .build()
                .map_err(|e| GatewayError::Upstream(e.to_string()))?
                .into(),
        );

        for message in history {
            let MessageContent::Text { text } = &message.content else {
                continue;
            };

            let wire = match message.role {
                MessageRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(text.as_str())
                    .build()
                    .map_err(|e| GatewayError::Upstream(e.to_string()))?
                    .into(),
                MessageRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(text.as_str())
                    .build()
                    .map_err(|e| GatewayError::Upstream(e.to_string()))?
                    .into(),
            };
            messages.push(wire);
        }

        Ok(messages)
    }
}

#[async_trait]
impl AiGateway for OpenAiGateway {
    async fn complete(&self, history: &[Message], options: ChatOptions) -> GatewayResult<Message> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(options.model.as_deref().unwrap_or(&self.model))
            .temperature(options.temperature.unwrap_or(self.temperature))
            .max_tokens(options.max_tokens.unwrap_or(self.max_tokens))
            .messages(Self::wire_history(history)?)
            .build()
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();
        let content = content.trim();
        if content.is_empty() {
            return Err(GatewayError::GeneratedEmpty);
        }

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(Message::assistant(
            content.to_string(),
            Some(response.model.clone()),
            usage,
        ))
    }

    async fn generate_image(
        &self,
        prompt: &str,
        options: ImageOptions,
    ) -> GatewayResult<Message> {
        let size_label = options.size.as_deref().unwrap_or(DEFAULT_IMAGE_SIZE);
        let size = parse_image_size(size_label)
            .ok_or_else(|| GatewayError::Config(format!("unsupported image size: {size_label}")))?;

        let quality_label = options.quality.as_deref().unwrap_or(DEFAULT_IMAGE_QUALITY);
        let quality = parse_image_quality(quality_label).ok_or_else(|| {
            GatewayError::Config(format!("unsupported image quality: {quality_label}"))
        })?;

        let request = CreateImageRequestArgs::default()
            .prompt(prompt)
            .n(1)
            .size(size)
            .quality(quality)
            .response_format(ImageResponseFormat::B64Json)
            .build()
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        let response = self
            .client
            .images()
            .create(request)
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        let payload = response
            .data
            .first()
            .and_then(|image| match image.as_ref() {
                Image::B64Json { b64_json, .. } => Some(b64_json.as_str().to_string()),
                Image::Url { .. } => None,
            })
            .filter(|b64| !b64.is_empty())
            .ok_or(GatewayError::GeneratedEmpty)?;

        Ok(Message::image(
            prompt.to_string(),
            format!("data:image/png;base64,{payload}"),
            size_label.to_string(),
        ))
    }

    fn name(&self) -> &str {
        "openai"
    }
}
