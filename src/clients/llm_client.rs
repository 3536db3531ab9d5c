//! Generative text client.
//!
//! Wraps an OpenAI-compatible chat-completion endpoint behind a small trait
//! so the resolver can be exercised with a scripted client in tests.

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::debug;

use crate::config::Config;
use crate::error::{EngineError, Result};

#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Single-turn completion; returns the trimmed response text.
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String>;
}

/// OpenAI-compatible chat client.
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Self {
        let api_config = OpenAIConfig::new()
            .with_api_key(config.llm_api_key.clone())
            .with_api_base(config.llm_api_base_url.clone());
        Self {
            client: Client::with_config(api_config),
            model: config.llm_model_name.clone(),
        }
    }
}

#[async_trait]
impl GenerativeClient for OpenAiClient {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        debug!("calling generative service, model: {}", self.model);

        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| EngineError::Generative {
                        model: self.model.clone(),
                        detail: e.to_string(),
                    })?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| EngineError::Generative {
                    model: self.model.clone(),
                    detail: e.to_string(),
                })?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()
            .map_err(|e| EngineError::Generative {
                model: self.model.clone(),
                detail: e.to_string(),
            })?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| EngineError::Generative {
                model: self.model.clone(),
                detail: e.to_string(),
            })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| EngineError::Generative {
                model: self.model.clone(),
                detail: "empty response".to_string(),
            })?;

        Ok(content.trim().to_string())
    }
}
