use std::sync::Arc;

use anyhow::Context;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::{config::OpenAIConfig, Client as AsyncOpenAiClient};
use async_trait::async_trait;
use tracing::instrument;

use crate::config::Settings;

pub type SharedLlmClient = Arc<dyn LlmClient>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// OpenAI-compatible chat client; also talks to Ollama's `/v1` surface in the local profile.
pub struct OpenAiLlmClient {
    client: AsyncOpenAiClient<OpenAIConfig>,
    model: String,
    system_prompt: String,
}

impl OpenAiLlmClient {
    const DEFAULT_SYSTEM_PROMPT: &'static str =
        "You are part of a legal document analysis team. Format answers in Markdown.";

    pub fn new(api_key: &str, settings: &Settings) -> Self {
        Self {
            client: AsyncOpenAiClient::with_config(openai_config(api_key, settings)),
            model: settings.chat_model.clone(),
            system_prompt: Self::DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn shared(api_key: &str, settings: &Settings) -> SharedLlmClient {
        Arc::new(Self::new(api_key, settings))
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn chat(&self, prompt: &str) -> anyhow::Result<String> {
        let system_message = ChatCompletionRequestSystemMessageArgs::default()
            .content(&self.system_prompt)
            .build()?;

        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![system_message.into(), user_message.into()])
            .build()?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .with_context(|| format!("chat completion with model '{}' failed", self.model))?;
        let choice = response
            .choices
            .first()
            .context("LLM response did not contain any choices")?;

        Ok(choice.message.content.clone().unwrap_or_default())
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.chat(prompt).await
    }
}

pub fn openai_config(api_key: &str, settings: &Settings) -> OpenAIConfig {
    let config = OpenAIConfig::new().with_api_key(api_key);
    match &settings.llm_base_url {
        Some(base_url) => config.with_api_base(base_url),
        None => config,
    }
}
