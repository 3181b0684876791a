//! Anthropic-backed LLM provider and a scripted mock for tests

use catalogchat_core::config::LlmConfig;
use catalogchat_core::error::{Error, Result};
use catalogchat_core::traits::{LlmProvider, LlmResponse, LlmUsage};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// LLM provider over the Anthropic API
pub struct AnthropicProvider {
    client: Arc<claudius::Anthropic>,
    model: claudius::Model,
    model_name: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| Error::config("LLM API key not configured"))?;

        let client = claudius::Anthropic::new(Some(api_key))
            .map_err(|e| Error::config(format!("Failed to create Anthropic client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            model: claudius::Model::Custom(config.model.clone()),
            model_name: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    async fn send(&self, system: Option<&str>, prompt: &str) -> Result<LlmResponse> {
        let mut params = claudius::MessageCreateParams::simple(
            claudius::MessageParam::user(prompt.to_string()),
            self.model.clone(),
        );
        params.max_tokens = self.max_tokens as _;
        params.temperature = Some(0.0);

        if let Some(system) = system {
            params = params.with_system_blocks(vec![claudius::TextBlock::new(system.to_string())]);
        }

        let response = self
            .client
            .send(params)
            .await
            .map_err(|e| Error::llm(format!("Anthropic API call failed: {e}")))?;

        let text = response
            .content
            .iter()
            .filter_map(|block| match block {
                claudius::ContentBlock::Text(text_block) => Some(text_block.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        let usage = LlmUsage {
            input_tokens: response.usage.input_tokens as u64,
            output_tokens: response.usage.output_tokens as u64,
        };

        debug!(
            "LLM call completed: {} in / {} out tokens",
            usage.input_tokens, usage.output_tokens
        );

        Ok(LlmResponse {
            text,
            model: self.model_name.clone(),
            usage: Some(usage),
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse> {
        self.send(None, prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<LlmResponse> {
        self.send(Some(system), prompt).await
    }
}

/// Scripted LLM provider for tests
///
/// Pops one queued reply per call; an exhausted script or a queued
/// `Err` surfaces as an LLM error, which exercises the degradation
/// paths of every caller.
#[derive(Default)]
pub struct MockLlmProvider {
    replies: std::sync::Mutex<std::collections::VecDeque<std::result::Result<String, String>>>,
    prompts: std::sync::Mutex<Vec<String>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn push_reply(&self, text: impl Into<String>) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(text.into()));
    }

    /// Queue a failing call
    pub fn push_error(&self, message: impl Into<String>) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(message.into()));
    }

    /// Prompts seen so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next(&self, prompt: &str) -> Result<LlmResponse> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        let next = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            Some(Ok(text)) => Ok(LlmResponse {
                text,
                model: "mock-model".to_string(),
                usage: Some(LlmUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                }),
            }),
            Some(Err(message)) => Err(Error::llm(message)),
            None => Err(Error::llm("mock script exhausted")),
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse> {
        self.next(prompt)
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<LlmResponse> {
        self.next(&format!("{system}\n{prompt}"))
    }
}
