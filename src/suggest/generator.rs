//! Text generation client
//!
//! The suggestion service asks a [`TextGenerator`] for a structured answer
//! matching a declared JSON schema. [`AnthropicGenerator`] implements it on
//! the Anthropic Messages API by forcing a single tool call whose input
//! schema is the response schema.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GeneratorConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Response contained no structured output")]
    NoStructuredOutput,

    #[error("Response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A named JSON schema the answer must conform to
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce one structured answer; a single attempt, no retries
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<Value, GenerationError>;
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    ToolUse { name: String, input: Value },
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Anthropic Messages API backend
#[derive(Clone)]
pub struct AnthropicGenerator {
    client: Client,
    config: GeneratorConfig,
}

impl AnthropicGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerationError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn request_body(&self, system_prompt: &str, user_prompt: &str, schema: &ResponseSchema) -> Value {
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "system": system_prompt,
            "messages": [{ "role": "user", "content": user_prompt }],
            "tools": [{
                "name": schema.name,
                "description": schema.description,
                "input_schema": schema.schema,
            }],
            "tool_choice": { "type": "tool", "name": schema.name },
        })
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<Value, GenerationError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingApiKey)?;

        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(system_prompt, user_prompt, schema))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let message: MessagesResponse = serde_json::from_str(&response.text().await?)?;
        extract_tool_input(message, &schema.name)
    }
}

/// Pick the input of the tool call named after the schema
fn extract_tool_input(message: MessagesResponse, tool_name: &str) -> Result<Value, GenerationError> {
    let mut found = None;
    for block in message.content {
        match block {
            ContentBlock::ToolUse { name, input } if name == tool_name => {
                found = Some(input);
                break;
            }
            ContentBlock::ToolUse { name, .. } => warn!("Ignoring call to unexpected tool '{}'", name),
            ContentBlock::Text { text } => debug!("Model commentary: {}", text),
            ContentBlock::Other => {}
        }
    }
    found.ok_or(GenerationError::NoStructuredOutput)
}
