//! Concrete `LLMClient` implementations for Gemini, Claude and OpenAI.
//!
//! Per-provider SDK features are out of scope; each client here only
//! implements the single `generate` contract, following the request/
//! response handling shape of `tradocflow-core/src/gui/client.rs`'s
//! `ApiClient` (a `reqwest::Client` field, a `{base_url}{path}` request
//! builder, `response.status().is_success()` before decoding JSON).
//! Images attached by `ContextAssembler` are base64-encoded per each
//! provider's own multimodal content format.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::{ApiKeyConfig, ProviderHint};
use crate::context_assembler::ContentItem;
use crate::error::{CoreError, Result};
use crate::llm::client::LLMClient;

/// Build the concrete client for `provider`/`model` from whichever key
/// `ApiKeyConfig` has loaded, per spec §6's provider-alias table.
pub fn build_client(keys: &ApiKeyConfig, provider: ProviderHint, model: &str) -> Result<Arc<dyn LLMClient>> {
    match provider {
        ProviderHint::Gemini => {
            let key = keys.google.clone().ok_or_else(|| CoreError::MissingResource("no Gemini API key configured".to_string()))?;
            Ok(Arc::new(GeminiClient::new(key, model)))
        }
        ProviderHint::Claude => {
            let key = keys.claude.clone().ok_or_else(|| CoreError::MissingResource("no Claude API key configured".to_string()))?;
            Ok(Arc::new(ClaudeClient::new(key, model)))
        }
        ProviderHint::OpenAi => {
            let key = keys.openai.clone().ok_or_else(|| CoreError::MissingResource("no OpenAI API key configured".to_string()))?;
            Ok(Arc::new(OpenAiClient::new(key, model)))
        }
    }
}

fn join_text_for_log(content: &[ContentItem]) -> String {
    content
        .iter()
        .filter_map(|c| match c {
            ContentItem::Text(t) => Some(t.as_str()),
            ContentItem::Image { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Google Gemini `generateContent` over the `v1beta` REST API.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), model: model.into() }
    }

    fn parts(content: &[ContentItem]) -> Vec<Value> {
        content
            .iter()
            .map(|item| match item {
                ContentItem::Text(text) => json!({ "text": text }),
                ContentItem::Image { bytes, mime } => json!({
                    "inline_data": { "mime_type": mime, "data": BASE64.encode(bytes) }
                }),
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LLMClient for GeminiClient {
    async fn generate(&self, content: &[ContentItem]) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = json!({ "contents": [{ "parts": Self::parts(content) }] });

        log::debug!("gemini request: {}", join_text_for_log(content));
        let response = self.client.post(&url).json(&body).send().await.map_err(|e| CoreError::LLMCallFailure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::LLMCallFailure(format!("gemini returned {}", response.status())));
        }

        let parsed: GeminiResponse = response.json().await.map_err(|e| CoreError::LLMCallFailure(e.to_string()))?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect::<String>())
            .ok_or_else(|| CoreError::LLMCallFailure("gemini returned no candidates".to_string()))?;
        Ok(text)
    }
}

/// Anthropic Claude `messages` API.
pub struct ClaudeClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), model: model.into(), max_tokens: 8192 }
    }

    fn blocks(content: &[ContentItem]) -> Vec<Value> {
        content
            .iter()
            .map(|item| match item {
                ContentItem::Text(text) => json!({ "type": "text", "text": text }),
                ContentItem::Image { bytes, mime } => json!({
                    "type": "image",
                    "source": { "type": "base64", "media_type": mime, "data": BASE64.encode(bytes) }
                }),
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeBlock>,
}

#[derive(Deserialize)]
struct ClaudeBlock {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LLMClient for ClaudeClient {
    async fn generate(&self, content: &[ContentItem]) -> Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": Self::blocks(content) }],
        });

        log::debug!("claude request: {}", join_text_for_log(content));
        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::LLMCallFailure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::LLMCallFailure(format!("claude returned {}", response.status())));
        }

        let parsed: ClaudeResponse = response.json().await.map_err(|e| CoreError::LLMCallFailure(e.to_string()))?;
        let text = parsed.content.into_iter().map(|b| b.text).collect::<String>();
        if text.is_empty() {
            return Err(CoreError::LLMCallFailure("claude returned no content".to_string()));
        }
        Ok(text)
    }
}

/// OpenAI `chat/completions` API.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), model: model.into() }
    }

    fn parts(content: &[ContentItem]) -> Vec<Value> {
        content
            .iter()
            .map(|item| match item {
                ContentItem::Text(text) => json!({ "type": "text", "text": text }),
                ContentItem::Image { bytes, mime } => json!({
                    "type": "image_url",
                    "image_url": { "url": format!("data:{mime};base64,{}", BASE64.encode(bytes)) }
                }),
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl LLMClient for OpenAiClient {
    async fn generate(&self, content: &[ContentItem]) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": Self::parts(content) }],
        });

        log::debug!("openai request: {}", join_text_for_log(content));
        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::LLMCallFailure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::LLMCallFailure(format!("openai returned {}", response.status())));
        }

        let parsed: OpenAiResponse = response.json().await.map_err(|e| CoreError::LLMCallFailure(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CoreError::LLMCallFailure("openai returned no choices".to_string()))?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_parts_encode_images_as_inline_base64() {
        let content = vec![ContentItem::Text("hello".to_string()), ContentItem::Image { bytes: vec![1, 2, 3], mime: "image/png" }];
        let parts = GeminiClient::parts(&content);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], "hello");
        assert!(parts[1]["inline_data"]["data"].as_str().unwrap().len() > 0);
    }

    #[test]
    fn claude_blocks_tag_images_with_source_type_base64() {
        let content = vec![ContentItem::Image { bytes: vec![9, 9, 9], mime: "image/png" }];
        let blocks = ClaudeClient::blocks(&content);
        assert_eq!(blocks[0]["type"], "image");
        assert_eq!(blocks[0]["source"]["type"], "base64");
    }

    #[test]
    fn openai_parts_use_data_uri_for_images() {
        let content = vec![ContentItem::Image { bytes: vec![7, 7], mime: "image/jpeg" }];
        let parts = OpenAiClient::parts(&content);
        let url = parts[0]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }
}
