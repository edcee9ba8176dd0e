//! HTTP LLM provider for OpenAI-compatible APIs.
//!
//! Talks directly to a `/chat/completions` endpoint. The default endpoint is
//! a local Ollama server (`http://localhost:11434/v1`), but any compatible
//! server works (vLLM, llama.cpp server, hosted APIs).

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::OnceLock;
use tracing::{debug, error, warn};

use skillbot_core::config::schema::ProviderConfig;
use skillbot_core::types::{
    ChatCompletionRequest, ChatCompletionResponse, LlmResponse, Message, ToolDefinition,
};

use crate::traits::{LlmProvider, LlmRequestConfig};

// ─────────────────────────────────────────────
// HttpProvider
// ─────────────────────────────────────────────

/// A provider that talks to any OpenAI-compatible HTTP API.
pub struct HttpProvider {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL (e.g. `"http://localhost:11434/v1"`).
    api_base: String,
    /// Bearer token; omitted from requests when empty.
    api_key: String,
    default_model: String,
    extra_headers: HeaderMap,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("api_base", &self.api_base)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl HttpProvider {
    /// Create a provider from endpoint config and a default model.
    pub fn new(config: &ProviderConfig, model: &str) -> anyhow::Result<Self> {
        let mut extra_headers = HeaderMap::new();
        if let Some(ref headers) = config.extra_headers {
            for (key, value) in headers {
                if let (Ok(name), Ok(val)) = (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    extra_headers.insert(name, val);
                } else {
                    warn!("Invalid header: {}={}", key, value);
                }
            }
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(HttpProvider {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            default_model: model.to_string(),
            extra_headers,
        })
    }

    /// Build the full chat completions URL.
    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }
}

/// Remove `<think>...</think>` blocks that reasoning models (Qwen3,
/// DeepSeek-R1) inline in their answers.
fn strip_think_blocks(content: &str) -> String {
    static THINK: OnceLock<Option<Regex>> = OnceLock::new();
    let re = THINK.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").ok());
    match re {
        Some(re) => re.replace_all(content, "").trim().to_string(),
        None => content.trim().to_string(),
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        model: &str,
        config: &LlmRequestConfig,
    ) -> anyhow::Result<LlmResponse> {
        debug!(
            model = %model,
            messages = messages.len(),
            tools = tools.map_or(0, |t| t.len()),
            "Calling LLM"
        );

        let tools = tools.filter(|t| !t.is_empty());
        let request_body = ChatCompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            tools: tools.map(|t| t.to_vec()),
            tool_choice: tools.map(|_| "auto".to_string()),
            max_tokens: config.max_tokens,
            temperature: Some(config.temperature),
        };

        let mut request = self
            .client
            .post(self.completions_url())
            .headers(self.extra_headers.clone())
            .json(&request_body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(api_base = %self.api_base, error = %e, "HTTP request failed");
            anyhow!("Error calling LLM at {}: {}", self.api_base, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(status = %status, body = %error_text, "API error");
            bail!("Error calling LLM: {} - {}", status, error_text);
        }

        let chat_resp = response
            .json::<ChatCompletionResponse>()
            .await
            .context("Error parsing LLM response")?;

        let mut llm_resp = chat_resp
            .into_response()
            .ok_or_else(|| anyhow!("No choices in LLM response"))?;
        llm_resp.content = llm_resp
            .content
            .map(|c| strip_think_blocks(&c))
            .filter(|c| !c.is_empty());

        debug!(
            has_content = llm_resp.content.is_some(),
            tool_calls = llm_resp.tool_calls.len(),
            finish_reason = llm_resp.finish_reason.as_deref().unwrap_or("?"),
            "LLM response received"
        );
        Ok(llm_resp)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn display_name(&self) -> &str {
        "OpenAI-compatible"
    }
}

// ─────────────────────────────────────────────
// Builder (convenience)
// ─────────────────────────────────────────────

/// Build the provider for the configured endpoint and model.
pub fn create_provider(
    config: &skillbot_core::config::Config,
) -> anyhow::Result<HttpProvider> {
    debug!(
        model = %config.agent.model,
        api_base = %config.provider.api_base,
        "Creating LLM provider"
    );
    HttpProvider::new(&config.provider, &config.agent.model)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
