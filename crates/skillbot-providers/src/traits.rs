//! LLM Provider trait — the model collaborator boundary.
//!
//! The orchestrator treats the model as an opaque function from (messages,
//! tool schemas) to either a final answer or a list of tool calls. The
//! `HttpProvider` in `http_provider.rs` covers any OpenAI-compatible API.

use async_trait::async_trait;
use skillbot_core::types::{LlmResponse, Message, ToolDefinition};

/// Configuration passed to each LLM call.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    /// Maximum tokens to generate (endpoint default when `None`).
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: f64,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: None,
            temperature: 0.0,
        }
    }
}

/// Trait that all LLM providers must implement.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request.
    ///
    /// # Arguments
    /// * `messages` — System prompt followed by the thread's turns.
    /// * `tools`    — Tool definitions the model may call.
    /// * `model`    — Model identifier (e.g. `"qwen3:8b"`).
    /// * `config`   — Temperature, max_tokens.
    ///
    /// # Errors
    /// Transport failures, non-success statuses, and unparseable bodies are
    /// errors: an unreachable model aborts the cycle rather than being fed
    /// back as an answer.
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        model: &str,
        config: &LlmRequestConfig,
    ) -> anyhow::Result<LlmResponse>;

    /// The default model for this provider instance.
    fn default_model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
