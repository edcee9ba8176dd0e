//! Test doubles shared by the agent crate's unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use skillbot_core::types::{LlmResponse, Message, ToolCall, ToolDefinition};
use skillbot_providers::traits::{LlmProvider, LlmRequestConfig};

use crate::capabilities::Capability;
use crate::tools::Tool;

/// Provider that replays scripted responses and records every request.
pub struct MockProvider {
    responses: Mutex<Vec<Result<LlmResponse, String>>>,
    pub requests: Mutex<Vec<Vec<Message>>>,
    pub tool_names: Mutex<Vec<Vec<String>>>,
}

impl MockProvider {
    pub fn new(responses: Vec<LlmResponse>) -> Arc<Self> {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    pub fn scripted(responses: Vec<Result<LlmResponse, String>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            tool_names: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, n: usize) -> Vec<Message> {
        self.requests.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        _model: &str,
        _config: &LlmRequestConfig,
    ) -> anyhow::Result<LlmResponse> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.tool_names.lock().unwrap().push(
            tools
                .unwrap_or_default()
                .iter()
                .map(|t| t.function.name.clone())
                .collect(),
        );

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(LlmResponse::text("(no more responses)"));
        }
        responses.remove(0).map_err(|e| anyhow::anyhow!(e))
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    fn display_name(&self) -> &str {
        "MockProvider"
    }
}

/// A model turn requesting one tool call.
pub fn call(id: &str, name: &str, args: Value) -> ToolCall {
    ToolCall::new(id, name, args.to_string())
}

/// Tool that counts executions and echoes its `command` argument.
pub struct CountingTool {
    name: String,
    pub count: AtomicUsize,
}

impl CountingTool {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            count: AtomicUsize::new(0),
        })
    }

    pub fn runs(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Counts invocations"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"command": {"type": "string"}},
            "required": []
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        let command = params
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or("");
        Ok(format!("{} #{n}: {command}", self.name))
    }
}

/// Capability that only contributes a fixed set of tools.
pub struct StaticTools(pub Vec<Arc<dyn Tool>>);

impl Capability for StaticTools {
    fn name(&self) -> &str {
        "static_tools"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.0.clone()
    }
}
