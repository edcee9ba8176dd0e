//! Core types for Skillbot — typed chat messages, tool calls, scratch state,
//! and the suspension record used by the approval protocol.
//!
//! Messages follow the OpenAI chat completions wire format so they can be sent
//! to any compatible endpoint and persisted verbatim in checkpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────
// Messages (OpenAI chat completions format)
// ─────────────────────────────────────────────

/// A single turn in a thread's log.
///
/// Closed set of roles; every consumer matches exhaustively.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "system")]
    System { content: String },

    #[serde(rename = "user")]
    User { content: String },

    #[serde(rename = "assistant")]
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },

    #[serde(rename = "tool")]
    Tool {
        content: String,
        tool_call_id: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Create an assistant message with a final text answer.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: Some(content.into()),
            tool_calls: None,
        }
    }

    /// Create an assistant message requesting tool calls.
    ///
    /// Any text the model produced alongside the calls is kept.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            content,
            tool_calls: Some(tool_calls),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
        }
    }

    /// Role name as it appears on the wire.
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    /// Textual content, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Tool { content, .. } => Some(content),
            Message::Assistant { content, .. } => content.as_deref(),
        }
    }

    /// Tool calls requested by an assistant message (empty for other roles).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant {
                tool_calls: Some(calls),
                ..
            } => calls,
            _ => &[],
        }
    }
}

// ─────────────────────────────────────────────
// Tool Calls (function calling)
// ─────────────────────────────────────────────

/// A tool call from the assistant, requesting execution of a function.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique ID for this tool call (pairs it with its result).
    pub id: String,
    /// Always "function".
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        ToolCall {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Name of the requested capability.
    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Parse the JSON-encoded arguments into a key→value map.
    ///
    /// Empty arguments parse to an empty map; anything that is not a JSON
    /// object is an error.
    pub fn parse_arguments(&self) -> Result<serde_json::Map<String, Value>, String> {
        let raw = self.function.arguments.trim();
        if raw.is_empty() {
            return Ok(serde_json::Map::new());
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(format!("expected a JSON object, got {other}")),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// The function name and arguments within a tool call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments string.
    pub arguments: String,
}

// ─────────────────────────────────────────────
// Tool Definitions (for LLM requests)
// ─────────────────────────────────────────────

/// Definition of a tool, sent to the model so it knows what it may call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

// ─────────────────────────────────────────────
// LLM Response
// ─────────────────────────────────────────────

/// What the model returned for one call: a final answer XOR tool calls.
#[derive(Clone, Debug, Default)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
    pub usage: Option<UsageInfo>,
}

impl LlmResponse {
    /// A plain text answer.
    pub fn text(content: impl Into<String>) -> Self {
        LlmResponse {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// A response that requests the given tool calls.
    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        LlmResponse {
            tool_calls,
            finish_reason: Some("tool_calls".to_string()),
            ..Default::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage statistics from the model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UsageInfo {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ─────────────────────────────────────────────
// Wire types (OpenAI-compatible API)
// ─────────────────────────────────────────────

/// Raw chat completion response, used internally for deserialization.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatCompletionResponse {
    /// Take the first choice. `None` when the endpoint returned no choices.
    pub fn into_response(self) -> Option<LlmResponse> {
        let usage = self.usage;
        self.choices.into_iter().next().map(|c| LlmResponse {
            content: c.message.content,
            tool_calls: c.message.tool_calls.unwrap_or_default(),
            finish_reason: c.finish_reason,
            usage,
        })
    }
}

/// Request body for an OpenAI-compatible chat completion API.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

// ─────────────────────────────────────────────
// Scratch state
// ─────────────────────────────────────────────

/// Per-thread named key→value state that capabilities read and update.
///
/// Persisted with every checkpoint write.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ScratchState(BTreeMap<String, Value>);

impl ScratchState {
    pub const SESSION_SUMMARY: &'static str = "session_summary";
    pub const ACTIVE_SKILL: &'static str = "active_skill";
    pub const LOADED_FILES: &'static str = "loaded_files";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn session_summary(&self) -> Option<&str> {
        self.get_str(Self::SESSION_SUMMARY).filter(|s| !s.is_empty())
    }

    pub fn active_skill(&self) -> Option<&str> {
        self.get_str(Self::ACTIVE_SKILL)
    }

    /// Loaded file schemas keyed by path.
    pub fn loaded_files(&self) -> Option<&serde_json::Map<String, Value>> {
        self.0.get(Self::LOADED_FILES).and_then(Value::as_object)
    }

    /// Record (or replace) the schema summary of a loaded file.
    pub fn record_loaded_file(&mut self, path: impl Into<String>, summary: Value) {
        let entry = self
            .0
            .entry(Self::LOADED_FILES.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(serde_json::Map::new());
        }
        if let Value::Object(map) = entry {
            map.insert(path.into(), summary);
        }
    }
}

// ─────────────────────────────────────────────
// Approval
// ─────────────────────────────────────────────

fn new_approval_id() -> String {
    format!("approval_{}", uuid::Uuid::new_v4().simple())
}

/// Label shown when a gated call's arguments cannot be parsed.
pub const UNKNOWN_COMMAND: &str = "Unknown Command";

/// Human decision on a pending approval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// Parse free-form input. Anything but an explicit approval rejects.
    pub fn parse(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" | "y" | "yes" => Decision::Approve,
            _ => Decision::Reject,
        }
    }

    /// Map a human-decision answer; a missing answer (cancelled) rejects.
    pub fn from_answer(answer: Option<bool>) -> Self {
        match answer {
            Some(true) => Decision::Approve,
            _ => Decision::Reject,
        }
    }
}

/// Suspension record for a thread.
///
/// Holds the whole dispatch batch so no call in it runs before every gated
/// call has a decision. `call` is the gated call currently awaiting one.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PendingApproval {
    /// Approval identifier, minted fresh for each gated call awaiting a
    /// decision. Never the model's call id.
    pub id: String,
    /// The gated call surfaced for display.
    pub call: ToolCall,
    /// The full batch requested by the model, in order.
    pub batch: Vec<ToolCall>,
    /// Ids of every gated call in the batch, in order.
    pub gated: Vec<String>,
    /// Decisions already collected for earlier gated calls.
    #[serde(default)]
    pub decisions: Vec<(String, Decision)>,
}

impl PendingApproval {
    /// Build a record for a batch. Returns `None` when nothing is gated.
    pub fn for_batch(batch: Vec<ToolCall>, gated: Vec<String>) -> Option<Self> {
        let first = gated.first()?;
        let call = batch.iter().find(|c| &c.id == first)?.clone();
        Some(PendingApproval {
            id: new_approval_id(),
            call,
            batch,
            gated,
            decisions: Vec::new(),
        })
    }

    /// Name of the gated capability.
    pub fn tool_name(&self) -> &str {
        self.call.name()
    }

    /// Command text for display: the `command` argument when there is one,
    /// otherwise `name(arguments)`. Malformed arguments degrade to a fixed
    /// label.
    pub fn command_label(&self) -> String {
        let Ok(args) = self.call.parse_arguments() else {
            return UNKNOWN_COMMAND.to_string();
        };
        match args.get("command").and_then(Value::as_str) {
            Some(command) => command.to_string(),
            None => format!("{}({})", self.call.name(), Value::Object(args)),
        }
    }

    /// Record a decision for the current gated call and advance.
    ///
    /// Returns `true` once every gated call in the batch has a decision.
    pub fn record(&mut self, decision: Decision) -> bool {
        self.decisions.push((self.call.id.clone(), decision));
        let next = self
            .gated
            .iter()
            .find(|id| !self.decisions.iter().any(|(done, _)| done == *id))
            .cloned();
        match next.and_then(|id| self.batch.iter().find(|c| c.id == id).cloned()) {
            Some(call) => {
                self.id = new_approval_id();
                self.call = call;
                false
            }
            None => true,
        }
    }

    /// Decision recorded for a call id, if any. Call ids within a batch are
    /// expected to be unique.
    pub fn decision_for(&self, call_id: &str) -> Option<Decision> {
        self.decisions
            .iter()
            .find(|(id, _)| id == call_id)
            .map(|(_, d)| *d)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
