//! Agent callbacks — interface-agnostic hooks for human interaction.
//!
//! The orchestrator never talks to a terminal directly. Front ends (the CLI
//! today) implement [`AgentCallback`] to display tool activity and to answer
//! approval requests.

use async_trait::async_trait;
use serde_json::{Map, Value};

use skillbot_core::types::PendingApproval;

#[async_trait]
pub trait AgentCallback: Send + Sync {
    /// Ask a human whether the gated call may run.
    ///
    /// `command` is the display label (the call's `command` argument, or a
    /// fixed label when it has none). `None` means the prompt was cancelled,
    /// which is treated as a rejection.
    async fn request_approval(&self, command: &str, pending: &PendingApproval) -> Option<bool>;

    /// A tool is about to run.
    fn on_tool_call(&self, _tool: &str, _args: &Map<String, Value>) {}

    /// A tool finished.
    fn on_tool_result(&self, _tool: &str, _result: &str) {}

    fn on_progress(&self, _message: &str) {}

    fn on_error(&self, _error: &str) {}
}

/// Callback with no UI. Rejects every approval request.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCallback;

#[async_trait]
impl AgentCallback for NoopCallback {
    async fn request_approval(&self, _command: &str, _pending: &PendingApproval) -> Option<bool> {
        None
    }
}
