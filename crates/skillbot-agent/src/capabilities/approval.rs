//! Approval gate — suspends batches that contain designated tool calls.

use std::collections::HashSet;

use skillbot_core::types::ToolCall;
use tracing::debug;

use super::{Capability, Interception};

/// Flags every call to a gated tool name as requiring a human decision.
///
/// Contributes no tools. Sits first in the chain so no other capability can
/// wave a gated call through.
pub struct ApprovalGate {
    gated: HashSet<String>,
}

impl ApprovalGate {
    pub fn new(gated: impl IntoIterator<Item = String>) -> Self {
        Self {
            gated: gated.into_iter().collect(),
        }
    }

    pub fn is_gated(&self, tool: &str) -> bool {
        self.gated.contains(tool)
    }
}

impl Capability for ApprovalGate {
    fn name(&self) -> &str {
        "approval_gate"
    }

    fn intercept(&self, call: &ToolCall) -> Interception {
        if self.is_gated(call.name()) {
            debug!(tool = call.name(), call_id = %call.id, "call requires approval");
            Interception::RequireApproval
        } else {
            Interception::Proceed
        }
    }
}
