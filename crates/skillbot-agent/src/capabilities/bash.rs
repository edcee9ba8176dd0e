//! Bash capability — shell command execution.

use std::sync::Arc;

use super::Capability;
use crate::runner::ScriptRunner;
use crate::tools::{BashTool, Tool};

pub struct BashCapability {
    tool: Arc<BashTool>,
}

impl BashCapability {
    pub fn new(runner: ScriptRunner, timeout_secs: u64) -> Self {
        Self {
            tool: Arc::new(BashTool::new(runner, Some(timeout_secs))),
        }
    }
}

impl Capability for BashCapability {
    fn name(&self) -> &str {
        "bash"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![self.tool.clone()]
    }
}
