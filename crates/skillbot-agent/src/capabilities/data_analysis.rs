//! Data analysis capability — the `data_analysis` delegation tool plus
//! loaded-file schema tracking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use skillbot_core::types::{ScratchState, ToolCall};
use tracing::debug;

use super::Capability;
use crate::subagent::{DataAnalysisDelegator, DataAnalysisTool, SummaryInbox};
use crate::tools::Tool;

pub struct DataAnalysisCapability {
    delegator: Arc<DataAnalysisDelegator>,
    inbox: SummaryInbox,
}

impl DataAnalysisCapability {
    pub fn new(delegator: Arc<DataAnalysisDelegator>) -> Self {
        Self {
            delegator,
            inbox: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Capability for DataAnalysisCapability {
    fn name(&self) -> &str {
        "data_analysis"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(DataAnalysisTool::new(
            self.delegator.clone(),
            self.inbox.clone(),
        ))]
    }

    /// Schemas of files analyzed earlier in the thread.
    fn prompt_section(&self, scratch: &ScratchState) -> Option<String> {
        let files = scratch.loaded_files().filter(|f| !f.is_empty())?;
        let mut lines = vec!["## Loaded Data Files".to_string()];
        for (path, summary) in files {
            lines.push(describe_file(path, summary));
        }
        Some(lines.join("\n"))
    }

    fn observe(&self, call: &ToolCall, _result: &str, scratch: &mut ScratchState) {
        if call.name() != "data_analysis" {
            return;
        }
        let Some(path) = call
            .parse_arguments()
            .ok()
            .and_then(|args| args.get("file_path").and_then(Value::as_str).map(str::to_string))
        else {
            return;
        };
        let summary = self
            .inbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&path);
        if let Some(summary) = summary {
            debug!(file = %path, "recording loaded file schema");
            scratch.record_loaded_file(path, summary);
        }
    }
}

/// `- path: N rows; columns: a (int64), b (object)`
fn describe_file(path: &str, summary: &Value) -> String {
    let rows = summary["shape"]["rows"].as_u64().unwrap_or(0);
    let columns = summary["columns"]
        .as_object()
        .map(|cols| {
            cols.iter()
                .map(|(name, ty)| format!("{name} ({})", ty.as_str().unwrap_or("?")))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    format!("- `{path}`: {rows} rows; columns: {columns}")
}
