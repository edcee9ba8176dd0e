//! Capability pipeline — ordered providers of tools, prompt state, and call
//! interception.
//!
//! A [`Capability`] is a self-contained unit: it may contribute tools, inject
//! read-only state into the system prompt, intercept calls before they run,
//! and observe results to update thread scratch state.
//!
//! The [`CapabilityChain`] holds capabilities in an explicit order. Approval
//! gating comes first, then knowledge/state providers, then execution
//! providers. When classifying a call, the first capability that does not
//! return [`Interception::Proceed`] decides.

pub mod approval;
pub mod bash;
pub mod data_analysis;
pub mod file_search;
pub mod skills;

use std::path::PathBuf;
use std::sync::Arc;

use skillbot_core::config::schema::Config;
use skillbot_core::types::{ScratchState, ToolCall, ToolDefinition};
use skillbot_core::utils::expand_home;
use skillbot_providers::traits::LlmProvider;
use tracing::debug;

use crate::runner::ScriptRunner;
use crate::skills::SkillCatalog;
use crate::subagent::DataAnalysisDelegator;
use crate::tools::{Tool, ToolRegistry};

pub use approval::ApprovalGate;
pub use bash::BashCapability;
pub use data_analysis::DataAnalysisCapability;
pub use file_search::FileSearchCapability;
pub use skills::SkillsCapability;

// ─────────────────────────────────────────────
// Capability trait
// ─────────────────────────────────────────────

/// What a capability wants done with a call before it runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interception {
    /// Let later capabilities (and finally the tool) see the call.
    Proceed,
    /// Suspend the batch until a human decides on this call.
    RequireApproval,
}

pub trait Capability: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Tools this capability contributes.
    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        Vec::new()
    }

    /// Section appended to the system prompt, if there is state to show.
    fn prompt_section(&self, _scratch: &ScratchState) -> Option<String> {
        None
    }

    /// Classify a call before it is dispatched.
    fn intercept(&self, _call: &ToolCall) -> Interception {
        Interception::Proceed
    }

    /// See an executed call and its result; may update scratch state.
    fn observe(&self, _call: &ToolCall, _result: &str, _scratch: &mut ScratchState) {}
}

// ─────────────────────────────────────────────
// CapabilityChain
// ─────────────────────────────────────────────

/// Fixed-order list of capabilities plus the registry built from their tools.
pub struct CapabilityChain {
    capabilities: Vec<Arc<dyn Capability>>,
    registry: ToolRegistry,
}

impl CapabilityChain {
    /// Build the chain. Tools are registered in capability order, so a later
    /// capability's tool replaces an earlier one with the same name.
    pub fn new(capabilities: Vec<Arc<dyn Capability>>) -> Self {
        let mut registry = ToolRegistry::new();
        for cap in &capabilities {
            for tool in cap.tools() {
                debug!(capability = cap.name(), tool = tool.name(), "capability tool");
                registry.register(tool);
            }
        }
        Self {
            capabilities,
            registry,
        }
    }

    /// The standard chain: approval gate, skills, file search, bash, data
    /// analysis.
    pub fn standard(
        config: &Config,
        provider: Arc<dyn LlmProvider>,
        catalog: Arc<SkillCatalog>,
    ) -> Self {
        let tools = &config.tools;
        let runner = ScriptRunner::new(&tools.data_analysis.interpreter);
        let delegator = DataAnalysisDelegator::from_config(provider, config);
        let search_root: PathBuf = expand_home(&tools.file_search_root);

        Self::new(vec![
            Arc::new(ApprovalGate::new(tools.gated_tools.iter().cloned())),
            Arc::new(SkillsCapability::new(catalog)),
            Arc::new(FileSearchCapability::new(search_root)),
            Arc::new(BashCapability::new(runner, tools.bash.timeout)),
            Arc::new(DataAnalysisCapability::new(Arc::new(delegator))),
        ])
    }

    pub fn names(&self) -> Vec<&str> {
        self.capabilities.iter().map(|c| c.name()).collect()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.get_definitions()
    }

    /// Ids of the calls in `batch` that require approval, in batch order.
    pub fn classify(&self, batch: &[ToolCall]) -> Vec<String> {
        batch
            .iter()
            .filter(|call| {
                self.capabilities
                    .iter()
                    .map(|cap| cap.intercept(call))
                    .find(|i| *i != Interception::Proceed)
                    == Some(Interception::RequireApproval)
            })
            .map(|call| call.id.clone())
            .collect()
    }

    /// Execute one call through the registry.
    pub async fn dispatch(&self, call: &ToolCall) -> String {
        self.registry.execute_call(call).await
    }

    /// Let every capability see an executed call.
    pub fn observe(&self, call: &ToolCall, result: &str, scratch: &mut ScratchState) {
        for cap in &self.capabilities {
            cap.observe(call, result, scratch);
        }
    }

    pub fn prompt_sections(&self, scratch: &ScratchState) -> Vec<String> {
        self.capabilities
            .iter()
            .filter_map(|cap| cap.prompt_section(scratch))
            .collect()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{call, CountingTool, MockProvider};
    use serde_json::json;

    struct Fixed {
        tool: Arc<CountingTool>,
    }

    impl Capability for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn tools(&self) -> Vec<Arc<dyn Tool>> {
            vec![self.tool.clone()]
        }
        fn prompt_section(&self, scratch: &ScratchState) -> Option<String> {
            scratch.get_str("note").map(|n| format!("Note: {n}"))
        }
        fn observe(&self, call: &ToolCall, _result: &str, scratch: &mut ScratchState) {
            scratch.set("note", json!(call.name()));
        }
    }

    fn chain() -> CapabilityChain {
        CapabilityChain::new(vec![
            Arc::new(ApprovalGate::new(["bash".to_string()])),
            Arc::new(Fixed {
                tool: CountingTool::new("bash"),
            }),
            Arc::new(Fixed {
                tool: CountingTool::new("view"),
            }),
        ])
    }

    #[test]
    fn test_classify_flags_only_gated_calls() {
        let batch = vec![
            call("a", "view", json!({})),
            call("b", "bash", json!({"command": "ls"})),
            call("c", "bash", json!({"command": "pwd"})),
        ];
        assert_eq!(chain().classify(&batch), vec!["b", "c"]);
    }

    #[test]
    fn test_definitions_come_from_all_capabilities() {
        let names: Vec<String> = chain()
            .definitions()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(names, vec!["bash", "view"]);
    }

    #[test]
    fn test_observe_and_prompt_sections() {
        let chain = chain();
        let mut scratch = ScratchState::new();
        assert!(chain.prompt_sections(&scratch).is_empty());

        chain.observe(&call("x", "view", json!({})), "ok", &mut scratch);
        assert_eq!(chain.prompt_sections(&scratch), vec!["Note: view", "Note: view"]);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool_is_text() {
        let out = chain().dispatch(&call("z", "nope", json!({}))).await;
        assert!(out.starts_with("Error: Tool 'nope' not found."));
    }

    #[test]
    fn test_standard_chain_order_and_tools() {
        let skills = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.tools.file_search_root = skills.path().to_string_lossy().to_string();
        let chain = CapabilityChain::standard(
            &config,
            MockProvider::new(vec![]),
            Arc::new(SkillCatalog::from_dir(skills.path())),
        );

        assert_eq!(
            chain.names(),
            vec!["approval_gate", "skills", "file_search", "bash", "data_analysis"]
        );
        assert_eq!(
            chain.registry().tool_names(),
            vec!["bash", "data_analysis", "glob_search", "grep_search", "view_skill"]
        );
        assert_eq!(
            chain.classify(&[call("1", "bash", json!({"command": "ls"}))]),
            vec!["1"]
        );
    }
}
