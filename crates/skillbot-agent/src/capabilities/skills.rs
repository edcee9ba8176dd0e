//! Skills capability — `view_skill` plus active-skill tracking.

use std::sync::Arc;

use serde_json::json;
use skillbot_core::types::{ScratchState, ToolCall};
use tracing::debug;

use super::Capability;
use crate::skills::SkillCatalog;
use crate::tools::{Tool, ViewSkillTool};

pub struct SkillsCapability {
    catalog: Arc<SkillCatalog>,
}

impl SkillsCapability {
    pub fn new(catalog: Arc<SkillCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &SkillCatalog {
        &self.catalog
    }
}

impl Capability for SkillsCapability {
    fn name(&self) -> &str {
        "skills"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(ViewSkillTool::new(self.catalog.clone()))]
    }

    fn prompt_section(&self, scratch: &ScratchState) -> Option<String> {
        let id = scratch.active_skill()?;
        let name = self
            .catalog
            .get(id)
            .map(|s| s.display_name().to_string())
            .unwrap_or_else(|| id.to_string());
        Some(format!(
            "## Active Skill\nYou have loaded the `{id}` skill ({name}). Follow its instructions; \
             use view_skill with a file argument to read its reference files."
        ))
    }

    /// A successful `view_skill` makes that skill the active one.
    fn observe(&self, call: &ToolCall, result: &str, scratch: &mut ScratchState) {
        if call.name() != "view_skill" || result.starts_with("Error") {
            return;
        }
        let Some(id) = call
            .parse_arguments()
            .ok()
            .and_then(|args| args.get("skill_id").and_then(|v| v.as_str()).map(str::to_string))
        else {
            return;
        };
        if scratch.active_skill() != Some(id.as_str()) {
            debug!(skill = %id, "active skill changed");
            scratch.set(ScratchState::ACTIVE_SKILL, json!(id));
        }
    }
}
