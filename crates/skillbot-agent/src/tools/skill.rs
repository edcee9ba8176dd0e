//! `view_skill` — load a skill document on demand.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::base::{optional_nonempty, require_string, Tool};
use crate::skills::SkillCatalog;

pub struct ViewSkillTool {
    catalog: Arc<SkillCatalog>,
}

impl ViewSkillTool {
    pub fn new(catalog: Arc<SkillCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for ViewSkillTool {
    fn name(&self) -> &str {
        "view_skill"
    }

    fn description(&self) -> &str {
        "Load content from a skill folder. Call with just the skill ID to read its SKILL.md, \
         or pass a relative file path to read one of its reference files."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "skill_id": {
                    "type": "string",
                    "description": "The skill ID (folder name) from the skill list"
                },
                "file": {
                    "type": "string",
                    "description": "File to read (default: SKILL.md), e.g. 'reference/example.md'"
                }
            },
            "required": ["skill_id"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let skill_id = require_string(&params, "skill_id")?;
        let file = optional_nonempty(&params, "file");
        Ok(self.catalog.load(&skill_id, file.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_view_skill_defaults_to_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let skill = dir.path().join("charts");
        std::fs::create_dir_all(&skill).unwrap();
        std::fs::write(skill.join("SKILL.md"), "---\nname: Charts\n---\nUse matplotlib.").unwrap();

        let tool = ViewSkillTool::new(Arc::new(SkillCatalog::from_dir(dir.path())));
        let mut params = HashMap::new();
        params.insert("skill_id".into(), json!("charts"));
        params.insert("file".into(), json!(""));
        assert_eq!(tool.execute(params).await.unwrap(), "Use matplotlib.");
    }
}
