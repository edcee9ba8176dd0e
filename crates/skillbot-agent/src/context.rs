//! Context builder — constructs the system prompt and per-call message list.
//!
//! The system prompt is rebuilt for every model call from:
//! 1. The prompt template with `{skill_summaries}` filled in
//! 2. Sections contributed by capabilities (active skill, loaded files)
//! 3. The thread's session summary, when one exists
//!
//! Turns are never rewritten; the message list is the system prompt followed
//! by the thread's turns in order.

use std::path::Path;

use skillbot_core::types::{Message, ScratchState};
use tracing::{debug, warn};

use crate::capabilities::CapabilityChain;

/// Template file looked up in the working directory.
pub const PROMPT_FILE: &str = "Agent.md";

/// Placeholder replaced with the skill catalog summary.
pub const SKILLS_PLACEHOLDER: &str = "{skill_summaries}";

const DEFAULT_TEMPLATE: &str = "\
You are a helpful assistant that solves tasks step by step using the tools available to you.

# How to work
- Think about what the user needs, then act. Prefer one clear tool call at a time.
- Before starting a specialised task, check the skills below and load the relevant one with \
`view_skill`.
- Use `glob_search` and `grep_search` to locate files before reading or analysing them.
- Delegate questions about CSV, JSON, or Excel files to `data_analysis` with the file path and a \
precise task. Do not read raw data files yourself.
- Use `bash` for anything else. Commands may need the user's approval; if one is rejected, \
do not retry it, explain what you would have done instead.
- When a tool returns an error, read it carefully and adapt.

# Available skills
{skill_summaries}
";

/// Read the prompt template.
///
/// Uses `path` when given, otherwise `Agent.md` in the working directory,
/// otherwise the built-in template.
pub fn load_prompt_template(path: Option<&Path>) -> String {
    let candidate = path.unwrap_or(Path::new(PROMPT_FILE));
    match std::fs::read_to_string(candidate) {
        Ok(template) => {
            debug!(file = %candidate.display(), "loaded prompt template");
            template
        }
        Err(e) => {
            if path.is_some() {
                warn!(file = %candidate.display(), error = %e, "prompt template unreadable, using built-in");
            }
            DEFAULT_TEMPLATE.to_string()
        }
    }
}

// ─────────────────────────────────────────────
// Context builder
// ─────────────────────────────────────────────

/// Builds system prompts and message lists for the orchestrator.
#[derive(Clone, Debug)]
pub struct ContextBuilder {
    /// Template with the skill summaries already substituted.
    base_prompt: String,
}

impl ContextBuilder {
    pub fn new(template: &str, skill_summaries: &str) -> Self {
        Self {
            base_prompt: template.replace(SKILLS_PLACEHOLDER, skill_summaries),
        }
    }

    /// Built-in template.
    pub fn with_default_template(skill_summaries: &str) -> Self {
        Self::new(DEFAULT_TEMPLATE, skill_summaries)
    }

    pub fn base_prompt(&self) -> &str {
        &self.base_prompt
    }

    /// Full system prompt for the current scratch state.
    pub fn build_system_prompt(&self, scratch: &ScratchState, chain: &CapabilityChain) -> String {
        let mut parts = vec![self.base_prompt.trim_end().to_string()];
        parts.extend(chain.prompt_sections(scratch));
        if let Some(summary) = scratch.session_summary() {
            parts.push(format!("## Session Summary\n{summary}"));
        }
        parts.join("\n\n")
    }

    /// System prompt followed by every turn of the thread.
    pub fn build_messages(
        &self,
        turns: &[Message],
        scratch: &ScratchState,
        chain: &CapabilityChain,
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(Message::system(self.build_system_prompt(scratch, chain)));
        messages.extend_from_slice(turns);
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::SkillsCapability;
    use crate::skills::SkillCatalog;
    use serde_json::json;
    use std::sync::Arc;

    fn empty_chain() -> CapabilityChain {
        CapabilityChain::new(Vec::new())
    }

    #[test]
    fn test_placeholder_substituted() {
        let ctx = ContextBuilder::new("Skills:\n{skill_summaries}\nEnd", "## Alpha");
        assert_eq!(ctx.base_prompt(), "Skills:\n## Alpha\nEnd");
    }

    #[test]
    fn test_default_template_has_placeholder() {
        assert!(DEFAULT_TEMPLATE.contains(SKILLS_PLACEHOLDER));
        let ctx = ContextBuilder::with_default_template("No skills available.");
        assert!(ctx.base_prompt().contains("# Available skills\nNo skills available."));
    }

    #[test]
    fn test_load_template_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.md");
        std::fs::write(&path, "Custom {skill_summaries}").unwrap();
        assert_eq!(load_prompt_template(Some(&path)), "Custom {skill_summaries}");
    }

    #[test]
    fn test_load_template_falls_back() {
        let template = load_prompt_template(Some(Path::new("/nonexistent/prompt.md")));
        assert_eq!(template, DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_messages_are_system_then_turns() {
        let ctx = ContextBuilder::new("sys", "");
        let turns = vec![Message::user("hi"), Message::assistant("hello")];
        let msgs = ctx.build_messages(&turns, &ScratchState::new(), &empty_chain());
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].role(), "system");
        assert_eq!(msgs[0].text(), Some("sys"));
        assert_eq!(&msgs[1..], &turns[..]);
    }

    #[test]
    fn test_scratch_state_injected() {
        let dir = tempfile::tempdir().unwrap();
        let chain = CapabilityChain::new(vec![Arc::new(SkillsCapability::new(Arc::new(
            SkillCatalog::from_dir(dir.path()),
        )))]);
        let mut scratch = ScratchState::new();
        scratch.set(ScratchState::ACTIVE_SKILL, json!("charts"));
        scratch.set(ScratchState::SESSION_SUMMARY, json!("User is exploring sales data."));

        let prompt = ContextBuilder::new("base", "").build_system_prompt(&scratch, &chain);
        assert!(prompt.starts_with("base\n\n## Active Skill\n"));
        assert!(prompt.ends_with("## Session Summary\nUser is exploring sales data."));
    }
}
