//! Skillbot Agent — orchestrator loop, capabilities, and execution.
//!
//! This crate contains:
//! - **agent_loop**: The ReAct loop with approval suspend/resume
//! - **capabilities**: Ordered capability chain (approval gate, skills, search, bash, data analysis)
//! - **tools**: Tool trait, registry, and built-in tools
//! - **runner**: Shell command and script execution with timeouts
//! - **skills**: Skill catalog discovery and loading
//! - **subagent**: Data-analysis delegation
//! - **context**: System prompt and message list construction

pub mod agent_loop;
pub mod callbacks;
pub mod capabilities;
pub mod context;
pub mod dataframe;
pub mod runner;
pub mod skills;
pub mod subagent;
pub mod tools;

#[cfg(test)]
mod testing;

pub use agent_loop::{AgentError, LoopOutcome, Orchestrator};
pub use callbacks::{AgentCallback, NoopCallback};
pub use capabilities::{Capability, CapabilityChain};
pub use context::ContextBuilder;
pub use runner::ScriptRunner;
pub use skills::SkillCatalog;
pub use subagent::DataAnalysisDelegator;
pub use tools::{Tool, ToolRegistry};
