//! Tool modules for the skillbot agent.

pub mod base;
pub mod registry;
pub mod script;
pub mod search;
pub mod shell;
pub mod skill;

pub use base::{optional_nonempty, optional_string, require_string, Tool};
pub use registry::ToolRegistry;
pub use script::RunScriptTool;
pub use search::{FileSearch, GlobSearchTool, GrepMode, GrepSearchTool};
pub use shell::BashTool;
pub use skill::ViewSkillTool;
