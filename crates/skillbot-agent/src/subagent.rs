//! Data-analysis subagent — delegated, isolated script-writing loop.
//!
//! The main agent hands off data questions through the `data_analysis` tool.
//! Each delegation:
//! - Pre-analyzes the file eagerly (shape, column types, sample rows) so the
//!   subagent never spends its context parsing raw data
//! - Runs an independent, ephemeral LLM ↔ tool loop with its own system
//!   prompt and a narrow tool set (`run_script` and `bash`), with no
//!   approval gating
//! - Returns only the final message text
//! - Removes every script artifact it left behind, on every exit path

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use skillbot_core::config::schema::Config;
use skillbot_core::types::Message;
use skillbot_providers::traits::{LlmProvider, LlmRequestConfig};

use crate::dataframe;
use crate::runner::{ArtifactScope, ScriptRunner};
use crate::tools::{require_string, BashTool, RunScriptTool, Tool, ToolRegistry};

/// Maximum LLM ↔ tool iterations for one delegation.
pub const SUBAGENT_MAX_ITERATIONS: u32 = 15;

/// Returned when the loop ends without a final answer.
pub const SUBAGENT_FAILED: &str = "Subagent failed to produce a result";

const SUBAGENT_PROMPT: &str = "\
You are a data analysis assistant that writes and runs Python scripts.

Your job is to:
1. Understand the data analysis task
2. Write a Python script using the provided dataframe info
3. Use the run_script tool to execute your script
4. If there's an error, use bash with `cat <script_path>` to read the script, fix it, and try again

ENVIRONMENT:
- pandas and numpy are already installed
- The dataframe structure is provided below; use this info to write your script
- Load the data from the file path provided

Guidelines:
- Write simple, clean Python code
- Always include print statements to show results
- Use the exact column names from the provided schema

DEBUGGING:
- If run_script returns an error, it will include the script path
- Use the bash tool (cat /path/to/script.py) to see your code
- Fix the issue and call run_script with corrected code
";

// ─────────────────────────────────────────────
// Delegation
// ─────────────────────────────────────────────

/// Outcome of one delegation.
#[derive(Clone, Debug)]
pub struct Delegation {
    /// Text returned to the main agent.
    pub result: String,
    /// Pre-analysis summary, when the file loaded.
    pub summary: Option<Value>,
}

/// Runs data-analysis tasks in an isolated subagent loop.
pub struct DataAnalysisDelegator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    request_config: LlmRequestConfig,
    runner: ScriptRunner,
    artifact_dir: PathBuf,
    script_extension: String,
    bash_timeout: u64,
    script_timeout: u64,
    privacy_mode: bool,
    max_iterations: u32,
}

impl DataAnalysisDelegator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        runner: ScriptRunner,
        artifact_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            request_config: LlmRequestConfig::default(),
            runner,
            artifact_dir: artifact_dir.into(),
            script_extension: "py".to_string(),
            bash_timeout: crate::tools::shell::DEFAULT_TIMEOUT_SECS,
            script_timeout: crate::tools::script::DEFAULT_TIMEOUT_SECS,
            privacy_mode: false,
            max_iterations: SUBAGENT_MAX_ITERATIONS,
        }
    }

    /// Build from the `tools.dataAnalysis` section.
    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &Config) -> Self {
        let da = &config.tools.data_analysis;
        let model = da.model.clone().unwrap_or_else(|| config.agent.model.clone());
        Self::new(
            provider,
            model,
            ScriptRunner::new(&da.interpreter),
            config.tools.artifact_path(),
        )
        .with_request_config(LlmRequestConfig {
            max_tokens: config.agent.max_tokens,
            temperature: config.agent.temperature,
        })
        .with_timeouts(config.tools.bash.timeout, da.timeout)
        .with_privacy_mode(da.privacy_mode)
        .with_max_iterations(da.max_iterations)
    }

    pub fn with_request_config(mut self, config: LlmRequestConfig) -> Self {
        self.request_config = config;
        self
    }

    pub fn with_timeouts(mut self, bash_secs: u64, script_secs: u64) -> Self {
        self.bash_timeout = bash_secs;
        self.script_timeout = script_secs;
        self
    }

    pub fn with_privacy_mode(mut self, on: bool) -> Self {
        self.privacy_mode = on;
        self
    }

    pub fn with_max_iterations(mut self, n: u32) -> Self {
        self.max_iterations = n.max(1);
        self
    }

    /// Extension given to script artifacts (without the dot).
    pub fn with_script_extension(mut self, ext: &str) -> Self {
        self.script_extension = ext.trim_start_matches('.').to_string();
        self
    }

    pub fn privacy_mode(&self) -> bool {
        self.privacy_mode
    }

    /// Analyze `file_path` and run the subagent on `task`.
    ///
    /// A file that cannot be pre-analyzed yields `{"error": ...}` without
    /// starting the loop.
    pub async fn delegate(&self, file_path: &str, task: &str) -> Delegation {
        let summary = match dataframe::analyze(file_path, self.privacy_mode) {
            Ok(s) => s,
            Err(e) => {
                warn!(file = file_path, error = %e, "pre-analysis failed");
                return Delegation {
                    result: pretty(&json!({ "error": e.to_string() })),
                    summary: None,
                };
            }
        };

        let task_prompt = format!("DATAFRAME INFO:\n{}\n\nTASK:\n{task}", pretty(&summary));

        let scope = Arc::new(ArtifactScope::with_naming(
            &self.artifact_dir,
            "analysis_",
            &format!(".{}", self.script_extension),
        ));
        let tools = self.build_tools(scope.clone());

        info!(file = file_path, "data analysis subagent starting");
        let result = match self.run_loop(&tools, &task_prompt).await {
            Ok(Some(text)) => text,
            Ok(None) => SUBAGENT_FAILED.to_string(),
            Err(e) => {
                warn!(error = %e, "data analysis subagent model call failed");
                format!("Error: data analysis subagent failed: {e}")
            }
        };
        scope.cleanup();
        info!(file = file_path, result_len = result.len(), "data analysis subagent finished");

        Delegation {
            result,
            summary: Some(summary),
        }
    }

    fn build_tools(&self, scope: Arc<ArtifactScope>) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(RunScriptTool::new(
            self.runner.clone(),
            Some(self.script_timeout),
            scope,
        )));
        tools.register(Arc::new(BashTool::new(
            self.runner.clone(),
            Some(self.bash_timeout),
        )));
        tools
    }

    /// Ephemeral loop. Returns the final answer, or `None` when the model
    /// produced none before the iteration cap.
    async fn run_loop(&self, tools: &ToolRegistry, task_prompt: &str) -> anyhow::Result<Option<String>> {
        let mut messages = vec![Message::system(SUBAGENT_PROMPT), Message::user(task_prompt)];
        let tool_defs = tools.get_definitions();

        for iteration in 0..self.max_iterations {
            debug!(iteration, "subagent LLM call");
            let response = self
                .provider
                .chat(&messages, Some(&tool_defs), &self.model, &self.request_config)
                .await?;

            if !response.has_tool_calls() {
                return Ok(response.content.filter(|c| !c.trim().is_empty()));
            }

            messages.push(Message::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            for tc in &response.tool_calls {
                debug!(tool = %tc.name(), iteration, "subagent executing tool");
                let result = tools.execute_call(tc).await;
                messages.push(Message::tool_result(&tc.id, result));
            }
        }

        warn!(max = self.max_iterations, "subagent hit iteration cap");
        Ok(None)
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

// ─────────────────────────────────────────────
// data_analysis tool
// ─────────────────────────────────────────────

/// Pre-analysis summaries waiting to be recorded in thread scratch state,
/// keyed by file path.
pub type SummaryInbox = Arc<Mutex<HashMap<String, Value>>>;

/// Model-facing entry point to the delegator.
pub struct DataAnalysisTool {
    delegator: Arc<DataAnalysisDelegator>,
    inbox: SummaryInbox,
}

impl DataAnalysisTool {
    pub fn new(delegator: Arc<DataAnalysisDelegator>, inbox: SummaryInbox) -> Self {
        Self { delegator, inbox }
    }
}

#[async_trait]
impl Tool for DataAnalysisTool {
    fn name(&self) -> &str {
        "data_analysis"
    }

    fn description(&self) -> &str {
        "Delegate a data analysis task to a specialized subagent. Use this to analyze \
         CSV/JSON/Excel files, compute statistics or summaries, or transform data."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the data file (CSV, JSON, or Excel)"
                },
                "task": {
                    "type": "string",
                    "description": "Description of the data analysis task"
                }
            },
            "required": ["file_path", "task"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let file_path = require_string(&params, "file_path")?;
        let task = require_string(&params, "task")?;

        let delegation = self.delegator.delegate(&file_path, &task).await;
        if let Some(summary) = delegation.summary {
            self.inbox
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(file_path, summary);
        }
        Ok(delegation.result)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
