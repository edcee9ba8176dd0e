//! Terminal implementation of the agent callbacks.
//!
//! Shows tool activity as it happens and asks y/n before a gated call runs.

use std::io::{self, Write};

use async_trait::async_trait;
use colored::Colorize;
use serde_json::{Map, Value};
use tracing::debug;

use skillbot_agent::AgentCallback;
use skillbot_core::types::PendingApproval;
use skillbot_core::utils::truncate_string;

/// Results longer than this are cut in the display.
const RESULT_PREVIEW_CHARS: usize = 200;

pub struct CliCallback;

#[async_trait]
impl AgentCallback for CliCallback {
    async fn request_approval(&self, command: &str, pending: &PendingApproval) -> Option<bool> {
        println!();
        println!("{}", "⚠  Approval required".yellow().bold());
        println!("  {} {}", format!("{}:", pending.tool_name()).bold(), command);

        // stdin reads block; keep them off the runtime threads.
        tokio::task::spawn_blocking(|| ask_yes_no("  Run it? [y/N] "))
            .await
            .ok()
            .flatten()
    }

    fn on_tool_call(&self, tool: &str, args: &Map<String, Value>) {
        // Shown in the approval prompt instead.
        if tool == "bash" {
            return;
        }
        println!("{}", format_tool_call(tool, args).cyan());
    }

    fn on_tool_result(&self, _tool: &str, result: &str) {
        println!("  {}", truncate_string(result, RESULT_PREVIEW_CHARS).dimmed());
    }

    fn on_progress(&self, message: &str) {
        debug!(progress = message);
    }

    fn on_error(&self, error: &str) {
        debug!(error, "agent error");
    }
}

/// `▶ name: value` for a single argument, `▶ name(k='v', ...)` otherwise.
fn format_tool_call(tool: &str, args: &Map<String, Value>) -> String {
    if args.len() == 1 {
        if let Some(value) = args.values().next() {
            return format!("▶ {tool}: {}", plain(value));
        }
    }
    let rendered: Vec<String> = args
        .iter()
        .map(|(k, v)| format!("{k}='{}'", plain(v)))
        .collect();
    format!("▶ {tool}({})", rendered.join(", "))
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `None` when stdin is closed or unreadable.
fn ask_yes_no(prompt: &str) -> Option<bool> {
    print!("{prompt}");
    io::stdout().flush().ok()?;
    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(is_yes(&line)),
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
