//! Shared CLI helpers — response printing, banner, conversation labels.

use colored::Colorize;

use skillbot_core::conversations::ConversationRecord;
use skillbot_core::utils::display_timestamp;

/// Fresh thread id for a new conversation.
pub fn new_thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `[YYYY-MM-DD HH:MM]  title` for selector and listing output.
pub fn conversation_line(record: &ConversationRecord) -> String {
    format!("[{}]  {}", display_timestamp(&record.updated_at), record.title)
}

/// Print an agent response to stdout.
pub fn print_response(response: &str) {
    println!();
    println!("{}", "🤖 Skillbot".cyan().bold());
    if response.is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        println!("{response}");
    }
    println!();
}

/// Print the banner shown at REPL start.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "🤖 Skillbot".cyan().bold(), version.dimmed());
    println!("{}", "Type a message, or \"exit\" to quit.".dimmed());
    println!();
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
