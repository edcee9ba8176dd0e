//! Interactive REPL with a conversation selector.
//!
//! Uses `rustyline` for readline-style editing with persistent history.

use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::{debug, warn};

use skillbot_agent::Orchestrator;
use skillbot_core::conversations::{ConversationRecord, ConversationStore};
use skillbot_core::utils::title_from_query;

use crate::helpers;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "q", "/exit", "/quit", ":q"];

const TITLE_CHARS: usize = 60;

pub struct Session<'a> {
    pub agent: &'a Orchestrator,
    pub conversations: &'a ConversationStore,
    pub user_id: &'a str,
    pub history_dir: PathBuf,
}

impl Session<'_> {
    /// Run the interactive REPL loop.
    pub async fn run(&self, thread: Option<String>, force_new: bool) -> Result<()> {
        helpers::print_banner();
        let mut editor = create_editor(&self.history_dir)?;

        let (thread_id, mut is_new) = match thread {
            Some(id) => {
                let known = self.conversations.get(&id)?.is_some();
                (id, !known)
            }
            None if force_new => (helpers::new_thread_id(), true),
            None => self.select_conversation(&mut editor)?,
        };
        debug!(thread = %thread_id, is_new, "session started");

        loop {
            let input = match editor.readline("You: ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("Input error: {e}");
                    break;
                }
            };

            let trimmed = input.trim();
            if trimmed.is_empty() {
                continue;
            }
            if is_exit_command(trimmed) {
                println!("\nGoodbye! 👋");
                break;
            }
            let _ = editor.add_history_entry(&input);

            if is_new {
                self.conversations.create(
                    &thread_id,
                    self.user_id,
                    &title_from_query(trimmed, TITLE_CHARS),
                )?;
                is_new = false;
            }

            match self.agent.run_interactive(&thread_id, trimmed).await {
                Ok(response) => {
                    helpers::print_response(&response);
                    if let Err(e) = self.conversations.touch(&thread_id) {
                        warn!(error = %e, "failed to update conversation timestamp");
                    }
                }
                Err(e) => {
                    eprintln!("\n❌ Error: {e}\nPlease try again.\n");
                }
            }
        }

        save_history(&mut editor, &self.history_dir);
        Ok(())
    }

    /// Offer past conversations; returns the thread id and whether it is new.
    fn select_conversation(
        &self,
        editor: &mut Editor<(), DefaultHistory>,
    ) -> Result<(String, bool)> {
        let records = self.conversations.list(self.user_id)?;
        if records.is_empty() {
            return Ok((helpers::new_thread_id(), true));
        }

        println!("{}", "Past conversations:".bold());
        println!("  {}. {}", "0".cyan(), "Start a new conversation".green());
        for (i, record) in records.iter().enumerate() {
            println!("  {}. {}", (i + 1).to_string().cyan(), helpers::conversation_line(record));
        }
        println!();

        let choice = match editor.readline("Select: ") {
            Ok(line) => line,
            Err(_) => String::new(),
        };
        Ok(match pick(&records, &choice) {
            Some(record) => {
                println!("{} {}\n", "Resuming:".dimmed(), record.title);
                (record.thread_id.clone(), false)
            }
            None => (helpers::new_thread_id(), true),
        })
    }
}

/// Conversation chosen by a 1-based index; anything else starts a new one.
fn pick<'r>(records: &'r [ConversationRecord], choice: &str) -> Option<&'r ConversationRecord> {
    let index: usize = choice.trim().parse().ok()?;
    index.checked_sub(1).and_then(|i| records.get(i))
}

/// Create a rustyline editor with history.
fn create_editor(history_dir: &Path) -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = history_path(history_dir);
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

/// Save history to disk.
fn save_history(editor: &mut Editor<(), DefaultHistory>, history_dir: &Path) {
    if let Err(e) = std::fs::create_dir_all(history_dir) {
        debug!("failed to create history dir: {e}");
        return;
    }
    if let Err(e) = editor.save_history(&history_path(history_dir)) {
        debug!("failed to save history: {e}");
    }
}

fn history_path(history_dir: &Path) -> PathBuf {
    history_dir.join("cli_history")
}

/// Check if input is an exit command.
fn is_exit_command(input: &str) -> bool {
    let lower = input.to_lowercase();
    EXIT_COMMANDS.contains(&lower.as_str())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn exit_commands() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("QUIT"));
        assert!(is_exit_command("q"));
        assert!(is_exit_command(":q"));
        assert!(!is_exit_command("hello"));
        assert!(!is_exit_command(""));
    }

    fn record(id: &str) -> ConversationRecord {
        ConversationRecord {
            thread_id: id.into(),
            user_id: "u".into(),
            title: id.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pick_by_index() {
        let records = vec![record("a"), record("b")];
        assert_eq!(pick(&records, "2").map(|r| r.thread_id.as_str()), Some("b"));
        assert_eq!(pick(&records, " 1 ").map(|r| r.thread_id.as_str()), Some("a"));
        assert!(pick(&records, "0").is_none());
        assert!(pick(&records, "3").is_none());
        assert!(pick(&records, "new").is_none());
    }

    #[test]
    fn history_file_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(history_path(dir.path()), dir.path().join("cli_history"));
    }
}
