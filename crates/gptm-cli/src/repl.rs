//! Interactive chat REPL.
//!
//! Uses `rustyline` for line editing. The conversation lives in memory for
//! the length of the session and the whole ordered history is sent on every
//! turn; only typed input lines are written to disk for recall.

use anyhow::Result;
use colored::Colorize;
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::debug;

use gptm_core::types::{Message, Role};
use gptm_providers::InferenceService;

use crate::helpers;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

/// Caller identity the REPL presents to the rate limiter.
const CALLER: &str = "cli";

/// Ordered chat history with an optional pinned system prompt.
#[derive(Debug, Default)]
pub struct Conversation {
    system: Option<String>,
    turns: Vec<Message>,
}

impl Conversation {
    pub fn new(system: Option<String>) -> Self {
        Self {
            system: system.filter(|s| !s.trim().is_empty()),
            turns: Vec::new(),
        }
    }

    /// Full message list to send: system prompt first, then turns in order.
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        if let Some(system) = &self.system {
            messages.push(Message::system(system.as_str()));
        }
        messages.extend(self.turns.iter().cloned());
        messages
    }

    pub fn push_user(&mut self, content: &str) {
        self.turns.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: &str) {
        self.turns.push(Message::assistant(content));
    }

    /// Drop the last user message after a failed turn so it can be retyped.
    pub fn discard_last_user(&mut self) {
        if matches!(self.turns.last(), Some(m) if m.role == Role::User) {
            self.turns.pop();
        }
    }

    /// Forget all turns; the system prompt stays.
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }
}

/// Run the interactive chat loop.
pub async fn run(service: &InferenceService, model: &str, system: Option<String>) -> Result<()> {
    let shown_model = if model.is_empty() {
        service.default_model()
    } else {
        model
    };
    helpers::print_banner(service.provider().display_name(), shown_model);

    let mut editor = create_editor()?;
    let mut conversation = Conversation::new(system);

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
            println!("\nGoodbye!");
            break;
        }

        let _ = editor.add_history_entry(&input);

        if trimmed.eq_ignore_ascii_case("/reset") {
            conversation.reset();
            println!("{}", "(conversation cleared)".dimmed());
            continue;
        }

        conversation.push_user(trimmed);
        debug!(turns = conversation.turn_count(), "sending chat turn");
        helpers::print_thinking();

        let result = service.chat(CALLER, conversation.messages(), model).await;
        helpers::clear_thinking();

        match result {
            Ok(reply) => {
                let content = &reply.value.message.content;
                helpers::print_reply(content);
                conversation.push_assistant(content);
                if let Some(quota) = reply.quota.as_ref().filter(|q| q.remaining <= 2) {
                    helpers::print_quota(quota);
                }
            }
            Err(e) => {
                conversation.discard_last_user();
                eprintln!("\nError: {e}\n");
            }
        }
    }

    save_history(&mut editor);
    Ok(())
}

fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

fn history_path() -> std::path::PathBuf {
    gptm_core::utils::get_data_path()
        .join("history")
        .join("chat_history")
}

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

    #[test]
    fn exit_commands() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("EXIT"));
        assert!(is_exit_command("/quit"));
        assert!(is_exit_command(":q"));
        assert!(!is_exit_command("hello"));
        assert!(!is_exit_command(""));
    }

    #[test]
    fn history_path_under_data_dir() {
        let path = history_path();
        assert!(path.to_string_lossy().contains(".gptm"));
        assert!(path.to_string_lossy().ends_with("chat_history"));
    }

    #[test]
    fn conversation_keeps_system_first_and_order() {
        let mut conv = Conversation::new(Some("be terse".to_string()));
        conv.push_user("one");
        conv.push_assistant("1");
        conv.push_user("two");

        let roles: Vec<Role> = conv.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(conv.messages()[3].content, "two");
    }

    #[test]
    fn conversation_blank_system_is_dropped() {
        let conv = Conversation::new(Some("   ".to_string()));
        assert!(conv.messages().is_empty());
    }

    #[test]
    fn failed_turn_is_discarded() {
        let mut conv = Conversation::new(None);
        conv.push_user("hi");
        conv.push_assistant("hello");
        conv.push_user("this one fails");
        conv.discard_last_user();

        assert_eq!(conv.turn_count(), 2);
        assert_eq!(conv.messages().last().unwrap().role, Role::Assistant);
    }

    #[test]
    fn reset_keeps_system_prompt() {
        let mut conv = Conversation::new(Some("sys".to_string()));
        conv.push_user("hi");
        conv.reset();

        assert_eq!(conv.messages(), vec![Message::system("sys")]);
    }
}
