//! Shared CLI helpers — path expansion and output formatting.

use std::path::{Path, PathBuf};

use colored::Colorize;

use gptm_core::ratelimit::RateLimitDecision;
use gptm_core::types::{InferenceResponse, ModelInfo};

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Some(raw) = path.to_str() else {
        return path.to_path_buf();
    };
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if raw == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    path.to_path_buf()
}

/// Print a generation result with its timing.
pub fn print_generation(response: &InferenceResponse) {
    print_reply(&response.response);
    println!(
        "{}",
        format!(
            "{} · {} ms",
            response.model,
            response.elapsed.as_millis()
        )
        .dimmed()
    );
}

/// Print the caller's remaining quota after an admitted call.
pub fn print_quota(quota: &RateLimitDecision) {
    println!("{}", format_quota(quota).dimmed());
}

pub fn format_quota(quota: &RateLimitDecision) -> String {
    format!(
        "{}/{} requests left, window resets at {}",
        quota.remaining,
        quota.limit,
        quota.reset_at.format("%H:%M:%S UTC")
    )
}

/// Print an assistant reply to stdout.
pub fn print_reply(text: &str) {
    println!();
    if text.is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        println!("{text}");
    }
    println!();
}

pub fn print_models(models: &[String], default_model: &str) {
    if models.is_empty() {
        println!("{}", "No models available.".dimmed());
        return;
    }
    for model in models {
        if model == default_model {
            println!("  {} {}", model.bold(), "(default)".green());
        } else {
            println!("  {model}");
        }
    }
}

pub fn print_model_info(info: &ModelInfo) {
    println!();
    println!("  {:<14} {}", "Model:".bold(), info.name);
    println!("  {:<14} {}", "Description:".bold(), info.description);
    println!("  {:<14} {}", "Context:".bold(), info.context_size);
    println!(
        "  {:<14} {}",
        "Parameters:".bold(),
        format_parameters(info.parameters)
    );
    println!();
}

/// Render a parameter count as `7B`, `350M`, or `unknown` for zero.
pub fn format_parameters(count: u64) -> String {
    const BILLION: u64 = 1_000_000_000;
    const MILLION: u64 = 1_000_000;

    match count {
        0 => "unknown".to_string(),
        n if n >= BILLION => format!("{:.1}B", n as f64 / BILLION as f64)
            .replace(".0B", "B"),
        n if n >= MILLION => format!("{}M", n / MILLION),
        n => n.to_string(),
    }
}

/// Print the banner shown at chat start.
pub fn print_banner(backend: &str, model: &str) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!(
        "{}  v{}  {}",
        "gptm chat".cyan().bold(),
        version.dimmed(),
        format!("{backend} · {model}").dimmed()
    );
    println!(
        "{}",
        "Type a message, \"/reset\" to clear the conversation, or \"exit\" to quit.".dimmed()
    );
    println!();
}

pub fn print_thinking() {
    eprint!("{}", "⠿ thinking...".dimmed());
}

pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
