//! `gptm status` — show configuration and backend status.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use gptm_core::config::{get_config_path, BackendKind, Config};

fn mark(ok: bool, yes: &str, no: &str) -> String {
    if ok {
        format!("{} {yes}", "✓".green())
    } else {
        format!("{}", format!("· {no}").dimmed())
    }
}

/// Run the status command.
pub fn run(config: &Config, config_override: Option<&Path>, warnings: &[String]) -> Result<()> {
    let config_path = config_override
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);

    println!();
    println!("{}", "gptm status".cyan().bold());
    println!();

    println!(
        "  {:<16} {} {}",
        "Config:".bold(),
        config_path.display(),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(not found, using defaults)".red().to_string()
        }
    );
    for warning in warnings {
        println!("  {:<16} {}", "", format!("! {warning}").yellow());
    }

    let backend = match config.backend {
        BackendKind::Local => "local (Ollama)",
        BackendKind::Remote => "remote (Atoma)",
    };
    println!("  {:<16} {}", "Backend:".bold(), backend.green());

    // Local
    println!();
    println!("  {}", "Local daemon:".bold());
    println!("    {:<14} {}", "URL:", config.local.base_url);
    println!("    {:<14} {}", "Model:", config.local.default_model);
    println!("    {:<14} {}s", "Timeout:", config.local.timeout_secs);

    // Remote
    let remote = &config.remote;
    println!();
    println!("  {}", "Remote API:".bold());
    println!("    {:<14} {}", "URL:", remote.base_url);
    println!("    {:<14} {}", "Model:", remote.model);
    println!(
        "    {:<14} {}",
        "API key:",
        mark(remote.is_configured(), "set", "not configured")
    );
    println!(
        "    {:<14} {}",
        "Retries:",
        format!(
            "{} (base delay {} ms, timeout {}s)",
            remote.max_retries, remote.retry_delay_ms, remote.timeout_secs
        )
        .dimmed()
    );
    println!(
        "    {:<14} {}",
        "Parameters:",
        format!(
            "temp: {} | max_tokens: {}",
            remote.temperature, remote.max_tokens
        )
        .dimmed()
    );

    // Rate limit
    println!();
    let limit = &config.rate_limit;
    let limit_status = if limit.enabled {
        format!(
            "{} {} per {}s per caller",
            "✓".green(),
            limit.limit,
            limit.period_secs
        )
    } else {
        mark(false, "", "disabled")
    };
    println!("  {:<16} {}", "Rate limit:".bold(), limit_status);
    println!(
        "  {:<16} {} ({})",
        "Logging:".bold(),
        config.logging.level,
        config.logging.format
    );

    println!();
    Ok(())
}
