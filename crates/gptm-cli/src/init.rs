//! `gptm init` — write a default config file.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use gptm_core::config::{get_config_path, save_config, Config};

/// Run the init command.
pub fn run(config_override: Option<&Path>, force: bool) -> Result<()> {
    let config_path = config_override
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);

    println!();
    println!("{}", "gptm setup".cyan().bold());
    println!();

    if config_path.exists() && !force {
        println!(
            "  {} config already exists at {} (use --force to overwrite)",
            "✓".green(),
            config_path.display()
        );
        println!();
        return Ok(());
    }

    save_config(&Config::default(), Some(&config_path))
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    println!(
        "  {} created config at {}",
        "✓".green(),
        config_path.display()
    );

    println!();
    println!(
        "{}",
        "Next: start Ollama locally, or set remote.apiKey and \"backend\": \"remote\".".dimmed()
    );
    println!();
    Ok(())
}
