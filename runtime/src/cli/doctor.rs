//! Environment readiness check.

use crate::cli::output;
use crate::config::{EngineConfig, CHROMIUM_PATH_ENV};
use crate::renderer::chromium::find_chromium;
use anyhow::Result;
use std::path::Path;

/// Check Chromium availability and configuration.
///
/// `config` is the load result, so a broken config file is reported here
/// instead of aborting the command.
pub async fn run(config_path: Option<&Path>, config: Result<&EngineConfig, String>) -> Result<()> {
    let chrome_hint = config
        .as_ref()
        .ok()
        .and_then(|c| c.browser.chrome_path.clone());
    let chromium = find_chromium(chrome_hint.as_deref());
    let config_file = config_path
        .map(Path::to_path_buf)
        .or_else(|| EngineConfig::default_path().filter(|p| p.exists()));

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium.as_ref().map(|p| p.display().to_string()),
            "configFile": config_file.as_ref().map(|p| p.display().to_string()),
            "configError": config.as_ref().err(),
            "ready": chromium.is_some() && config.is_ok(),
        }));
        return Ok(());
    }

    println!("Docview Doctor");
    println!("==============");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install google-chrome or set {CHROMIUM_PATH_ENV}."
        ),
    }

    match (&config, &config_file) {
        (Ok(_), Some(path)) => println!("[OK] Config loaded: {}", path.display()),
        (Ok(_), None) => println!("[OK] No config file, using defaults"),
        (Err(e), _) => println!("[!!] Config invalid: {e}"),
    }
    if let Ok(c) = &config {
        let mode = if c.browser.headless { "headless" } else { "headed" };
        println!("     Browser mode: {mode}");
        println!(
            "     Retries: {} attempt(s), {}s per attempt",
            c.retry.retry_attempts, c.retry.attempt_timeout_seconds
        );
    }

    println!();
    if chromium.is_some() && config.is_ok() {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
        if chromium.is_none() {
            println!("  Preview resolution still works through the static HTML fallback.");
        }
    }
    Ok(())
}

