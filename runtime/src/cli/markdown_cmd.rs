//! `docview markdown <url>...`: article pages as fit and raw markdown.

use crate::cli::output;
use crate::config::EngineConfig;
use crate::pipeline::MarkdownPipeline;
use crate::renderer::Renderer;
use anyhow::{Context, Result};

pub async fn run(renderer: &dyn Renderer, config: &EngineConfig, urls: &[String]) -> Result<()> {
    let pipeline = MarkdownPipeline::new(renderer, config);
    let outcomes = pipeline
        .crawl_many(urls)
        .await
        .context("markdown crawl aborted")?;

    let items: Vec<_> = urls
        .iter()
        .zip(outcomes)
        .map(|(url, outcome)| {
            let attempts = outcome.attempts.len();
            let (doc, success) = outcome.into_parts();
            let (fit, raw) = doc
                .map(|d| (d.fit_markdown, d.raw_markdown))
                .unwrap_or_default();
            serde_json::json!({
                "url": url,
                "success": success,
                "fit": fit,
                "raw": raw,
                "attempts": attempts,
            })
        })
        .collect();

    if output::is_json() {
        output::print_json(&items);
        return Ok(());
    }

    for item in &items {
        let url = item["url"].as_str().unwrap_or_default();
        let attempts = &item["attempts"];
        if item["success"].as_bool().unwrap_or(false) {
            println!("[OK] {url} ({attempts} attempt(s))");
            println!("{}", item["fit"].as_str().unwrap_or_default());
        } else {
            println!("[!!] {url}: no markdown after {attempts} attempt(s)");
        }
        println!();
    }
    Ok(())
}
