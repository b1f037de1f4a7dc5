//! `docview resolve <page-url>`: find the viewer URLs of a board page.

use crate::cli::output;
use crate::config::EngineConfig;
use crate::preview::PreviewCollector;
use crate::renderer::Renderer;
use anyhow::{Context, Result};

pub async fn run(
    renderer: &dyn Renderer,
    config: &EngineConfig,
    page_url: &str,
    base_url: Option<&str>,
) -> Result<()> {
    let collector =
        PreviewCollector::new(renderer, config).context("failed to build preview collector")?;
    let urls = match base_url {
        Some(base) => collector.collect_with_base(page_url, base).await,
        None => collector.collect(page_url).await,
    }
    .with_context(|| format!("cannot resolve previews for {page_url}"))?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "pageUrl": page_url,
            "previewUrls": urls,
        }));
        return Ok(());
    }

    if urls.is_empty() {
        eprintln!("  No preview URLs found on {page_url}");
    }
    for url in &urls {
        println!("{url}");
    }
    Ok(())
}
