//! `docview document <page-url>`: resolve a page's previews and populate
//! one document record from them.

use crate::batch::{BatchRunner, RenderedDocument};
use crate::cli::output;
use crate::config::EngineConfig;
use crate::preview::PreviewCollector;
use crate::renderer::Renderer;
use anyhow::{Context, Result};

pub async fn run(
    renderer: &dyn Renderer,
    config: &EngineConfig,
    page_url: &str,
    title: Option<&str>,
) -> Result<()> {
    let collector =
        PreviewCollector::new(renderer, config).context("failed to build preview collector")?;
    let preview_urls = collector
        .collect(page_url)
        .await
        .with_context(|| format!("cannot resolve previews for {page_url}"))?;

    let mut documents = [RenderedDocument::new(
        title.unwrap_or_default(),
        page_url,
        preview_urls,
    )];
    let report = BatchRunner::new(renderer, config)
        .populate_documents(&mut documents)
        .await
        .context("document population aborted")?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "document": documents[0],
            "report": report,
        }));
    } else {
        output::print_json(&documents[0]);
        eprintln!(
            "  {} candidate(s) tried, {} failed",
            report.candidates_tried, report.candidates_failed
        );
    }
    Ok(())
}
