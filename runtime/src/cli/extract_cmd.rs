//! `docview extract <url>...`: text of each viewer page.

use crate::batch::BatchRunner;
use crate::cli::output;
use crate::config::EngineConfig;
use crate::pipeline::TextPipeline;
use crate::renderer::Renderer;
use anyhow::{Context, Result};

/// Extract every URL in one browser session. With `retry`, each URL goes
/// through the configured retry policy instead of a single attempt.
pub async fn run(
    renderer: &dyn Renderer,
    config: &EngineConfig,
    urls: &[String],
    retry: bool,
) -> Result<()> {
    let mut runner = BatchRunner::new(renderer, config);
    if retry {
        runner = runner.with_pipeline(TextPipeline::from_config(config));
    }
    let texts = runner
        .extract_many(urls)
        .await
        .context("text extraction aborted")?;

    if output::is_json() {
        let items: Vec<_> = urls
            .iter()
            .zip(&texts)
            .map(|(url, text)| {
                serde_json::json!({
                    "url": url,
                    "success": !text.is_empty(),
                    "text": text,
                })
            })
            .collect();
        output::print_json(&items);
        return Ok(());
    }

    for (url, text) in urls.iter().zip(&texts) {
        if text.is_empty() {
            println!("[!!] {url}: no text extracted");
            continue;
        }
        println!("[OK] {url} ({} chars)", text.chars().count());
        if output::is_verbose() {
            println!("{text}");
        } else {
            println!("     {}", output::preview(text, 160));
        }
        println!();
    }
    Ok(())
}
