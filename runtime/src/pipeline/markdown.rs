//! Markdown variant of the render pipeline, used for article pages.
//!
//! Every attempt launches its own browser session, so a wedged browser
//! never outlives the attempt that hit it.

use super::{render_with_retry, RenderOutcome, RetryPolicy};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::markdown::{MarkdownDocument, MarkdownRenderer};
use crate::renderer::{LaunchOptions, NavigationTiming, Renderer};
use crate::session::SessionScope;
use std::time::Duration;
use tracing::{info, warn};

/// Renders article URLs to markdown with retries.
pub struct MarkdownPipeline<'r> {
    renderer: &'r dyn Renderer,
    launch: LaunchOptions,
    timing: NavigationTiming,
    markdown: MarkdownRenderer,
    policy: RetryPolicy,
    between_articles: Duration,
}

impl<'r> MarkdownPipeline<'r> {
    pub fn new(renderer: &'r dyn Renderer, config: &EngineConfig) -> Self {
        Self {
            renderer,
            launch: config.markdown_launch_options(),
            timing: config.navigation_timing(),
            markdown: MarkdownRenderer::from_config(&config.markdown),
            policy: config.markdown.retry_policy(),
            between_articles: config.markdown.delay(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Markdown for one article.
    ///
    /// An attempt succeeds when the render reports success and either view is
    /// non-empty; a missing view is filled from the other one.
    pub async fn crawl_markdown(&self, url: &str) -> EngineResult<RenderOutcome<MarkdownDocument>> {
        render_with_retry(url, &self.policy, |_| self.attempt(url)).await
    }

    /// Markdown for each URL in order, pausing between articles.
    pub async fn crawl_many(
        &self,
        urls: &[String],
    ) -> EngineResult<Vec<RenderOutcome<MarkdownDocument>>> {
        let mut results = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            if i > 0 && !self.between_articles.is_zero() {
                tokio::time::sleep(self.between_articles).await;
            }
            results.push(self.crawl_markdown(url).await?);
        }
        let rendered = results.iter().filter(|r| r.success()).count();
        info!(total = urls.len(), rendered, "markdown crawl finished");
        Ok(results)
    }

    async fn attempt(&self, url: &str) -> EngineResult<Option<MarkdownDocument>> {
        let mut scope = SessionScope::acquire(self.renderer, self.launch.clone()).await?;
        let html = async {
            let session = scope.session().await?;
            session.navigate(url, &self.timing).await?;
            session.html().await
        }
        .await;
        scope.release().await;
        let html = html?;

        let result = self.markdown.render(&html, url);
        if !result.success {
            warn!(
                url = %url,
                "markdown render failed: {}",
                result.error_message.as_deref().unwrap_or("unknown error")
            );
            return Ok(None);
        }

        Ok(result.markdown.and_then(|doc| {
            match (doc.fit_markdown.trim().is_empty(), doc.raw_markdown.trim().is_empty()) {
                (true, true) => None,
                (true, false) => Some(MarkdownDocument {
                    fit_markdown: doc.raw_markdown.clone(),
                    raw_markdown: doc.raw_markdown,
                }),
                (false, true) => Some(MarkdownDocument {
                    raw_markdown: doc.fit_markdown.clone(),
                    fit_markdown: doc.fit_markdown,
                }),
                (false, false) => Some(doc),
            }
        }))
    }
}
