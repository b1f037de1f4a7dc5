//! Batch orchestration over documents and their preview candidates.
//!
//! One session scope serves a whole batch (or one chunk of it, for the
//! worker-pool variant). Documents are visited in input order and each
//! document's candidates in list order. A document's content is set from the
//! **last** candidate that produced non-empty text; empty or failed
//! candidates never clear an earlier result.

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::pipeline::{RetryPolicy, TextPipeline};
use crate::renderer::{LaunchOptions, Renderer};
use crate::session::SessionScope;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// A document record owned by a collector, filled in by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedDocument {
    pub title: String,
    pub page_url: String,
    #[serde(default)]
    pub preview_urls: Vec<String>,
    /// Extracted text; absent when no candidate produced any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Collector-specific fields carried through untouched.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl RenderedDocument {
    pub fn new(title: impl Into<String>, page_url: impl Into<String>, preview_urls: Vec<String>) -> Self {
        Self {
            title: title.into(),
            page_url: page_url.into(),
            preview_urls,
            content: None,
            meta: serde_json::Map::new(),
        }
    }
}

/// Counters for one batch call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub documents: usize,
    /// Documents that ended with content.
    pub populated: usize,
    /// Documents without candidates.
    pub skipped: usize,
    pub candidates_tried: usize,
    /// Candidates that timed out, failed or came back empty.
    pub candidates_failed: usize,
}

impl BatchReport {
    fn absorb(&mut self, other: BatchReport) {
        self.documents += other.documents;
        self.populated += other.populated;
        self.skipped += other.skipped;
        self.candidates_tried += other.candidates_tried;
        self.candidates_failed += other.candidates_failed;
    }
}

/// Runs text extraction across documents.
pub struct BatchRunner<'r> {
    renderer: &'r dyn Renderer,
    launch: LaunchOptions,
    pipeline: TextPipeline,
    workers: usize,
    between_documents: Duration,
}

impl<'r> BatchRunner<'r> {
    /// One attempt per candidate, bounded by the candidate timeout; the
    /// candidate list supplies the redundancy.
    pub fn new(renderer: &'r dyn Renderer, config: &EngineConfig) -> Self {
        let pipeline = TextPipeline::from_config(config)
            .with_policy(RetryPolicy::single(config.candidate_timeout()));
        Self {
            renderer,
            launch: config.launch_options(),
            pipeline,
            workers: config.batch.workers.max(1),
            between_documents: Duration::from_millis(config.batch.delay_between_documents_ms),
        }
    }

    /// Use a different per-candidate pipeline, e.g. the full retry policy.
    pub fn with_pipeline(mut self, pipeline: TextPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Fill `content` for each document, sequentially, in one session.
    ///
    /// Fails only when a browser session cannot be started.
    pub async fn populate_documents(
        &self,
        documents: &mut [RenderedDocument],
    ) -> EngineResult<BatchReport> {
        let report = self.populate_chunk(documents).await?;
        info!(
            documents = report.documents,
            populated = report.populated,
            skipped = report.skipped,
            failed = report.candidates_failed,
            "batch finished"
        );
        Ok(report)
    }

    /// Like [`populate_documents`](Self::populate_documents), split across
    /// up to `workers` independent sessions.
    ///
    /// Documents are cut into contiguous chunks; each chunk runs sequentially
    /// in its own session and the chunks run concurrently.
    pub async fn populate_documents_parallel(
        &self,
        documents: &mut [RenderedDocument],
    ) -> EngineResult<BatchReport> {
        if self.workers <= 1 || documents.len() <= 1 {
            return self.populate_documents(documents).await;
        }
        let chunk_size = documents.len().div_ceil(self.workers);
        let results = join_all(
            documents
                .chunks_mut(chunk_size)
                .map(|chunk| self.populate_chunk(chunk)),
        )
        .await;

        let mut report = BatchReport::default();
        for result in results {
            report.absorb(result?);
        }
        info!(
            workers = self.workers,
            documents = report.documents,
            populated = report.populated,
            skipped = report.skipped,
            failed = report.candidates_failed,
            "parallel batch finished"
        );
        Ok(report)
    }

    /// Extract text for each URL in order, in one session. Failed or empty
    /// URLs yield an empty string.
    pub async fn extract_many(&self, urls: &[String]) -> EngineResult<Vec<String>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let mut scope = SessionScope::acquire(self.renderer, self.launch.clone()).await?;
        let mut texts = Vec::with_capacity(urls.len());
        for url in urls {
            match self.pipeline.run(&mut scope, url).await {
                Ok(outcome) => texts.push(outcome.value.unwrap_or_default()),
                Err(e) => {
                    scope.release().await;
                    return Err(e);
                }
            }
        }
        scope.release().await;
        Ok(texts)
    }

    async fn populate_chunk(&self, documents: &mut [RenderedDocument]) -> EngineResult<BatchReport> {
        let mut report = BatchReport {
            documents: documents.len(),
            ..BatchReport::default()
        };
        if documents.iter().all(|d| d.preview_urls.is_empty()) {
            report.skipped = documents.len();
            debug!(documents = documents.len(), "no preview candidates, browser not started");
            return Ok(report);
        }

        let mut scope = SessionScope::acquire(self.renderer, self.launch.clone()).await?;
        let result = self.populate_in_scope(&mut scope, documents, &mut report).await;
        scope.release().await;
        result.map(|()| report)
    }

    async fn populate_in_scope(
        &self,
        scope: &mut SessionScope<'_>,
        documents: &mut [RenderedDocument],
        report: &mut BatchReport,
    ) -> EngineResult<()> {
        let mut processed = 0usize;
        for document in documents.iter_mut() {
            if document.preview_urls.is_empty() {
                debug!(title = %document.title, "no preview URLs, skipping");
                report.skipped += 1;
                continue;
            }
            if processed > 0 && !self.between_documents.is_zero() {
                tokio::time::sleep(self.between_documents).await;
            }
            processed += 1;

            let mut last_text: Option<String> = None;
            for url in &document.preview_urls {
                report.candidates_tried += 1;
                let outcome = self.pipeline.run(scope, url).await?;
                match outcome.value {
                    Some(text) => last_text = Some(text),
                    None => report.candidates_failed += 1,
                }
            }

            if let Some(text) = last_text {
                document.content = Some(text);
                report.populated += 1;
            } else {
                debug!(title = %document.title, "no candidate produced text");
            }
        }
        Ok(())
    }
}
