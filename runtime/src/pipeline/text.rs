//! Text variant of the render pipeline.
//!
//! Reuses the caller's session scope across attempts. A browser crash
//! discards the session so the next attempt starts a fresh one.

use super::{AttemptLog, RenderOutcome, RetryPolicy, Step};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::extraction::FrameTextExtractor;
use crate::renderer::NavigationTiming;
use crate::session::SessionScope;
use tracing::warn;

/// Navigate and extract frame text, with retries.
#[derive(Debug, Clone)]
pub struct TextPipeline {
    extractor: FrameTextExtractor,
    timing: NavigationTiming,
    policy: RetryPolicy,
}

impl TextPipeline {
    pub fn new(extractor: FrameTextExtractor, timing: NavigationTiming, policy: RetryPolicy) -> Self {
        Self {
            extractor,
            timing,
            policy,
        }
    }

    /// Pipeline with the configured retry policy.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            FrameTextExtractor::new(config.extractor.clone()),
            config.navigation_timing(),
            config.text_retry_policy(),
        )
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Render `url` in the scope's session and extract its text.
    ///
    /// Success means non-empty text. Fails only when a replacement session
    /// cannot be started.
    pub async fn run(
        &self,
        scope: &mut SessionScope<'_>,
        url: &str,
    ) -> EngineResult<RenderOutcome<String>> {
        let mut log = AttemptLog::new(url, &self.policy);

        for attempt in 1..=self.policy.max_attempts {
            log.pause_before(attempt).await;
            let step = log
                .run(attempt, async {
                    let session = scope.session().await?;
                    session.navigate(url, &self.timing).await?;
                    let text = self.extractor.extract(&*session).await?;
                    Ok((!text.trim().is_empty()).then_some(text))
                })
                .await?;

            match step {
                Step::Success(text) => return Ok(log.finish(Some(text))),
                Step::Retry { crashed: true } => {
                    warn!(url = %url, attempt, "browser crashed, discarding session");
                    scope.discard().await;
                }
                Step::Retry { crashed: false } => {}
            }
        }
        Ok(log.finish(None))
    }
}
