//! Resilient render pipeline.
//!
//! Runs a render-and-extract operation up to `max_attempts` times. Each
//! attempt has a hard deadline; a missed deadline cancels the in-flight
//! browser work and counts as a failed attempt. Attempts are separated by a
//! fixed delay. Exhausting the attempts is reported as a [`RenderOutcome`]
//! without a value, never as an error. Only fatal errors (see
//! [`EngineError::is_fatal`]) escape.

pub mod markdown;
pub mod text;

pub use markdown::MarkdownPipeline;
pub use text::TextPipeline;

use crate::error::{EngineError, EngineResult};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Bounds for one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Hard deadline per attempt.
    pub attempt_timeout: Duration,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// One attempt, no delay.
    pub fn single(attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            attempt_timeout,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "error", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    /// Rendered fine but produced no content.
    Empty,
    TimedOut,
    Failed(String),
}

/// Record of one attempt, kept for the duration of a pipeline call.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionAttempt {
    pub url: String,
    /// 1-based.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub elapsed: Duration,
}

/// Result of a pipeline call: the value of the first successful attempt, if
/// any, and every attempt made.
#[derive(Debug, Clone)]
pub struct RenderOutcome<T> {
    pub value: Option<T>,
    pub attempts: Vec<ExtractionAttempt>,
}

impl<T> RenderOutcome<T> {
    pub fn success(&self) -> bool {
        self.value.is_some()
    }

    /// `(content, success)`.
    pub fn into_parts(self) -> (Option<T>, bool) {
        let success = self.value.is_some();
        (self.value, success)
    }
}

/// What the caller should do after an attempt.
pub(crate) enum Step<T> {
    Success(T),
    Retry {
        /// The browser went away; the session must be replaced.
        crashed: bool,
    },
}

/// Attempt bookkeeping shared by the pipeline variants.
pub(crate) struct AttemptLog<'a> {
    target: &'a str,
    policy: &'a RetryPolicy,
    attempts: Vec<ExtractionAttempt>,
}

impl<'a> AttemptLog<'a> {
    pub(crate) fn new(target: &'a str, policy: &'a RetryPolicy) -> Self {
        Self {
            target,
            policy,
            attempts: Vec::with_capacity(policy.max_attempts.min(8) as usize),
        }
    }

    /// Sleep the inter-attempt delay before every attempt but the first.
    pub(crate) async fn pause_before(&self, attempt: u32) {
        if attempt > 1 && !self.policy.delay.is_zero() {
            tokio::time::sleep(self.policy.delay).await;
        }
    }

    /// Run one attempt under the deadline and record how it went.
    ///
    /// `Ok(None)` from the attempt means "rendered, but empty".
    pub(crate) async fn run<T, Fut>(&mut self, attempt: u32, work: Fut) -> EngineResult<Step<T>>
    where
        Fut: Future<Output = EngineResult<Option<T>>>,
    {
        let started = Instant::now();
        let result = tokio::time::timeout(self.policy.attempt_timeout, work).await;
        let elapsed = started.elapsed();

        let (outcome, step) = match result {
            Ok(Ok(Some(value))) => (AttemptOutcome::Success, Step::Success(value)),
            Ok(Ok(None)) => {
                debug!(url = %self.target, attempt, "attempt produced no content");
                (AttemptOutcome::Empty, Step::Retry { crashed: false })
            }
            Ok(Err(e)) if e.is_fatal() => return Err(e),
            Ok(Err(e)) => {
                debug!(url = %self.target, attempt, "attempt failed: {e}");
                let crashed = e.requires_new_session();
                (AttemptOutcome::Failed(e.to_string()), Step::Retry { crashed })
            }
            Err(_) => {
                let e = EngineError::Timeout {
                    url: self.target.to_string(),
                    after: self.policy.attempt_timeout,
                };
                debug!(url = %self.target, attempt, "{e}");
                (AttemptOutcome::TimedOut, Step::Retry { crashed: false })
            }
        };

        self.attempts.push(ExtractionAttempt {
            url: self.target.to_string(),
            attempt,
            outcome,
            elapsed,
        });
        Ok(step)
    }

    pub(crate) fn finish<T>(self, value: Option<T>) -> RenderOutcome<T> {
        if value.is_none() {
            debug!(
                url = %self.target,
                attempts = self.attempts.len(),
                "attempts exhausted without content"
            );
        }
        RenderOutcome {
            value,
            attempts: self.attempts,
        }
    }
}

/// Generic retry loop for attempts that manage their own session.
///
/// `attempt` receives the 1-based attempt number and resolves to
/// `Ok(Some(value))` on success, `Ok(None)` when the render was empty.
pub async fn render_with_retry<T, F, Fut>(
    target: &str,
    policy: &RetryPolicy,
    mut attempt: F,
) -> EngineResult<RenderOutcome<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = EngineResult<Option<T>>>,
{
    let mut log = AttemptLog::new(target, policy);
    for n in 1..=policy.max_attempts {
        log.pause_before(n).await;
        if let Step::Success(value) = log.run(n, attempt(n)).await? {
            return Ok(log.finish(Some(value)));
        }
    }
    Ok(log.finish(None))
}
