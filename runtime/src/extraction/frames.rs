//! Frame-aware text extraction.
//!
//! Walks the priority viewer frame first, then every attached frame, scrolling
//! each one until its offset stops moving so lazily rendered pages
//! materialize before the text is read.

use super::text::{clean_text, merge_chunks};
use crate::config::ExtractorSettings;
use crate::error::EngineResult;
use crate::renderer::{FrameHandle, RenderSession};
use std::time::Duration;
use tracing::debug;

/// Offsets closer than this count as "not advancing".
const SCROLL_EPSILON: f64 = 0.5;

/// Extracts merged text from all frames of the page a session is on.
#[derive(Debug, Clone)]
pub struct FrameTextExtractor {
    settings: ExtractorSettings,
}

impl Default for FrameTextExtractor {
    fn default() -> Self {
        Self::new(ExtractorSettings::default())
    }
}

impl FrameTextExtractor {
    pub fn new(settings: ExtractorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    /// Extract the text of the page the session is positioned on.
    ///
    /// Per-frame failures become empty chunks. An error is returned only
    /// when neither the frame list nor the page body can be read.
    pub async fn extract(&self, session: &dyn RenderSession) -> EngineResult<String> {
        let mut chunks: Vec<String> = Vec::new();

        let wait = Duration::from_millis(self.settings.priority_frame_wait_ms);
        match session.find_frame(&self.settings.priority_frame_id, wait).await {
            Ok(Some(frame)) => {
                debug!(frame = %frame.id, "reading priority frame first");
                chunks.push(self.read_frame(session, &frame).await);
            }
            Ok(None) => {}
            Err(e) => debug!("priority frame lookup failed: {e}"),
        }

        let listing_error = match session.list_frames().await {
            Ok(frames) => {
                for frame in &frames {
                    chunks.push(self.read_frame(session, frame).await);
                }
                None
            }
            Err(e) => {
                debug!("frame enumeration failed: {e}");
                Some(e)
            }
        };

        let mut merged = merge_chunks(chunks);
        if merged.trim().is_empty() {
            match session.body_text().await {
                Ok(body) => {
                    debug!("frames yielded no text, using page body");
                    merged = body;
                }
                Err(body_error) => {
                    if let Some(listing_error) = listing_error {
                        debug!("frame listing and body both unreadable: {listing_error}");
                        return Err(body_error);
                    }
                    debug!("body text unavailable: {body_error}");
                }
            }
        }

        if self.settings.clean_text {
            Ok(clean_text(&merged))
        } else {
            Ok(merged)
        }
    }

    /// Scroll then read one frame. Errors yield an empty string.
    async fn read_frame(&self, session: &dyn RenderSession, frame: &FrameHandle) -> String {
        let steps = scroll_to_end(session, frame, &self.settings).await;
        match session.frame_text(frame).await {
            Ok(text) => {
                debug!(frame = %frame.id, steps, chars = text.len(), "frame read");
                text
            }
            Err(e) => {
                debug!(frame = %frame.id, "frame text unavailable: {e}");
                String::new()
            }
        }
    }
}

/// Scroll `frame` one viewport at a time, pausing between steps, until the
/// offset has not advanced for `stable_scroll_steps` consecutive steps or
/// `max_scroll_steps` is reached. Returns the number of steps taken.
///
/// If the offset stops changing after step `k`, the loop ends after step
/// `k + stable_scroll_steps`.
pub(crate) async fn scroll_to_end(
    session: &dyn RenderSession,
    frame: &FrameHandle,
    settings: &ExtractorSettings,
) -> u32 {
    let pause = Duration::from_millis(settings.scroll_pause_ms);
    let mut last: Option<f64> = None;
    let mut unchanged = 0u32;
    let mut steps = 0u32;

    while steps < settings.max_scroll_steps {
        let offset = match session.scroll_step(frame).await {
            Ok(offset) => offset,
            Err(e) => {
                debug!(frame = %frame.id, "scroll failed: {e}");
                break;
            }
        };
        steps += 1;
        tokio::time::sleep(pause).await;

        match last {
            Some(previous) if (offset - previous).abs() < SCROLL_EPSILON => {
                unchanged += 1;
                if unchanged >= settings.stable_scroll_steps {
                    break;
                }
            }
            _ => unchanged = 0,
        }
        last = Some(offset);
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::renderer::{NavigationResult, NavigationTiming};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Frames keyed by id: (offsets per scroll step, text or error).
    #[derive(Default)]
    struct StubSession {
        priority: Option<FrameHandle>,
        frames: Vec<FrameHandle>,
        offsets: HashMap<String, Vec<f64>>,
        texts: HashMap<String, Result<String, String>>,
        body: Option<String>,
        list_fails: bool,
        scrolls: AtomicU32,
    }

    impl StubSession {
        fn frame(mut self, id: &str, text: Result<&str, &str>) -> Self {
            self.frames.push(FrameHandle::new(id, None, self.frames.is_empty()));
            self.texts.insert(
                id.to_string(),
                text.map(str::to_string).map_err(str::to_string),
            );
            self
        }
    }

    #[async_trait]
    impl RenderSession for StubSession {
        async fn navigate(
            &mut self,
            url: &str,
            _timing: &NavigationTiming,
        ) -> EngineResult<NavigationResult> {
            Ok(NavigationResult {
                final_url: url.to_string(),
                load_time_ms: 0,
                quiescent: true,
            })
        }
        async fn html(&self) -> EngineResult<String> {
            Ok(String::new())
        }
        async fn list_frames(&self) -> EngineResult<Vec<FrameHandle>> {
            if self.list_fails {
                return Err(EngineError::BrowserCrashed("gone".into()));
            }
            Ok(self.frames.clone())
        }
        async fn find_frame(
            &self,
            _element_id: &str,
            _wait: Duration,
        ) -> EngineResult<Option<FrameHandle>> {
            Ok(self.priority.clone())
        }
        async fn scroll_step(&self, frame: &FrameHandle) -> EngineResult<f64> {
            let step = self.scrolls.fetch_add(1, Ordering::SeqCst) as usize;
            let offsets = self.offsets.get(&frame.id).cloned().unwrap_or_default();
            Ok(offsets
                .get(step)
                .or(offsets.last())
                .copied()
                .unwrap_or(0.0))
        }
        async fn frame_text(&self, frame: &FrameHandle) -> EngineResult<String> {
            match self.texts.get(&frame.id) {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(reason)) => Err(EngineError::frame(&frame.id, reason)),
                None => Ok(String::new()),
            }
        }
        async fn body_text(&self) -> EngineResult<String> {
            self.body
                .clone()
                .ok_or_else(|| EngineError::BrowserCrashed("page closed".into()))
        }
        async fn close(self: Box<Self>) -> EngineResult<()> {
            Ok(())
        }
    }

    fn raw_settings() -> ExtractorSettings {
        ExtractorSettings {
            clean_text: false,
            ..ExtractorSettings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_stops_three_steps_after_offset_settles() {
        let frame = FrameHandle::new("F", None, true);
        for k in [1usize, 4, 10, 30] {
            let mut offsets: Vec<f64> = (1..=k).map(|i| i as f64 * 800.0).collect();
            offsets.push(k as f64 * 800.0);
            let mut session = StubSession::default();
            session.offsets.insert("F".into(), offsets);
            let steps = scroll_to_end(&session, &frame, &ExtractorSettings::default()).await;
            assert_eq!(steps as usize, k + 3, "k = {k}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_hits_cap_when_never_stable() {
        let frame = FrameHandle::new("F", None, true);
        let mut session = StubSession::default();
        session
            .offsets
            .insert("F".into(), (1..=200).map(|i| i as f64 * 100.0).collect());
        let steps = scroll_to_end(&session, &frame, &ExtractorSettings::default()).await;
        assert_eq!(steps, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_frame_first_and_duplicates_removed() {
        let mut session = StubSession::default()
            .frame("main", Ok("menu"))
            .frame("inner", Ok("document body"));
        session.priority = Some(FrameHandle::new("inner", None, false));

        let text = FrameTextExtractor::new(raw_settings())
            .extract(&session)
            .await
            .unwrap();
        assert_eq!(text, "document body\n\nmenu");
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_error_is_isolated() {
        let session = StubSession::default()
            .frame("main", Ok("visible"))
            .frame("broken", Err("cross-origin"))
            .frame("other", Ok("more"));
        let text = FrameTextExtractor::new(raw_settings())
            .extract(&session)
            .await
            .unwrap();
        assert_eq!(text, "visible\n\nmore");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_frames_fall_back_to_body() {
        let mut session = StubSession::default().frame("main", Ok("   "));
        session.body = Some("  body   text \n\n\n\n here ".into());
        let text = FrameTextExtractor::default().extract(&session).await.unwrap();
        assert_eq!(text, "body text here");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_page_is_an_error() {
        let session = StubSession {
            list_fails: true,
            ..StubSession::default()
        };
        let result = FrameTextExtractor::default().extract(&session).await;
        assert!(matches!(result, Err(EngineError::BrowserCrashed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_ok_but_nothing_readable_is_empty() {
        let session = StubSession::default().frame("main", Err("detached"));
        let text = FrameTextExtractor::default().extract(&session).await.unwrap();
        assert_eq!(text, "");
    }
}
