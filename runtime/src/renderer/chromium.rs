//! Chromium-based renderer using chromiumoxide.

use super::{FrameHandle, LaunchOptions, NavigationResult, NavigationTiming, RenderSession, Renderer};
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::FrameId;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::future::Future;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Poll interval for frame lookup and quiescence checks.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Consecutive unchanged polls that count as network quiescence.
const QUIET_POLLS: u32 = 2;

const SCROLL_STEP_JS: &str = "(() => { window.scrollBy(0, Math.max(200, window.innerHeight)); \
                              return window.scrollY; })()";

const BODY_TEXT_JS: &str = "(() => document.body ? document.body.innerText : '')()";

const LOAD_STATE_JS: &str =
    "(() => [document.readyState, performance.getEntriesByType('resource').length])()";

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. Configured path (config file or DOCVIEW_CHROMIUM_PATH)
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        warn!("configured Chromium path does not exist: {}", path.display());
    }

    // 2. ~/.docview/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".docview/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".docview/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".docview/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".docview/chromium/chrome-linux64/chrome"),
                home.join(".docview/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer. Each launch spawns its own browser process.
#[derive(Default)]
pub struct ChromiumRenderer;

impl ChromiumRenderer {
    pub fn new() -> Self {
        Self
    }

    fn browser_config(options: &LaunchOptions) -> EngineResult<BrowserConfig> {
        let chrome_path = find_chromium(options.chrome_path.as_deref()).ok_or_else(|| {
            EngineError::SessionStart(
                "Chromium not found. Set DOCVIEW_CHROMIUM_PATH or install google-chrome."
                    .to_string(),
            )
        })?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");

        builder = if options.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        if options.text_only {
            builder = builder.arg("--blink-settings=imagesEnabled=false");
        }

        builder
            .build()
            .map_err(|e| EngineError::SessionStart(format!("failed to build browser config: {e}")))
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn launch(&self, options: &LaunchOptions) -> EngineResult<Box<dyn RenderSession>> {
        let config = Self::browser_config(options)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| EngineError::SessionStart(format!("failed to launch Chromium: {e}")))?;

        // The handler drives the CDP connection; when it ends the browser is gone.
        let alive = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&alive);
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler error: {e}");
                }
            }
            flag.store(false, Ordering::Relaxed);
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(EngineError::SessionStart(format!("failed to open page: {e}")));
            }
        };

        info!(headless = options.headless, "Chromium session started");

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            alive,
        }))
    }
}

/// A browser process with its single page.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    alive: Arc<AtomicBool>,
}

impl ChromiumSession {
    fn ensure_alive(&self) -> EngineResult<()> {
        if self.alive.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(EngineError::BrowserCrashed("CDP connection closed".to_string()))
        }
    }

    fn is_connection_loss(&self, err: &CdpError) -> bool {
        !self.alive.load(Ordering::Relaxed)
            || matches!(
                err,
                CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse
            )
    }

    fn classify(&self, url: &str, err: CdpError) -> EngineError {
        if self.is_connection_loss(&err) {
            EngineError::BrowserCrashed(err.to_string())
        } else {
            EngineError::navigation(url, err)
        }
    }

    fn classify_frame(&self, frame: &FrameHandle, err: CdpError) -> EngineError {
        if self.is_connection_loss(&err) {
            EngineError::BrowserCrashed(err.to_string())
        } else {
            EngineError::frame(&frame.id, err)
        }
    }

    async fn eval_main<T: DeserializeOwned>(&self, js: &str) -> EngineResult<T> {
        self.ensure_alive()?;
        let result = self
            .page
            .evaluate(js)
            .await
            .map_err(|e| self.classify("main frame", e))?;
        result
            .into_value()
            .map_err(|e| EngineError::frame("main", format!("unexpected JS result: {e}")))
    }

    async fn eval_in_frame<T: DeserializeOwned>(
        &self,
        frame: &FrameHandle,
        js: &str,
    ) -> EngineResult<T> {
        self.ensure_alive()?;
        let context = self
            .page
            .frame_execution_context(FrameId::new(frame.id.clone()))
            .await
            .map_err(|e| self.classify_frame(frame, e))?
            .ok_or_else(|| EngineError::frame(&frame.id, "no execution context"))?;

        let params = EvaluateParams::builder()
            .expression(js)
            .context_id(context)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| EngineError::frame(&frame.id, e))?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| self.classify_frame(frame, e))?;
        result
            .into_value()
            .map_err(|e| EngineError::frame(&frame.id, format!("unexpected JS result: {e}")))
    }

    /// Poll until the document is complete and no new resources start for
    /// `QUIET_POLLS` polls. Returns whether that happened before `bound`.
    async fn wait_for_quiescence(&self, bound: Duration) -> bool {
        let outcome =
            poll_quiescence(bound, || self.eval_main::<(String, u64)>(LOAD_STATE_JS)).await;
        outcome == Quiescence::Settled
    }
}

/// How the post-load wait for network quiet ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quiescence {
    Settled,
    TimedOut { polls: u32 },
    Unavailable,
}

/// Poll `sample` for `(readyState, resource count)` until the page is complete
/// and the count holds for [`QUIET_POLLS`] polls, or `bound` passes.
async fn poll_quiescence<F, Fut>(bound: Duration, mut sample: F) -> Quiescence
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<(String, u64)>>,
{
    let deadline = tokio::time::Instant::now() + bound;
    let mut last_count: Option<u64> = None;
    let mut quiet = 0u32;
    let mut polls = 0u32;

    while tokio::time::Instant::now() < deadline {
        polls += 1;
        match sample().await {
            Ok((state, count)) => {
                if state == "complete" && last_count == Some(count) {
                    quiet += 1;
                    if quiet >= QUIET_POLLS {
                        return Quiescence::Settled;
                    }
                } else {
                    quiet = 0;
                }
                last_count = Some(count);
            }
            Err(e) => {
                debug!("quiescence check failed: {e}");
                return Quiescence::Unavailable;
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    debug!(?bound, polls, resources = ?last_count, "network still busy at quiescence deadline");
    Quiescence::TimedOut { polls }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn navigate(
        &mut self,
        url: &str,
        timing: &NavigationTiming,
    ) -> EngineResult<NavigationResult> {
        self.ensure_alive()?;
        let start = Instant::now();

        match tokio::time::timeout(timing.dom_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(self.classify(url, e)),
            Err(_) => {
                return Err(EngineError::navigation(
                    url,
                    format!("DOM not ready after {:?}", timing.dom_timeout),
                ))
            }
        }
        let load_time_ms = start.elapsed().as_millis() as u64;

        let quiescent = self.wait_for_quiescence(timing.quiescence_timeout).await;
        if !quiescent {
            debug!(url = %url, "network did not settle, continuing with partial content");
        }

        let final_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        Ok(NavigationResult {
            final_url,
            load_time_ms,
            quiescent,
        })
    }

    async fn html(&self) -> EngineResult<String> {
        self.ensure_alive()?;
        self.page
            .content()
            .await
            .map_err(|e| self.classify("main frame", e))
    }

    async fn list_frames(&self) -> EngineResult<Vec<FrameHandle>> {
        self.ensure_alive()?;
        let main = self
            .page
            .mainframe()
            .await
            .map_err(|e| self.classify("main frame", e))?;
        let ids = self
            .page
            .frames()
            .await
            .map_err(|e| self.classify("main frame", e))?;

        let mut frames = Vec::with_capacity(ids.len());
        for id in ids {
            let url = self.page.frame_url(id.clone()).await.ok().flatten();
            let is_main = main.as_ref() == Some(&id);
            frames.push(FrameHandle::new(id.inner().clone(), url, is_main));
        }
        Ok(frames)
    }

    async fn find_frame(
        &self,
        element_id: &str,
        wait: Duration,
    ) -> EngineResult<Option<FrameHandle>> {
        let lookup_js = format!(
            "(() => {{ const f = document.getElementById({}); \
             return f && f.tagName === 'IFRAME' && f.src ? f.src : null; }})()",
            serde_json::to_string(element_id).unwrap_or_else(|_| "''".to_string())
        );
        let deadline = Instant::now() + wait;

        loop {
            if let Some(src) = self.eval_main::<Option<String>>(&lookup_js).await? {
                let frames = self.list_frames().await?;
                if let Some(frame) = frames
                    .into_iter()
                    .find(|f| !f.is_main && f.url.as_deref() == Some(src.as_str()))
                {
                    return Ok(Some(frame));
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn scroll_step(&self, frame: &FrameHandle) -> EngineResult<f64> {
        self.eval_in_frame(frame, SCROLL_STEP_JS).await
    }

    async fn frame_text(&self, frame: &FrameHandle) -> EngineResult<String> {
        self.eval_in_frame(frame, BODY_TEXT_JS).await
    }

    async fn body_text(&self) -> EngineResult<String> {
        self.eval_main(BODY_TEXT_JS).await
    }

    async fn close(self: Box<Self>) -> EngineResult<()> {
        let ChromiumSession {
            mut browser,
            page,
            handler_task,
            ..
        } = *self;

        if let Err(e) = page.close().await {
            debug!("failed to close page: {e}");
        }
        if let Err(e) = browser.close().await {
            debug!("failed to close browser: {e}");
        }
        if let Err(e) = browser.wait().await {
            debug!("failed to reap browser process: {e}");
        }
        handler_task.abort();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_explicit_path_is_skipped() {
        let bogus = Path::new("/nonexistent/docview/chrome");
        let found = find_chromium(Some(bogus));
        assert_ne!(found.as_deref(), Some(bogus));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiescence_settles_on_stable_resource_count() {
        let mut samples = vec![("loading", 3), ("complete", 5), ("complete", 5), ("complete", 5)]
            .into_iter();
        let outcome = poll_quiescence(Duration::from_secs(5), || {
            let (state, count) = samples.next().unwrap_or(("complete", 5));
            async move { Ok((state.to_string(), count)) }
        })
        .await;
        assert_eq!(outcome, Quiescence::Settled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiescence_times_out_on_busy_page() {
        let mut count = 0u64;
        let outcome = poll_quiescence(Duration::from_secs(1), || {
            count += 1;
            let sample = ("complete".to_string(), count);
            async move { Ok(sample) }
        })
        .await;
        assert_eq!(outcome, Quiescence::TimedOut { polls: 4 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiescence_gives_up_when_page_is_gone() {
        let outcome = poll_quiescence(Duration::from_secs(1), || async {
            Err(EngineError::frame("main", "target closed"))
        })
        .await;
        assert_eq!(outcome, Quiescence::Unavailable);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_navigate_and_read_frames() {
        let renderer = ChromiumRenderer::new();
        let mut session = renderer
            .launch(&LaunchOptions::default())
            .await
            .expect("failed to launch session");

        let nav = session
            .navigate(
                "data:text/html,<h1>Hello</h1><p>World</p>",
                &NavigationTiming {
                    dom_timeout: Duration::from_secs(10),
                    quiescence_timeout: Duration::from_secs(2),
                },
            )
            .await
            .expect("navigation failed");
        assert!(nav.load_time_ms < 10_000);

        let frames = session.list_frames().await.expect("list_frames failed");
        assert!(frames.iter().any(|f| f.is_main));

        let text = session.body_text().await.expect("body_text failed");
        assert!(text.contains("Hello"));

        let html = session.html().await.expect("html failed");
        assert!(html.contains("<h1>Hello</h1>"));

        session.close().await.expect("close failed");
    }
}
