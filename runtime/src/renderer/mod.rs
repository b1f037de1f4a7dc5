//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderSession` traits that abstract over the
//! browser engine (currently Chromium via chromiumoxide). The extraction,
//! retry and batch logic only talks to these traits, so it runs unchanged
//! against a scripted fake in tests.

pub mod chromium;

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How to launch a browser session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Disable image loading (text-only rendering).
    pub text_only: bool,
    /// Explicit browser binary; discovered automatically when `None`.
    pub chrome_path: Option<PathBuf>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            text_only: false,
            chrome_path: None,
        }
    }
}

/// Time bounds for one navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationTiming {
    /// Hard bound for the DOM to be parsed.
    pub dom_timeout: Duration,
    /// Best-effort bound for network quiescence; exceeding it is not an error.
    pub quiescence_timeout: Duration,
}

impl Default for NavigationTiming {
    fn default() -> Self {
        Self {
            dom_timeout: Duration::from_secs(30),
            quiescence_timeout: Duration::from_secs(15),
        }
    }
}

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken until the DOM was parsed, in milliseconds.
    pub load_time_ms: u64,
    /// Whether network activity settled before the quiescence bound.
    pub quiescent: bool,
}

/// Identity of one frame attached to the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameHandle {
    /// Browser-assigned frame id.
    pub id: String,
    /// Document URL of the frame, when known.
    pub url: Option<String>,
    pub is_main: bool,
}

impl FrameHandle {
    pub fn new(id: impl Into<String>, url: Option<String>, is_main: bool) -> Self {
        Self {
            id: id.into(),
            url,
            is_main,
        }
    }
}

/// A browser engine that can start exclusively-owned sessions.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Launch a browser process with a single open page.
    ///
    /// Fails with [`EngineError::SessionStart`] when the browser cannot be
    /// started.
    async fn launch(&self, options: &LaunchOptions) -> EngineResult<Box<dyn RenderSession>>;
}

/// One live browser process with exactly one page.
///
/// Sessions are driven sequentially: every method takes the page as it is
/// left by the previous call.
#[async_trait]
pub trait RenderSession: Send {
    /// Load `url`, wait for the DOM, then wait best-effort for quiescence.
    async fn navigate(&mut self, url: &str, timing: &NavigationTiming)
        -> EngineResult<NavigationResult>;
    /// Serialized HTML of the main document.
    async fn html(&self) -> EngineResult<String>;
    /// All frames currently attached to the page, main frame included.
    async fn list_frames(&self) -> EngineResult<Vec<FrameHandle>>;
    /// Wait up to `wait` for the iframe element with id `element_id` and
    /// return the frame it hosts.
    async fn find_frame(&self, element_id: &str, wait: Duration)
        -> EngineResult<Option<FrameHandle>>;
    /// Scroll `frame` down by one viewport and return the new scroll offset.
    async fn scroll_step(&self, frame: &FrameHandle) -> EngineResult<f64>;
    /// Rendered text of the frame's body.
    async fn frame_text(&self, frame: &FrameHandle) -> EngineResult<String>;
    /// Visible text of the main page body.
    async fn body_text(&self) -> EngineResult<String>;
    /// Close the page, then the browser context, then the process.
    async fn close(self: Box<Self>) -> EngineResult<()>;
}

/// A no-op renderer used when Chromium is unavailable.
///
/// Every launch fails with a session-start error, so callers with a
/// non-browser path (the preview collector's HTTP fallback) keep working.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn launch(&self, _options: &LaunchOptions) -> EngineResult<Box<dyn RenderSession>> {
        Err(EngineError::SessionStart(
            "browser not available (HTTP-only mode)".to_string(),
        ))
    }
}
