//! Scripted fake browser for integration tests.
//!
//! Each URL maps to a queue of [`Page`] behaviours consumed one per
//! navigation; the last entry repeats once the queue is down to one.

#![allow(dead_code)]

use async_trait::async_trait;
use docview_runtime::error::{EngineError, EngineResult};
use docview_runtime::renderer::{
    FrameHandle, LaunchOptions, NavigationResult, NavigationTiming, RenderSession, Renderer,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the fake browser does when asked to load a URL.
#[derive(Debug, Clone)]
pub enum Page {
    /// Loads; the single frame renders this text.
    Text(String),
    /// Loads; the main document is this HTML and the body text is empty.
    Html(String),
    /// Never finishes loading.
    Hang,
    /// Navigation error; the session stays usable.
    Fail,
    /// The browser dies during navigation.
    Crash,
}

pub fn text(s: &str) -> Page {
    Page::Text(s.to_string())
}

#[derive(Debug, Default)]
pub struct Stats {
    pub launches: u32,
    pub closes: u32,
    pub navigations: Vec<String>,
    pub launch_options: Vec<LaunchOptions>,
}

#[derive(Default)]
struct Shared {
    script: HashMap<String, VecDeque<Page>>,
    stats: Stats,
    fail_launch_after: Option<u32>,
}

/// Renderer whose pages follow a per-URL script.
#[derive(Clone, Default)]
pub struct ScriptedRenderer {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, pages: Vec<Page>) -> Self {
        self.lock().script.insert(url.to_string(), pages.into());
        self
    }

    /// Allow `n` launches, then fail every further one.
    pub fn fail_launch_after(self, n: u32) -> Self {
        self.lock().fail_launch_after = Some(n);
        self
    }

    pub fn launches(&self) -> u32 {
        self.lock().stats.launches
    }

    pub fn closes(&self) -> u32 {
        self.lock().stats.closes
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().stats.navigations.clone()
    }

    pub fn launch_options(&self) -> Vec<LaunchOptions> {
        self.lock().stats.launch_options.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn next_page(&self, url: &str) -> Page {
        let mut shared = self.lock();
        shared.stats.navigations.push(url.to_string());
        match shared.script.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Page::Fail),
            Some(queue) => queue.front().cloned().unwrap_or(Page::Fail),
            None => Page::Fail,
        }
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn launch(&self, options: &LaunchOptions) -> EngineResult<Box<dyn RenderSession>> {
        let mut shared = self.lock();
        if let Some(limit) = shared.fail_launch_after {
            if shared.stats.launches >= limit {
                return Err(EngineError::SessionStart("scripted launch failure".into()));
            }
        }
        shared.stats.launches += 1;
        shared.stats.launch_options.push(options.clone());
        drop(shared);
        Ok(Box::new(ScriptedSession {
            renderer: self.clone(),
            current: None,
            dead: false,
        }))
    }
}

struct ScriptedSession {
    renderer: ScriptedRenderer,
    current: Option<Page>,
    dead: bool,
}

impl ScriptedSession {
    fn alive(&self) -> EngineResult<()> {
        if self.dead {
            Err(EngineError::BrowserCrashed("scripted crash".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RenderSession for ScriptedSession {
    async fn navigate(
        &mut self,
        url: &str,
        _timing: &NavigationTiming,
    ) -> EngineResult<NavigationResult> {
        self.alive()?;
        self.current = None;
        match self.renderer.next_page(url) {
            Page::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(EngineError::Navigation {
                    url: url.to_string(),
                    reason: "hung".into(),
                })
            }
            Page::Fail => Err(EngineError::Navigation {
                url: url.to_string(),
                reason: "connection refused".into(),
            }),
            Page::Crash => {
                self.dead = true;
                Err(EngineError::BrowserCrashed("scripted crash".into()))
            }
            page => {
                self.current = Some(page);
                Ok(NavigationResult {
                    final_url: url.to_string(),
                    load_time_ms: 1,
                    quiescent: true,
                })
            }
        }
    }

    async fn html(&self) -> EngineResult<String> {
        self.alive()?;
        Ok(match &self.current {
            Some(Page::Html(html)) => html.clone(),
            Some(Page::Text(t)) => format!("<html><body><p>{t}</p></body></html>"),
            _ => String::new(),
        })
    }

    async fn list_frames(&self) -> EngineResult<Vec<FrameHandle>> {
        self.alive()?;
        Ok(vec![FrameHandle::new("main", None, true)])
    }

    async fn find_frame(
        &self,
        _element_id: &str,
        _wait: Duration,
    ) -> EngineResult<Option<FrameHandle>> {
        self.alive()?;
        Ok(None)
    }

    async fn scroll_step(&self, _frame: &FrameHandle) -> EngineResult<f64> {
        self.alive()?;
        Ok(0.0)
    }

    async fn frame_text(&self, _frame: &FrameHandle) -> EngineResult<String> {
        self.alive()?;
        Ok(match &self.current {
            Some(Page::Text(t)) => t.clone(),
            _ => String::new(),
        })
    }

    async fn body_text(&self) -> EngineResult<String> {
        self.alive()?;
        Ok(String::new())
    }

    async fn close(self: Box<Self>) -> EngineResult<()> {
        self.renderer.lock().stats.closes += 1;
        Ok(())
    }
}
