//! Scoped browser-session acquisition.
//!
//! A [`SessionScope`] owns at most one live [`RenderSession`]. The session is
//! closed when the scope is released, and also when the scope is dropped
//! without release (an error path, a cancelled task, an elapsed timeout), in
//! which case the close runs on a spawned task.

use crate::error::{EngineError, EngineResult};
use crate::renderer::{LaunchOptions, RenderSession, Renderer};
use tracing::{debug, warn};

/// Exclusive owner of one browser session for the duration of a batch or an
/// attempt.
pub struct SessionScope<'r> {
    renderer: &'r dyn Renderer,
    options: LaunchOptions,
    session: Option<Box<dyn RenderSession>>,
    launches: u32,
}

impl<'r> SessionScope<'r> {
    /// Launch a session eagerly.
    ///
    /// Start failures surface here as [`EngineError::SessionStart`]; nothing is
    /// retried at this level.
    pub async fn acquire(renderer: &'r dyn Renderer, options: LaunchOptions) -> EngineResult<Self> {
        let mut scope = Self {
            renderer,
            options,
            session: None,
            launches: 0,
        };
        scope.session().await?;
        Ok(scope)
    }

    /// The live session, launching a fresh one if the previous one was discarded.
    pub async fn session(&mut self) -> EngineResult<&mut dyn RenderSession> {
        if self.session.is_none() {
            let session = self.renderer.launch(&self.options).await?;
            self.launches += 1;
            if self.launches > 1 {
                debug!(launches = self.launches, "re-acquired browser session");
            }
            self.session = Some(session);
        }
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(EngineError::SessionStart("session slot empty after launch".into())),
        }
    }

    /// Close the current session (best-effort) so the next [`session`](Self::session)
    /// call starts a new browser.
    pub async fn discard(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                debug!("error closing discarded session: {e}");
            }
        }
    }

    /// Whether a session is currently open.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// How many browsers this scope has launched.
    pub fn launches(&self) -> u32 {
        self.launches
    }

    /// End the scope, closing the session.
    pub async fn release(mut self) {
        self.discard().await;
    }
}

impl Drop for SessionScope<'_> {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        debug!("error closing abandoned session: {e}");
                    }
                });
            }
            Err(_) => warn!("browser session dropped outside a runtime; process may linger"),
        }
    }
}
