//! Error taxonomy for the extraction engine.
//!
//! Only [`EngineError::SessionStart`] and [`EngineError::Config`] are meant to
//! escape a batch call. Everything else is recovered below the render
//! pipeline: converted into an empty value, a failed attempt, or an empty
//! frame chunk.

use std::time::Duration;

/// Errors that can occur while rendering and extracting content.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The browser binary or runtime could not be started.
    #[error("failed to start browser session: {0}")]
    SessionStart(String),

    /// A page failed to load (network error, DOM-ready timeout, bad response).
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A single frame could not be scrolled or read.
    #[error("frame {frame} not accessible: {reason}")]
    FrameAccess { frame: String, reason: String },

    /// The browser process or its protocol connection went away.
    #[error("browser connection lost: {0}")]
    BrowserCrashed(String),

    /// A render attempt exceeded its hard wall-clock deadline.
    #[error("render of {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    /// A plain HTTP request failed.
    #[error("HTTP request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    /// A URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Malformed configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Errors that must abort the enclosing batch instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionStart(_) | Self::Config(_))
    }

    /// Errors after which the current session cannot be reused.
    pub fn requires_new_session(&self) -> bool {
        matches!(self, Self::BrowserCrashed(_))
    }

    pub(crate) fn navigation(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn frame(frame: &str, reason: impl std::fmt::Display) -> Self {
        Self::FrameAccess {
            frame: frame.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;
