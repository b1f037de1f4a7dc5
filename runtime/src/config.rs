//! Engine configuration.
//!
//! Read once at start-up and handed to components by reference. Every field
//! has a default, so a config file only needs the keys it wants to change:
//!
//! ```json
//! {
//!   "browser": { "headless": false },
//!   "markdown": { "retryAttempts": 4, "pruneThreshold": 0.5 }
//! }
//! ```

use crate::error::{EngineError, EngineResult};
use crate::pipeline::RetryPolicy;
use crate::renderer::{LaunchOptions, NavigationTiming};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the Chromium binary path.
pub const CHROMIUM_PATH_ENV: &str = "DOCVIEW_CHROMIUM_PATH";

/// Environment variable forcing a headed (`0`/`false`) or headless browser.
pub const HEADLESS_ENV: &str = "DOCVIEW_HEADLESS";

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub browser: BrowserSettings,
    pub extractor: ExtractorSettings,
    pub retry: RetrySettings,
    pub batch: BatchSettings,
    pub http: HttpSettings,
    pub markdown: MarkdownConfig,
}

/// Browser launch and navigation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BrowserSettings {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    /// Upper bound for the DOM to be parsed.
    pub navigation_timeout_seconds: f64,
    /// Upper bound for the best-effort network quiescence wait.
    pub quiescence_timeout_seconds: f64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            navigation_timeout_seconds: 30.0,
            quiescence_timeout_seconds: 15.0,
        }
    }
}

/// Frame-aware extractor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractorSettings {
    pub clean_text: bool,
    /// Element id of the iframe whose text is captured first.
    pub priority_frame_id: String,
    pub priority_frame_wait_ms: u64,
    pub scroll_pause_ms: u64,
    pub max_scroll_steps: u32,
    /// Consecutive non-advancing scroll steps that end the scroll loop.
    pub stable_scroll_steps: u32,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            clean_text: true,
            priority_frame_id: "innerWrap".to_string(),
            priority_frame_wait_ms: 5_000,
            scroll_pause_ms: 120,
            max_scroll_steps: 50,
            stable_scroll_steps: 3,
        }
    }
}

/// Retry discipline for the text pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrySettings {
    /// Total attempts, including the first one.
    pub retry_attempts: u32,
    pub retry_delay_seconds: f64,
    pub attempt_timeout_seconds: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_seconds: 2.0,
            attempt_timeout_seconds: 60.0,
        }
    }
}

/// Batch orchestration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchSettings {
    /// Hard deadline for one candidate URL (navigate + extract).
    pub candidate_timeout_seconds: f64,
    /// Independent browser sessions used by the parallel batch variant.
    pub workers: usize,
    pub delay_between_documents_ms: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            candidate_timeout_seconds: 60.0,
            workers: 1,
            delay_between_documents_ms: 500,
        }
    }
}

/// Static HTTP fetches used by the preview collector's fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpSettings {
    pub timeout_seconds: f64,
    /// Retries on 5xx, 429 and transport errors.
    pub max_retries: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 10.0,
            max_retries: 2,
        }
    }
}

/// How the pruning threshold is applied to each block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PruneThresholdType {
    Fixed,
    Dynamic,
}

/// Settings for the markdown flow, as supplied by the keyword-search collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarkdownConfig {
    pub browser_headless: bool,
    /// Skip image loading while rendering.
    pub text_only_mode: bool,
    pub prune_threshold: f64,
    pub prune_threshold_type: PruneThresholdType,
    pub min_word_threshold: usize,
    pub word_count_threshold: usize,
    pub timeout_seconds: f64,
    /// Retries after the first attempt.
    pub retry_attempts: u32,
    /// Seconds slept between attempts and between articles.
    pub delay_between_attempts: f64,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            browser_headless: true,
            text_only_mode: true,
            prune_threshold: 0.48,
            prune_threshold_type: PruneThresholdType::Dynamic,
            min_word_threshold: 5,
            word_count_threshold: 80,
            timeout_seconds: 40.0,
            retry_attempts: 2,
            delay_between_attempts: 0.2,
        }
    }
}

impl MarkdownConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts.saturating_add(1),
            attempt_timeout: seconds(self.timeout_seconds),
            delay: seconds(self.delay_between_attempts),
        }
    }

    pub fn delay(&self) -> Duration {
        seconds(self.delay_between_attempts)
    }
}

impl EngineConfig {
    /// Default config location: `~/.docview/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".docview").join("config.json"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default path is used if
    /// present, otherwise built-in defaults. Environment overrides are applied
    /// last and the result is validated.
    pub fn load(path: Option<&Path>) -> EngineResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_env_with(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file without applying overrides.
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(CHROMIUM_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            self.browser.chrome_path = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup(HEADLESS_ENV) {
            match value.trim().to_ascii_lowercase().as_str() {
                "0" | "false" | "no" => {
                    self.browser.headless = false;
                    self.markdown.browser_headless = false;
                }
                "1" | "true" | "yes" => {
                    self.browser.headless = true;
                    self.markdown.browser_headless = true;
                }
                other => tracing::warn!("ignoring {HEADLESS_ENV}={other}"),
            }
        }
    }

    /// Reject values that would make the engine hang or never run.
    pub fn validate(&self) -> EngineResult<()> {
        positive("browser.navigationTimeoutSeconds", self.browser.navigation_timeout_seconds)?;
        non_negative("browser.quiescenceTimeoutSeconds", self.browser.quiescence_timeout_seconds)?;
        if self.extractor.max_scroll_steps == 0 {
            return Err(EngineError::Config("extractor.maxScrollSteps must be > 0".into()));
        }
        if self.extractor.stable_scroll_steps == 0 {
            return Err(EngineError::Config("extractor.stableScrollSteps must be > 0".into()));
        }
        if self.retry.retry_attempts == 0 {
            return Err(EngineError::Config("retry.retryAttempts must be > 0".into()));
        }
        non_negative("retry.retryDelaySeconds", self.retry.retry_delay_seconds)?;
        positive("retry.attemptTimeoutSeconds", self.retry.attempt_timeout_seconds)?;
        positive("batch.candidateTimeoutSeconds", self.batch.candidate_timeout_seconds)?;
        if self.batch.workers == 0 {
            return Err(EngineError::Config("batch.workers must be > 0".into()));
        }
        positive("http.timeoutSeconds", self.http.timeout_seconds)?;
        let threshold = self.markdown.prune_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(EngineError::Config(format!(
                "markdown.pruneThreshold must be within [0, 1], got {threshold}"
            )));
        }
        positive("markdown.timeoutSeconds", self.markdown.timeout_seconds)?;
        non_negative("markdown.delayBetweenAttempts", self.markdown.delay_between_attempts)?;
        Ok(())
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            headless: self.browser.headless,
            text_only: false,
            chrome_path: self.browser.chrome_path.clone(),
        }
    }

    /// Launch options for the markdown flow, which carries its own browser flags.
    pub fn markdown_launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            headless: self.markdown.browser_headless,
            text_only: self.markdown.text_only_mode,
            chrome_path: self.browser.chrome_path.clone(),
        }
    }

    pub fn navigation_timing(&self) -> NavigationTiming {
        NavigationTiming {
            dom_timeout: seconds(self.browser.navigation_timeout_seconds),
            quiescence_timeout: seconds(self.browser.quiescence_timeout_seconds),
        }
    }

    pub fn text_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.retry_attempts,
            attempt_timeout: seconds(self.retry.attempt_timeout_seconds),
            delay: seconds(self.retry.retry_delay_seconds),
        }
    }

    pub fn candidate_timeout(&self) -> Duration {
        seconds(self.batch.candidate_timeout_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        seconds(self.http.timeout_seconds)
    }
}

/// Only called on validated values, which always convert.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

fn representable(name: &str, value: f64) -> EngineResult<()> {
    Duration::try_from_secs_f64(value)
        .map(|_| ())
        .map_err(|e| EngineError::Config(format!("{name} is out of range ({value}): {e}")))
}

fn positive(name: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value > 0.0 {
        representable(name, value)
    } else {
        Err(EngineError::Config(format!("{name} must be > 0, got {value}")))
    }
}

fn non_negative(name: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value >= 0.0 {
        representable(name, value)
    } else {
        Err(EngineError::Config(format!("{name} must be >= 0, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_collector_settings() {
        let config = EngineConfig::default();
        assert!(config.browser.headless);
        assert_eq!(config.extractor.priority_frame_id, "innerWrap");
        assert_eq!(config.extractor.max_scroll_steps, 50);
        assert_eq!(config.markdown.prune_threshold, 0.48);
        assert_eq!(config.markdown.word_count_threshold, 80);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_markdown_retry_counts_retries_after_first_attempt() {
        let policy = MarkdownConfig::default().retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(40));
        assert_eq!(policy.delay, Duration::from_millis(200));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{
                "browser": { "headless": false },
                "markdown": { "retryAttempts": 4, "pruneThresholdType": "fixed", "textOnlyMode": false }
            }"#,
        )
        .unwrap();
        assert!(!config.browser.headless);
        assert_eq!(config.browser.navigation_timeout_seconds, 30.0);
        assert_eq!(config.markdown.retry_attempts, 4);
        assert_eq!(config.markdown.prune_threshold_type, PruneThresholdType::Fixed);
        assert!(!config.markdown.text_only_mode);
        assert_eq!(config.markdown.min_word_threshold, 5);
    }

    #[test]
    fn test_validate_rejects_malformed_values() {
        let mut config = EngineConfig::default();
        config.batch.workers = 0;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));

        let mut config = EngineConfig::default();
        config.markdown.prune_threshold = 1.5;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));

        let mut config = EngineConfig::default();
        config.browser.navigation_timeout_seconds = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.retry.retry_delay_seconds = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unrepresentable_durations() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "markdown": { "timeoutSeconds": 1e30 } }"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(EngineError::Config(msg)) if msg.contains("markdown.timeoutSeconds")
        ));

        let mut config = EngineConfig::default();
        config.retry.retry_delay_seconds = f64::MAX;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "http": {{ "timeoutSeconds": 1e300 }} }}"#).unwrap();
        assert!(matches!(
            EngineConfig::load(Some(file.path())),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_markdown_retry_attempts_saturate() {
        let config = MarkdownConfig {
            retry_attempts: u32::MAX,
            ..MarkdownConfig::default()
        };
        assert_eq!(config.retry_policy().max_attempts, u32::MAX);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EngineConfig::default();
        config.apply_env_with(|key| match key {
            CHROMIUM_PATH_ENV => Some("/opt/chrome/chrome".to_string()),
            HEADLESS_ENV => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(config.browser.chrome_path, Some(PathBuf::from("/opt/chrome/chrome")));
        assert!(!config.browser.headless);
        assert!(!config.markdown.browser_headless);
        assert!(!config.launch_options().headless);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "batch": {{ "workers": 3 }} }}"#).unwrap();
        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.batch.workers, 3);
    }

    #[test]
    fn test_load_invalid_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "batch": {{ "workers": 0 }} }}"#).unwrap();
        assert!(matches!(
            EngineConfig::load(Some(file.path())),
            Err(EngineError::Config(_))
        ));

        let missing = Path::new("/nonexistent/docview/config.json");
        assert!(matches!(
            EngineConfig::load(Some(missing)),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_timing_and_policy_conversion() {
        let config = EngineConfig::default();
        let timing = config.navigation_timing();
        assert_eq!(timing.dom_timeout, Duration::from_secs(30));
        assert_eq!(timing.quiescence_timeout, Duration::from_secs(15));
        let policy = config.text_retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(2));
    }
}
