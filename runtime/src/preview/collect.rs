//! Preview collection for a board page: render, resolve, and fall back to
//! the static HTML when rendering finds nothing.

use super::{resolve, urls};
use crate::acquisition::HttpClient;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::renderer::{LaunchOptions, NavigationTiming, Renderer};
use crate::session::SessionScope;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Finds viewer URLs for the attachments of one page.
pub struct PreviewCollector<'r> {
    renderer: &'r dyn Renderer,
    launch: LaunchOptions,
    timing: NavigationTiming,
    render_timeout: Duration,
    http: HttpClient,
}

impl<'r> PreviewCollector<'r> {
    pub fn new(renderer: &'r dyn Renderer, config: &EngineConfig) -> EngineResult<Self> {
        Ok(Self {
            renderer,
            launch: config.launch_options(),
            timing: config.navigation_timing(),
            render_timeout: config.candidate_timeout(),
            http: HttpClient::new(config.http_timeout(), config.http.max_retries)?,
        })
    }

    pub fn with_http_client(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    /// Viewer URLs for `page_url`, normalized.
    ///
    /// The rendered page is tried first; when it yields nothing (or the
    /// browser is unavailable) the page is fetched over HTTP and resolved
    /// again. An unreachable page gives an empty list. Only an unparseable
    /// `page_url` is an error.
    pub async fn collect(&self, page_url: &str) -> EngineResult<Vec<String>> {
        let base_url = urls::base_of(page_url)?;
        self.collect_with_base(page_url, &base_url).await
    }

    /// Like [`collect`](Self::collect), joining relative candidates against
    /// an explicit `base_url` instead of the page origin.
    pub async fn collect_with_base(&self, page_url: &str, base_url: &str) -> EngineResult<Vec<String>> {
        let base_url = base_url.trim_end_matches('/');

        if let Some(html) = self.rendered_html(page_url).await {
            let found = resolve(&html, base_url, page_url);
            if !found.is_empty() {
                info!(url = %page_url, count = found.len(), "preview URLs resolved from rendered page");
                return Ok(found);
            }
            debug!(url = %page_url, "rendered page has no preview candidates");
        }

        let html = match self.http.fetch_html(page_url).await {
            Ok(html) => html,
            Err(e) => {
                debug!("static fetch failed: {e}");
                return Ok(Vec::new());
            }
        };
        let found = resolve(&html, base_url, page_url);
        info!(url = %page_url, count = found.len(), "preview URLs resolved from static HTML");
        Ok(found)
    }

    async fn rendered_html(&self, page_url: &str) -> Option<String> {
        let mut scope = match SessionScope::acquire(self.renderer, self.launch.clone()).await {
            Ok(scope) => scope,
            Err(e) => {
                warn!("browser unavailable, using static HTML: {e}");
                return None;
            }
        };

        let rendered = tokio::time::timeout(self.render_timeout, async {
            let session = scope.session().await?;
            session.navigate(page_url, &self.timing).await?;
            session.html().await
        })
        .await;
        scope.release().await;

        match rendered {
            Ok(Ok(html)) => Some(html),
            Ok(Err(e)) => {
                debug!(url = %page_url, "render failed: {e}");
                None
            }
            Err(_) => {
                debug!(url = %page_url, "render timed out after {:?}", self.render_timeout);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::renderer::NoopRenderer;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn collector(renderer: &dyn Renderer) -> PreviewCollector<'_> {
        let http = HttpClient::new(Duration::from_secs(5), 0).unwrap();
        PreviewCollector::new(renderer, &EngineConfig::default())
            .unwrap()
            .with_http_client(http)
    }

    #[tokio::test]
    async fn test_static_fallback_when_browser_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/brd/view.do"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="bbs_file_preview">
                     <iframe src="/docviewer/skin/doc.html?fn=a.hwpx&rs=/r/1"></iframe>
                   </div>"#,
            ))
            .mount(&server)
            .await;

        let page = format!("{}/brd/view.do", server.uri());
        let urls = collector(&NoopRenderer).collect(&page).await.unwrap();
        assert_eq!(
            urls,
            vec![format!("{}/docviewer/skin/doc.html?fn=a.hwpx&rs=/r/1", server.uri())]
        );
    }

    #[tokio::test]
    async fn test_unreachable_page_yields_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let page = format!("{}/brd/view.do", server.uri());
        let urls = collector(&NoopRenderer).collect(&page).await.unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_relative_page_url_is_rejected() {
        let result = collector(&NoopRenderer).collect("/brd/view.do").await;
        assert!(matches!(result, Err(EngineError::InvalidUrl(_))));
    }
}
