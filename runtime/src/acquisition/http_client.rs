//! Async HTTP client wrapping reqwest.
//!
//! Not a browser: fetches the static HTML of a page when rendering is
//! unavailable or produced nothing. Retries 5xx with exponential backoff,
//! honors `Retry-After` on 429, and falls back to HTTP/1.1 on protocol errors.
//! Bodies are decoded with the charset from the header or a `<meta>` tag.

use super::encoding::decode_body;
use crate::error::{EngineError, EngineResult};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

/// Upper bound for a server-requested `Retry-After` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(10);

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    pub status: u16,
    /// Content-Type header, if any.
    pub content_type: Option<String>,
    /// Body decoded to UTF-8.
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client for static page fetches.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for sites that reject HTTP/2.
    h1_client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    /// First 5xx/transport backoff; doubles on each retry.
    backoff: Duration,
}

impl HttpClient {
    /// Create a client with a standard Chrome user-agent.
    pub fn new(timeout: Duration, max_retries: u32) -> EngineResult<Self> {
        let build = |h1_only: bool| {
            let builder = reqwest::Client::builder()
                .timeout(timeout)
                .redirect(reqwest::redirect::Policy::limited(5))
                .user_agent(USER_AGENT);
            let builder = if h1_only { builder.http1_only() } else { builder };
            builder
                .build()
                .map_err(|e| EngineError::Config(format!("cannot build HTTP client: {e}")))
        };

        Ok(Self {
            client: build(false)?,
            h1_client: build(true)?,
            timeout,
            max_retries,
            backoff: Duration::from_millis(500),
        })
    }

    /// Override the initial retry backoff.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// GET `url` and return the body of a 2xx response.
    ///
    /// Non-2xx responses after retries are [`EngineError::Http`].
    pub async fn fetch_html(&self, url: &str) -> EngineResult<String> {
        let response = self.get(url).await?;
        if !response.is_success() {
            return Err(EngineError::Http {
                url: url.to_string(),
                reason: format!("status {}", response.status),
            });
        }
        Ok(response.body)
    }

    /// Single GET with retry on 5xx and backoff on 429.
    ///
    /// Falls back to HTTP/1.1 on protocol errors (some CDNs reject HTTP/2).
    pub async fn get(&self, url: &str) -> EngineResult<HttpResponse> {
        match self.get_inner(&self.client, url).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                let message = format!("{e:?}").to_ascii_lowercase();
                if message.contains("http2")
                    || message.contains("protocol")
                    || message.contains("connection closed")
                {
                    debug!(url = %url, "retrying over HTTP/1.1");
                    self.get_inner(&self.h1_client, url)
                        .await
                        .map_err(|e| http_error(url, e))
                } else {
                    Err(http_error(url, e))
                }
            }
        }
    }

    fn backoff_for(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }

    async fn get_inner(
        &self,
        client: &reqwest::Client,
        url: &str,
    ) -> Result<HttpResponse, reqwest::Error> {
        let mut retries = 0u32;

        loop {
            match client.get(url).timeout(self.timeout).send().await {
                Ok(r) => {
                    let status = r.status().as_u16();

                    if status >= 500 && retries < self.max_retries {
                        retries += 1;
                        debug!(url = %url, status, retries, "server error, backing off");
                        tokio::time::sleep(self.backoff_for(retries)).await;
                        continue;
                    }

                    if status == 429 && retries < self.max_retries {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.trim().parse::<u64>().ok())
                            .map(Duration::from_secs)
                            .unwrap_or_else(|| self.backoff_for(retries));
                        debug!(url = %url, retries, "rate limited, waiting {retry_after:?}");
                        tokio::time::sleep(retry_after.min(MAX_RETRY_AFTER)).await;
                        continue;
                    }

                    let final_url = r.url().to_string();
                    let content_type = r
                        .headers()
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let bytes = r.bytes().await.unwrap_or_default();
                    let body = decode_body(&bytes, content_type.as_deref());

                    return Ok(HttpResponse {
                        url: url.to_string(),
                        final_url,
                        status,
                        content_type,
                        body,
                    });
                }
                Err(e) => {
                    if retries < self.max_retries {
                        retries += 1;
                        debug!(url = %url, retries, "request failed: {e}");
                        tokio::time::sleep(self.backoff_for(retries)).await;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }
}

fn http_error(url: &str, err: reqwest::Error) -> EngineError {
    EngineError::Http {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(Duration::from_secs(5), 2)
            .unwrap()
            .with_backoff(Duration::from_millis(10))
    }

    #[test]
    fn test_backoff_doubles() {
        let c = client();
        assert_eq!(c.backoff_for(1), Duration::from_millis(10));
        assert_eq!(c.backoff_for(2), Duration::from_millis(20));
        assert_eq!(c.backoff_for(3), Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_fetch_html_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/board/view.do"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html><body>ok</body></html>"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/board/view.do", server.uri());
        let response = client().get(&url).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(
            response.content_type.as_deref(),
            Some("text/html; charset=utf-8")
        );
        assert_eq!(client().fetch_html(&url).await.unwrap(), "<html><body>ok</body></html>");
    }

    #[tokio::test]
    async fn test_euc_kr_board_without_header_charset() {
        let html = r#"<html><head><meta http-equiv="Content-Type" content="text/html; charset=euc-kr"></head>
            <body><a href="/files/a.hwp">첨부파일 보도자료.hwp</a></body></html>"#;
        let (bytes, _, _) = encoding_rs::EUC_KR.encode(html);
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bbs/view.jsp"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(bytes.into_owned()),
            )
            .mount(&server)
            .await;

        let body = client()
            .fetch_html(&format!("{}/bbs/view.jsp", server.uri()))
            .await
            .unwrap();
        assert!(body.contains("첨부파일 보도자료.hwp"), "{body}");
        assert!(!body.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let body = client().fetch_html(&server.uri()).await.unwrap();
        assert_eq!(body, "recovered");
    }

    #[tokio::test]
    async fn test_non_success_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client().fetch_html(&server.uri()).await.unwrap_err();
        assert!(matches!(err, EngineError::Http { .. }));
        assert!(err.to_string().contains("404"));
    }
}
