//! HTTP fetcher implementation
//!
//! This module performs the single GET request made for each crawled URL and
//! classifies the response:
//! - HTML success: body returned for parsing
//! - Non-HTML success: body discarded
//! - Off-origin redirect: the foreign target is never requested
//! - HTTP error: non-2xx final status
//! - Transport error: connect failure, timeout, redirect loop, body read failure
//!
//! There is no retry and no caching here. Both belong to other layers: the
//! frontier's visited set is the cache, and a retrying fetcher can wrap any
//! [`PageFetcher`].

use crate::config::Config;
use crate::url::{normalize_href, Origin};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client, Response};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Redirect hops followed within a single fetch
pub const MAX_REDIRECTS: usize = 10;

/// Largest HTML body read into memory
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Upper bound on the TCP/TLS connect phase
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Result of a fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Successfully fetched an HTML page
    Html {
        /// Final URL after same-origin redirects
        final_url: Url,
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value
        content_type: String,
        /// Raw page body
        body: Vec<u8>,
    },

    /// Page is not HTML; the body was not read
    NonHtml {
        final_url: Url,
        status_code: u16,
        /// Content-Type header value, if the server sent one
        content_type: Option<String>,
    },

    /// A redirect pointed outside the crawl origin
    OffOriginRedirect {
        /// The foreign redirect target
        location: Url,
        status_code: u16,
    },

    /// Non-2xx final status
    HttpError { final_url: Url, status_code: u16 },

    /// The request never produced a usable response
    TransportError {
        kind: TransportErrorKind,
        message: String,
    },
}

/// Classification of transport-level failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Request or body read exceeded the timeout
    Timeout,
    /// Connection refused, DNS failure, TLS failure
    Connect,
    /// Redirect loop or too many redirects
    Redirect,
    /// The response body could not be read or was over the size limit
    Body,
    /// Anything else reqwest reports
    Other,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Redirect => "redirect",
            Self::Body => "body",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can retrieve a page for the crawl loop
///
/// Implementations perform exactly one retrieval per call and must bound it
/// in time. The HTTP implementation is [`HttpFetcher`]; tests substitute
/// scripted fetchers.
pub trait PageFetcher: Send + Sync + 'static {
    fn fetch(&self, url: &Url) -> impl Future<Output = FetchOutcome> + Send;
}

/// Fetches pages over HTTP(S) with `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    origin: Origin,
    max_body_bytes: usize,
}

impl HttpFetcher {
    /// Builds a fetcher bound to the crawl origin
    pub fn new(config: &Config, origin: Origin) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config, origin.clone())?;
        Ok(Self {
            client,
            origin,
            max_body_bytes: MAX_BODY_BYTES,
        })
    }

    /// Overrides the HTML body size limit
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> FetchOutcome {
        match self.client.get(url.clone()).send().await {
            Ok(response) => {
                classify_response(response, &self.origin, self.max_body_bytes).await
            }
            Err(e) => transport_error(&e),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// The client identifies itself with the configured user agent, applies the
/// request timeout to the whole exchange (body included) and only follows
/// redirects that stay on `origin`.
///
/// # Example
///
/// ```no_run
/// use site_crawler::config::Config;
/// use site_crawler::crawler::build_http_client;
/// use site_crawler::url::{normalize_url, Origin};
///
/// let config = Config::with_seed("https://example.com/");
/// let seed = normalize_url(&config.crawler.seed_url).unwrap();
/// let client = build_http_client(&config, Origin::from_url(&seed).unwrap()).unwrap();
/// ```
pub fn build_http_client(config: &Config, origin: Origin) -> Result<Client, reqwest::Error> {
    let timeout = config.crawler.request_timeout();

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

    Client::builder()
        .user_agent(config.user_agent.header_value())
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout.min(CONNECT_TIMEOUT))
        .redirect(same_origin_redirects(origin))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Redirect policy that follows same-origin hops only
///
/// A hop to a foreign origin stops the chain and hands the 3xx response back
/// to [`classify_response`], so the foreign server is never contacted.
fn same_origin_redirects(origin: Origin) -> Policy {
    Policy::custom(move |attempt| {
        let hops = attempt.previous().len();
        let looped = attempt.previous().contains(attempt.url());
        let admitted = origin.admits(attempt.url());

        if !admitted {
            attempt.stop()
        } else if looped {
            attempt.error("redirect loop detected")
        } else if hops > MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    })
}

/// Classifies a received response
async fn classify_response(response: Response, origin: &Origin, max_body: usize) -> FetchOutcome {
    let status = response.status();
    let status_code = status.as_u16();
    let mut final_url = response.url().clone();
    final_url.set_fragment(None);

    if status.is_redirection() {
        if let Some(location) = redirect_target(&response) {
            if !origin.admits(&location) {
                return FetchOutcome::OffOriginRedirect {
                    location,
                    status_code,
                };
            }
        }
        return FetchOutcome::HttpError {
            final_url,
            status_code,
        };
    }

    if !status.is_success() {
        return FetchOutcome::HttpError {
            final_url,
            status_code,
        };
    }

    if !origin.admits(&final_url) {
        return FetchOutcome::OffOriginRedirect {
            location: final_url,
            status_code,
        };
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if !is_html_content_type(content_type.as_deref()) {
        return FetchOutcome::NonHtml {
            final_url,
            status_code,
            content_type,
        };
    }

    match read_body(response, max_body).await {
        Ok(body) => FetchOutcome::Html {
            final_url,
            status_code,
            content_type: content_type.unwrap_or_default(),
            body,
        },
        Err(failure) => failure,
    }
}

/// Reads the body chunk by chunk, giving up once it passes `limit` bytes
async fn read_body(mut response: Response, limit: usize) -> Result<Vec<u8>, FetchOutcome> {
    let too_large = || FetchOutcome::TransportError {
        kind: TransportErrorKind::Body,
        message: format!("response body exceeds {} bytes", limit),
    };

    if response
        .content_length()
        .is_some_and(|len| len > limit as u64)
    {
        return Err(too_large());
    }

    let mut body = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if body.len() + chunk.len() > limit {
                    return Err(too_large());
                }
                body.extend_from_slice(&chunk);
            }
            Ok(None) => return Ok(body),
            Err(e) => {
                let kind = if e.is_timeout() {
                    TransportErrorKind::Timeout
                } else {
                    TransportErrorKind::Body
                };
                return Err(FetchOutcome::TransportError {
                    kind,
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Resolves the Location header of a redirect response
fn redirect_target(response: &Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    normalize_href(location, response.url()).ok()
}

/// Maps a reqwest error to a transport failure
fn transport_error(e: &reqwest::Error) -> FetchOutcome {
    let kind = if e.is_timeout() {
        TransportErrorKind::Timeout
    } else if e.is_redirect() {
        TransportErrorKind::Redirect
    } else if e.is_connect() {
        TransportErrorKind::Connect
    } else if e.is_body() || e.is_decode() {
        TransportErrorKind::Body
    } else {
        TransportErrorKind::Other
    };

    FetchOutcome::TransportError {
        kind,
        message: e.to_string(),
    }
}

/// Returns true if the Content-Type names an HTML document
///
/// Only the MIME essence is compared, so parameters such as `charset` are
/// ignored. A missing header is not HTML.
pub fn is_html_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence == "text/html" || essence == "application/xhtml+xml"
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_for(server: &MockServer, timeout_ms: u64) -> HttpFetcher {
        let mut config = Config::with_seed(server.uri());
        config.crawler.request_timeout_ms = timeout_ms;
        let origin = Origin::from_url(&Url::parse(&server.uri()).unwrap()).unwrap();
        HttpFetcher::new(&config, origin).unwrap()
    }

    fn page_url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[test]
    fn test_html_content_types() {
        assert!(is_html_content_type(Some("text/html")));
        assert!(is_html_content_type(Some("text/html; charset=utf-8")));
        assert!(is_html_content_type(Some("TEXT/HTML;charset=ISO-8859-1")));
        assert!(is_html_content_type(Some("application/xhtml+xml")));
    }

    #[test]
    fn test_non_html_content_types() {
        assert!(!is_html_content_type(None));
        assert!(!is_html_content_type(Some("")));
        assert!(!is_html_content_type(Some("application/pdf")));
        assert!(!is_html_content_type(Some("text/plain")));
        assert!(!is_html_content_type(Some("application/json")));
    }

    #[tokio::test]
    async fn test_fetch_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<h1>Home</h1>", "text/html"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = fetcher_for(&server, 2000)
            .fetch(&page_url(&server, "/a"))
            .await;

        match outcome {
            FetchOutcome::Html {
                final_url,
                status_code,
                content_type,
                body,
            } => {
                assert_eq!(final_url, page_url(&server, "/a"));
                assert_eq!(status_code, 200);
                assert!(content_type.starts_with("text/html"));
                assert_eq!(body, b"<h1>Home</h1>");
            }
            other => panic!("expected HTML outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_non_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(vec![0x25, 0x50, 0x44, 0x46], "application/pdf"),
            )
            .mount(&server)
            .await;

        let outcome = fetcher_for(&server, 2000)
            .fetch(&page_url(&server, "/doc.pdf"))
            .await;

        assert!(matches!(
            outcome,
            FetchOutcome::NonHtml { status_code: 200, content_type: Some(ref ct), .. }
                if ct.starts_with("application/pdf")
        ));
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = fetcher_for(&server, 2000)
            .fetch(&page_url(&server, "/missing"))
            .await;

        assert!(matches!(
            outcome,
            FetchOutcome::HttpError {
                status_code: 404,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<h1>Slow</h1>", "text/html")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let outcome = fetcher_for(&server, 200)
            .fetch(&page_url(&server, "/slow"))
            .await;

        assert!(matches!(
            outcome,
            FetchOutcome::TransportError {
                kind: TransportErrorKind::Timeout,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let server = MockServer::start().await;
        let fetcher = fetcher_for(&server, 2000);

        // Grab a free port and close it again so nothing is listening.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();

        let outcome = fetcher.fetch(&url).await;
        assert!(matches!(outcome, FetchOutcome::TransportError { .. }));
    }

    #[tokio::test]
    async fn test_same_origin_redirect_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("Location", "/new"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<h1>New</h1>", "text/html"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = fetcher_for(&server, 2000)
            .fetch(&page_url(&server, "/old"))
            .await;

        match outcome {
            FetchOutcome::Html { final_url, .. } => {
                assert_eq!(final_url, page_url(&server, "/new"));
            }
            other => panic!("expected HTML outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_off_origin_redirect_not_followed() {
        let server = MockServer::start().await;
        let foreign = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/away"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/landing", foreign.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<h1>Foreign</h1>", "text/html"))
            .expect(0)
            .mount(&foreign)
            .await;

        let outcome = fetcher_for(&server, 2000)
            .fetch(&page_url(&server, "/away"))
            .await;

        match outcome {
            FetchOutcome::OffOriginRedirect {
                location,
                status_code,
            } => {
                assert_eq!(status_code, 302);
                assert_eq!(location, page_url(&foreign, "/landing"));
            }
            other => panic!("expected off-origin redirect, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_redirect_loop_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/pong"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pong"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/ping"))
            .mount(&server)
            .await;

        let outcome = fetcher_for(&server, 2000)
            .fetch(&page_url(&server, "/ping"))
            .await;

        assert!(matches!(
            outcome,
            FetchOutcome::TransportError {
                kind: TransportErrorKind::Redirect,
                ..
            }
        ));
    }

    async fn mount_redirect_chain(server: &MockServer, prefix: &str, hops: usize) {
        for i in 0..hops {
            Mock::given(method("GET"))
                .and(path(format!("/{}{}", prefix, i)))
                .respond_with(
                    ResponseTemplate::new(302)
                        .insert_header("Location", format!("/{}{}", prefix, i + 1).as_str()),
                )
                .mount(server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path(format!("/{}{}", prefix, hops)))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<h1>End</h1>", "text/html"))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_redirect_chain_of_ten_hops_is_followed() {
        let server = MockServer::start().await;
        mount_redirect_chain(&server, "r", MAX_REDIRECTS).await;

        let outcome = fetcher_for(&server, 2000)
            .fetch(&page_url(&server, "/r0"))
            .await;

        match outcome {
            FetchOutcome::Html { final_url, .. } => {
                assert_eq!(final_url, page_url(&server, &format!("/r{}", MAX_REDIRECTS)));
            }
            other => panic!("expected HTML outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_redirect_chain_of_eleven_hops_is_transport_error() {
        let server = MockServer::start().await;
        mount_redirect_chain(&server, "r", MAX_REDIRECTS + 1).await;

        let outcome = fetcher_for(&server, 2000)
            .fetch(&page_url(&server, "/r0"))
            .await;

        assert!(matches!(
            outcome,
            FetchOutcome::TransportError {
                kind: TransportErrorKind::Redirect,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("x".repeat(200), "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/small"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<h1>Ok</h1>", "text/html"))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, 2000).with_max_body_bytes(64);

        let outcome = fetcher.fetch(&page_url(&server, "/big")).await;
        match outcome {
            FetchOutcome::TransportError { kind, message } => {
                assert_eq!(kind, TransportErrorKind::Body);
                assert!(message.contains("exceeds 64 bytes"));
            }
            other => panic!("expected body error, got {:?}", other),
        }

        let outcome = fetcher.fetch(&page_url(&server, "/small")).await;
        assert!(matches!(outcome, FetchOutcome::Html { ref body, .. } if body == b"<h1>Ok</h1>"));
    }
}
