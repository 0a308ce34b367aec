//! Raw page fetching.
//!
//! A [`Transport`] moves bytes; [`fetch_page`] turns a transport response into
//! a [`Page`] and enforces the HTML-only rule. [`Download`] is the seam the
//! traversal engine downloads through, so sessions, concurrency limits and
//! caller-supplied download functions all stack on top of each other.

use crate::error::{Result, SpiderError};
use crate::page::Page;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Method};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

const HTML_MEDIA_TYPE: &str = "text/html";

/// Called with every response before its content type is checked.
pub type InspectCallback = Arc<dyn Fn(&TransportResponse) + Send + Sync>;

/// Extra request configuration passed through to the transport.
#[derive(Clone)]
pub struct RequestConfig {
    pub method: Method,
    pub headers: HeaderMap,
    pub inspect: Option<InspectCallback>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            inspect: None,
        }
    }
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("inspect", &self.inspect.is_some())
            .finish()
    }
}

impl RequestConfig {
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_inspect(mut self, inspect: InspectCallback) -> Self {
        self.inspect = Some(inspect);
        self
    }
}

/// What the transport hands back: the served address after redirects,
/// status, headers (repeated `Set-Cookie` values included) and body text.
/// The body is empty unless the response is HTML.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, url: &Url, request: &RequestConfig) -> Result<TransportResponse>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &Url, request: &RequestConfig) -> Result<TransportResponse> {
        let response = self
            .client
            .request(request.method.clone(), url.clone())
            .headers(request.headers.clone())
            .send()
            .await?;

        let served = response.url().clone();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        // Non-HTML bodies are rejected later, so don't download them.
        let body = if is_html(&headers) {
            response.text().await?
        } else {
            debug!("Skipping body of {} ({})", served, media_type(&headers));
            String::new()
        };

        Ok(TransportResponse {
            url: served,
            status,
            headers,
            body,
        })
    }
}

/// The media type of a response, without parameters.
fn media_type(headers: &HeaderMap) -> String {
    let raw = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");
    raw.split(';').next().unwrap_or(raw).trim().to_string()
}

fn is_html(headers: &HeaderMap) -> bool {
    media_type(headers).eq_ignore_ascii_case(HTML_MEDIA_TYPE)
}

/// Fetch `url` and accept the response only if it is HTML.
pub async fn fetch_page(
    transport: &dyn Transport,
    url: &Url,
    request: &RequestConfig,
) -> Result<Page> {
    let response = transport.send(url, request).await?;
    if let Some(inspect) = &request.inspect {
        inspect(&response);
    }

    if !is_html(&response.headers) {
        let content_type = media_type(&response.headers);
        debug!("Rejecting {} ({})", url, content_type);
        return Err(SpiderError::UnsupportedContentType {
            url: url.to_string(),
            content_type,
        });
    }

    Ok(Page {
        url: response.url,
        status: response.status,
        headers: response.headers,
        text: response.body,
    })
}

/// Downloads a single page. The engine never talks to a transport directly.
#[async_trait]
pub trait Download: Send + Sync {
    async fn download(&self, url: &Url) -> Result<Page>;
}

/// Plain, undecorated download through a transport.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    config: RequestConfig,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, config: RequestConfig) -> Self {
        Self { transport, config }
    }
}

#[async_trait]
impl Download for Fetcher {
    async fn download(&self, url: &Url) -> Result<Page> {
        fetch_page(self.transport.as_ref(), url, &self.config).await
    }
}
