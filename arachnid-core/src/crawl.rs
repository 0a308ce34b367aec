use arachnid_spider::{
    Decision, HookResult, Page, RequestConfig, Spider, SpiderOptions, Visitor, clean,
    extract_links, extract_title, resolve_link,
};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub urls: Vec<String>,
    pub parallel_connections: usize,
    pub max_depth: usize,
    pub follow_mode: FollowMode,
    pub session: bool,
    pub max_url_size: usize,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
    pub show_progress_bars: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            parallel_connections: 1,
            max_depth: 3,
            follow_mode: FollowMode::Disabled,
            session: false,
            max_url_size: 128,
            headers: Vec::new(),
            timeout: Duration::from_secs(10),
            show_progress_bars: false,
        }
    }
}

/// Cross-domain following behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowMode {
    /// Never follow cross-domain links
    Disabled,
    /// Automatically follow all cross-domain links
    Auto,
}

/// One visited page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub content_length: usize,
    pub depth: usize,
    pub parent: Option<String>,
    pub title: Option<String>,
    pub links_found: Vec<String>,
}

impl CrawlResult {
    pub fn from_page(page: &Page, depth: usize, parent: Option<String>) -> Self {
        let content_type = page
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let document = page.document();
        let title = extract_title(&document);
        let links_found = extract_links(&document)
            .unwrap_or_default()
            .iter()
            .filter_map(|href| resolve_link(&page.url, href).ok())
            .map(clean)
            .filter(|url| url.scheme() == "http" || url.scheme() == "https")
            .map(|url| url.to_string())
            .collect();

        Self {
            url: page.url.to_string(),
            status_code: page.status,
            content_type,
            content_length: page.text.len(),
            depth,
            parent,
            title,
            links_found,
        }
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Callback for reporting individual crawl results as they come in
pub type CrawlResultCallback = Arc<dyn Fn(CrawlResult) + Send + Sync>;

/// Records every visited page and scopes the crawl by host and depth.
///
/// Each page hands its children a copy of itself one level deeper, with the
/// page as their parent.
#[derive(Clone)]
pub struct RecordingVisitor {
    depth: usize,
    max_depth: usize,
    parent: Option<String>,
    base_domain: String,
    follow_mode: FollowMode,
    results: Arc<StdMutex<Vec<CrawlResult>>>,
    result_callback: Option<CrawlResultCallback>,
}

impl RecordingVisitor {
    pub fn new(
        base_domain: impl Into<String>,
        max_depth: usize,
        follow_mode: FollowMode,
        results: Arc<StdMutex<Vec<CrawlResult>>>,
    ) -> Self {
        Self {
            depth: 0,
            max_depth,
            parent: None,
            base_domain: base_domain.into(),
            follow_mode,
            results,
            result_callback: None,
        }
    }

    pub fn with_result_callback(mut self, callback: CrawlResultCallback) -> Self {
        self.result_callback = Some(callback);
        self
    }

    fn child(&self, parent: &Url) -> Self {
        Self {
            depth: self.depth + 1,
            parent: Some(parent.to_string()),
            ..self.clone()
        }
    }
}

#[async_trait]
impl Visitor for RecordingVisitor {
    async fn before_load(&self, url: &Url) -> HookResult {
        if self.follow_mode == FollowMode::Disabled && !is_same_domain(url, &self.base_domain) {
            debug!("  -> Cross-domain, skipping {}", url);
            return Ok(Decision::Abort);
        }
        Ok(Decision::Proceed)
    }

    async fn visit(&self, page: &Page) -> HookResult {
        let result = CrawlResult::from_page(page, self.depth, self.parent.clone());
        if let Some(ref callback) = self.result_callback {
            callback(result.clone());
        }
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(result);

        if self.depth >= self.max_depth {
            return Ok(Decision::Abort);
        }
        Ok(Decision::replace(self.child(&page.url)))
    }
}

/// Whether `url` is on `base_domain` or one of its subdomains
pub fn is_same_domain(url: &Url, base_domain: &str) -> bool {
    match url.host_str() {
        Some(host) => host == base_domain || host.ends_with(&format!(".{}", base_domain)),
        None => false,
    }
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Turn `(name, value)` pairs into request headers
pub fn build_headers(headers: &[(String, String)]) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| format!("Invalid header name '{}': {}", name, e))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| format!("Invalid value for header '{}': {}", name, e))?;
        map.append(name, value);
    }
    Ok(map)
}

/// Execute a crawl with the given options
/// Returns the crawl results
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
    result_callback: Option<CrawlResultCallback>,
) -> Result<Vec<CrawlResult>, String> {
    let CrawlOptions {
        urls,
        parallel_connections,
        max_depth,
        follow_mode,
        session,
        max_url_size,
        headers,
        timeout,
        show_progress_bars,
    } = options;

    let request = RequestConfig::default().with_headers(build_headers(&headers)?);
    let spider = Spider::with_options(
        SpiderOptions::default()
            .with_parallel_connections(parallel_connections)
            .with_session(session)
            .with_max_url_size(max_url_size)
            .with_timeout(timeout)
            .with_request(request),
    )
    .map_err(|e| format!("Failed to create spider: {}", e))?;

    // Set up single progress bar for overall crawl progress (only if enabled)
    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .map_err(|e| format!("Invalid progress template: {}", e))?;
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    // Counter for tracking processed URLs
    let processed_count = Arc::new(AtomicUsize::new(0));

    let count_clone = processed_count.clone();
    let pb_clone = progress_bar.clone();
    let user_callback = result_callback.clone();
    let recording_callback: CrawlResultCallback = Arc::new(move |result: CrawlResult| {
        let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(ref pb) = pb_clone {
            pb.set_message(format!("Crawling... {} pages visited ({})", count, result.url));
        }
        if let Some(ref cb) = user_callback {
            cb(result);
        }
    });

    let results: Arc<StdMutex<Vec<CrawlResult>>> = Arc::new(StdMutex::new(Vec::new()));

    for (idx, url_str) in urls.iter().enumerate() {
        if let Some(ref callback) = progress_callback
            && urls.len() > 1
        {
            callback(format!(
                "Crawling host {}/{}: {}",
                idx + 1,
                urls.len(),
                url_str
            ));
        }

        let base_domain = Url::parse(url_str)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_default();
        let visitor = RecordingVisitor::new(base_domain, max_depth, follow_mode, results.clone())
            .with_result_callback(recording_callback.clone());

        if let Err(e) = spider.visit(url_str, visitor).await
            && let Some(ref callback) = progress_callback
        {
            callback(format!("[!]  Failed to crawl {}: {}", url_str, e));
        }
    }

    // Finish progress bar (only if enabled)
    if let Some(ref pb) = progress_bar {
        let total = processed_count.load(Ordering::Relaxed);
        pb.finish_with_message(format!("Crawl complete! {} pages visited", total));
    }

    let all_results = results
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    Ok(all_results)
}
