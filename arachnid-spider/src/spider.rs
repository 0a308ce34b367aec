use crate::address::{clean, clean_url, resolve_link, url_key};
use crate::downloader::BoundedDownloader;
use crate::error::{Result, SpiderError};
use crate::fetch::{Download, Fetcher, HttpTransport, RequestConfig, Transport};
use crate::page::Page;
use crate::session::Session;
use crate::visitor::{Driver, Visitor};
use futures::future::{BoxFuture, FutureExt, join_all};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_MAX_URL_SIZE: usize = 128;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// How a [`Spider`] builds its download pipeline.
#[derive(Debug, Clone)]
pub struct SpiderOptions {
    pub parallel_connections: usize,
    pub session: bool,
    pub max_url_size: usize,
    pub timeout: Duration,
    pub user_agent: String,
    pub request: RequestConfig,
}

impl Default for SpiderOptions {
    fn default() -> Self {
        Self {
            parallel_connections: 1,
            session: false,
            max_url_size: DEFAULT_MAX_URL_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("arachnid/{}", env!("CARGO_PKG_VERSION")),
            request: RequestConfig::default(),
        }
    }
}

impl SpiderOptions {
    pub fn with_parallel_connections(mut self, parallel_connections: usize) -> Self {
        self.parallel_connections = parallel_connections;
        self
    }

    pub fn with_session(mut self, session: bool) -> Self {
        self.session = session;
        self
    }

    pub fn with_max_url_size(mut self, max_url_size: usize) -> Self {
        self.max_url_size = max_url_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_request(mut self, request: RequestConfig) -> Self {
        self.request = request;
        self
    }
}

/// Walks a site one page at a time, asking a [`Visitor`] what to do at each step.
///
/// Each address is processed at most once per [`Spider::visit`] call. Pages
/// are handled as `before_load → download → visit → children → leave`;
/// children run concurrently and a failing child only takes its own subtree
/// down. Running two visits on the same instance at once is not supported.
#[derive(Clone)]
pub struct Spider {
    download: Arc<dyn Download>,
    visited: Arc<Mutex<HashSet<String>>>,
    max_url_size: usize,
}

impl Spider {
    pub fn new() -> Result<Self> {
        Self::with_options(SpiderOptions::default())
    }

    pub fn with_options(options: SpiderOptions) -> Result<Self> {
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(options.timeout, &options.user_agent)?);
        let raw: Arc<dyn Download> = if options.session {
            Arc::new(Session::new(transport, options.request))
        } else {
            Arc::new(Fetcher::new(transport, options.request))
        };
        let bounded = BoundedDownloader::new(raw, options.parallel_connections);
        Ok(Self::with_download(Arc::new(bounded), options.max_url_size))
    }

    /// Use a caller-supplied download pipeline as-is.
    pub fn with_download(download: Arc<dyn Download>, max_url_size: usize) -> Self {
        Self {
            download,
            visited: Arc::new(Mutex::new(HashSet::new())),
            max_url_size,
        }
    }

    pub fn max_url_size(&self) -> usize {
        self.max_url_size
    }

    /// Number of addresses claimed by the current or last run.
    pub async fn visited_count(&self) -> usize {
        self.visited.lock().await.len()
    }

    pub async fn visit(&self, start_url: &str, visitor: impl Visitor + 'static) -> Result<()> {
        let start = clean_url(start_url)?;
        self.visit_url(start, Arc::new(visitor)).await
    }

    /// Crawl everything reachable from `start`. Fails only if the start page
    /// itself fails; deeper failures are logged and skipped.
    pub async fn visit_url(&self, start: Url, visitor: Arc<dyn Visitor>) -> Result<()> {
        self.visited.lock().await.clear();
        let start = clean(start);
        info!("Starting crawl of {}", start);
        self.process_url(start, Driver::new(visitor)).await?;
        info!("Crawl complete. Visited {} pages", self.visited_count().await);
        Ok(())
    }

    fn process_url(&self, url: Url, driver: Driver) -> BoxFuture<'static, Result<()>> {
        let spider = self.clone();
        async move {
            if !spider.visited.lock().await.insert(url_key(&url)) {
                return Ok(());
            }

            let Some(driver) = driver.before_load(&url).await? else {
                debug!("Skipping {}", url);
                return Ok(());
            };

            debug!("Fetching {}", url);
            let page = spider.download.download(&url).await?;

            debug!("Visiting {}", url);
            let leaving = match driver.visit(&page).await? {
                Some(child_driver) => {
                    spider.descend(&page, &child_driver).await;
                    child_driver
                }
                None => driver,
            };

            debug!("Leaving {}", url);
            leaving.leave(&page).await
        }
        .boxed()
    }

    async fn descend(&self, page: &Page, driver: &Driver) {
        let children = self.child_urls(page);
        let tasks: Vec<_> = children
            .into_iter()
            .map(|child| {
                let task = tokio::spawn(self.process_url(child.clone(), driver.clone()));
                (child, task)
            })
            .collect();

        let (urls, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        for (child, outcome) in urls.into_iter().zip(join_all(handles).await) {
            if let Err(e) = outcome.map_err(SpiderError::from).and_then(|result| result) {
                warn!("Error {} {}", child, e);
            }
        }
    }

    /// Links of `page` worth following: resolved against the served address,
    /// cleaned, `http`/`https` only and no longer than `max_url_size`.
    fn child_urls(&self, page: &Page) -> Vec<Url> {
        let links = match page.links() {
            Ok(links) => links,
            Err(e) => {
                warn!("Error {} {}", page.url, e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let mut children = Vec::new();
        for href in links {
            let child = match resolve_link(&page.url, &href) {
                Ok(resolved) => clean(resolved),
                Err(e) => {
                    debug!("Dropping link {}: {}", href, e);
                    continue;
                }
            };
            if child.as_str().len() > self.max_url_size {
                debug!("Dropping oversized link {}", child);
                continue;
            }
            if child.scheme() != "http" && child.scheme() != "https" {
                debug!("Dropping {} link {}", child.scheme(), child);
                continue;
            }
            if seen.insert(child.as_str().to_string()) {
                children.push(child);
            }
        }
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visitor::{Decision, HookResult, Hooks};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// An in-memory site: path → body. Unknown paths fail to download.
    struct Site {
        pages: HashMap<String, String>,
        downloads: StdMutex<Vec<String>>,
    }

    impl Site {
        fn new(pages: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(p, body)| (p.to_string(), body.to_string()))
                    .collect(),
                downloads: StdMutex::new(Vec::new()),
            })
        }

        fn downloads(&self) -> Vec<String> {
            self.downloads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Download for Site {
        async fn download(&self, url: &Url) -> Result<Page> {
            self.downloads.lock().unwrap().push(url.to_string());
            tokio::task::yield_now().await;
            let key = match url.query() {
                Some(q) => format!("{}?{}", url.path(), q),
                None => url.path().to_string(),
            };
            match self.pages.get(&key) {
                Some(body) => Ok(Page::new(url.clone(), body.as_str())),
                None => Err(SpiderError::Other(format!("404 {}", url))),
            }
        }
    }

    fn links(hrefs: &[&str]) -> String {
        let anchors: String = hrefs
            .iter()
            .map(|h| format!(r#"<a href="{}">x</a>"#, h))
            .collect();
        format!("<html><body>{}</body></html>", anchors)
    }

    #[derive(Default)]
    struct Journal {
        events: StdMutex<Vec<String>>,
    }

    impl Journal {
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.events().iter().filter(|e| e.starts_with(prefix)).count()
        }
    }

    fn journaling(journal: Arc<Journal>) -> Hooks {
        let (j1, j2, j3) = (journal.clone(), journal.clone(), journal);
        Hooks::new()
            .before_load(move |url| j1.push(format!("before {}", url.path())))
            .visit(move |page| j2.push(format!("visit {}", page.url.path())))
            .leave(move |page| j3.push(format!("leave {}", page.url.path())))
    }

    fn spider(site: Arc<Site>) -> Spider {
        Spider::with_download(site, DEFAULT_MAX_URL_SIZE)
    }

    #[tokio::test]
    async fn test_hook_order_for_single_page() {
        let site = Site::new(&[("/", "<html></html>")]);
        let journal = Arc::new(Journal::default());

        spider(site)
            .visit("http://example.com/", journaling(journal.clone()))
            .await
            .unwrap();

        assert_eq!(journal.events(), vec!["before /", "visit /", "leave /"]);
    }

    #[tokio::test]
    async fn test_visits_each_page_once() {
        let site = Site::new(&[
            ("/", &links(&["a", "b", "a#top", "b/"])),
            ("/a", &links(&["/b", "/", "https://example.com/a"])),
            ("/b", &links(&["/a", "/c"])),
            ("/c", &links(&["/"])),
        ]);
        let journal = Arc::new(Journal::default());
        let spider = spider(site.clone());

        spider
            .visit("http://example.com/", journaling(journal.clone()))
            .await
            .unwrap();

        assert_eq!(journal.count("visit"), 4);
        assert_eq!(journal.count("before"), 4);
        assert_eq!(journal.count("leave"), 4);
        assert_eq!(site.downloads().len(), 4);
        assert_eq!(spider.visited_count().await, 4);
    }

    #[tokio::test]
    async fn test_dedup_set_cleared_between_visits() {
        let site = Site::new(&[("/", &links(&["a"])), ("/a", "<html></html>")]);
        let spider = spider(site.clone());

        spider.visit("http://example.com/", Hooks::new()).await.unwrap();
        spider.visit("http://example.com/", Hooks::new()).await.unwrap();

        assert_eq!(site.downloads().len(), 4);
    }

    #[tokio::test]
    async fn test_children_join_before_leave() {
        let site = Site::new(&[
            ("/", &links(&["a", "b"])),
            ("/a", "<html></html>"),
            ("/b", "<html></html>"),
        ]);
        let journal = Arc::new(Journal::default());

        spider(site)
            .visit("http://example.com/", journaling(journal.clone()))
            .await
            .unwrap();

        let events = journal.events();
        assert_eq!(events.last().map(String::as_str), Some("leave /"));
        assert!(events.contains(&"leave /a".to_string()));
        assert!(events.contains(&"leave /b".to_string()));
    }

    #[tokio::test]
    async fn test_before_load_abort_skips_everything() {
        let site = Site::new(&[("/", &links(&["secret"])), ("/secret", &links(&["deeper"]))]);
        let journal = Arc::new(Journal::default());
        let j = journal.clone();
        let visitor = Hooks::new()
            .before_load(|url| url.path() != "/secret")
            .visit(move |page| j.push(format!("visit {}", page.url.path())));

        spider(site.clone())
            .visit("http://example.com/", visitor)
            .await
            .unwrap();

        assert_eq!(journal.events(), vec!["visit /"]);
        assert_eq!(site.downloads(), vec!["http://example.com/"]);
    }

    #[tokio::test]
    async fn test_visit_abort_still_leaves() {
        let site = Site::new(&[("/", &links(&["a"])), ("/a", "<html></html>")]);
        let journal = Arc::new(Journal::default());
        let (j1, j2) = (journal.clone(), journal.clone());
        let visitor = Hooks::new()
            .visit(move |page| {
                j1.push(format!("visit {}", page.url.path()));
                false
            })
            .leave(move |page| j2.push(format!("leave {}", page.url.path())));

        spider(site.clone())
            .visit("http://example.com/", visitor)
            .await
            .unwrap();

        assert_eq!(journal.events(), vec!["visit /", "leave /"]);
        assert_eq!(site.downloads().len(), 1);
    }

    struct Depth {
        depth: usize,
        seen: Arc<StdMutex<Vec<(String, usize)>>>,
    }

    #[async_trait]
    impl Visitor for Depth {
        async fn visit(&self, page: &Page) -> HookResult {
            self.seen
                .lock()
                .unwrap()
                .push((page.url.path().to_string(), self.depth));
            Ok(Decision::replace(Depth {
                depth: self.depth + 1,
                seen: self.seen.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn test_replacement_applies_to_descendants_only() {
        let site = Site::new(&[
            ("/", &links(&["a", "b"])),
            ("/a", &links(&["/a/x"])),
            ("/a/x", "<html></html>"),
            ("/b", "<html></html>"),
        ]);
        let seen = Arc::new(StdMutex::new(Vec::new()));

        spider(site)
            .visit(
                "http://example.com/",
                Depth {
                    depth: 0,
                    seen: seen.clone(),
                },
            )
            .await
            .unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("/".to_string(), 0),
                ("/a".to_string(), 1),
                ("/a/x".to_string(), 2),
                ("/b".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_before_load_replacement_drives_visit() {
        let site = Site::new(&[("/", "<html></html>")]);
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let visitor = Hooks::new()
            .before_load(move |_| {
                let hits = hits_clone.clone();
                Decision::replace(Hooks::new().visit(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                }))
            })
            .visit(|_| -> bool { panic!("original visit must not run") });

        spider(site)
            .visit("http://example.com/", visitor)
            .await
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_child_failure_is_isolated() {
        let site = Site::new(&[
            ("/", &links(&["missing", "ok"])),
            ("/ok", &links(&["deep"])),
            ("/deep", "<html></html>"),
        ]);
        let journal = Arc::new(Journal::default());

        spider(site)
            .visit("http://example.com/", journaling(journal.clone()))
            .await
            .unwrap();

        let events = journal.events();
        assert!(events.contains(&"before /missing".to_string()));
        assert!(!events.contains(&"visit /missing".to_string()));
        assert!(events.contains(&"visit /deep".to_string()));
        assert_eq!(events.last().map(String::as_str), Some("leave /"));
    }

    #[tokio::test]
    async fn test_panicking_child_is_isolated() {
        let site = Site::new(&[
            ("/", &links(&["boom", "calm"])),
            ("/boom", "<html></html>"),
            ("/calm", "<html></html>"),
        ]);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let visitor = Hooks::new().visit(move |page| {
            if page.url.path() == "/boom" {
                panic!("visitor blew up");
            }
            seen_clone.lock().unwrap().push(page.url.path().to_string());
        });

        spider(site)
            .visit("http://example.com/", visitor)
            .await
            .unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["/", "/calm"]);
    }

    #[tokio::test]
    async fn test_join_error_converts() {
        let handle: tokio::task::JoinHandle<()> = tokio::spawn(async { panic!("gone") });
        let join_error = handle.await.unwrap_err();
        let err = SpiderError::from(join_error);
        assert!(matches!(err, SpiderError::JoinError(_)));
        assert!(err.to_string().starts_with("Task join error"));
    }

    struct FailingLeave;

    #[async_trait]
    impl Visitor for FailingLeave {
        async fn leave(&self, page: &Page) -> HookResult<()> {
            if page.url.path() == "/child" {
                return Err("child leave failed".into());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_child_hook_failure_is_isolated() {
        let site = Site::new(&[("/", &links(&["child"])), ("/child", "<html></html>")]);
        assert!(
            spider(site)
                .visit("http://example.com/", FailingLeave)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_root_failure_propagates() {
        let site = Site::new(&[]);
        let err = spider(site)
            .visit("http://example.com/", Hooks::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SpiderError::Other(_)));
    }

    #[tokio::test]
    async fn test_root_hook_failure_propagates() {
        struct Broken;

        #[async_trait]
        impl Visitor for Broken {
            async fn before_load(&self, _url: &Url) -> HookResult {
                Err("nope".into())
            }
        }

        let site = Site::new(&[("/", "<html></html>")]);
        let err = spider(site.clone())
            .visit("http://example.com/", Broken)
            .await
            .unwrap_err();
        assert!(matches!(err, SpiderError::HookFailure { .. }));
        assert!(site.downloads().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_seed() {
        let site = Site::new(&[]);
        let err = spider(site)
            .visit("/relative", Hooks::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SpiderError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_child_filters() {
        let long = format!("/{}", "o".repeat(150));
        let site = Site::new(&[(
            "/",
            &links(&[
                "mailto:someone@somewhere.com",
                "sftp://somewhere.com/download.pdf",
                "javascript:void(0)",
                long.as_str(),
                "http://[::1",
                "ok",
            ]),
        ), ("/ok", "<html></html>")]);

        spider(site.clone())
            .visit("http://example.com/", Hooks::new())
            .await
            .unwrap();

        assert_eq!(
            site.downloads(),
            vec!["http://example.com/", "http://example.com/ok"]
        );
    }

    #[tokio::test]
    async fn test_max_url_size_is_configurable() {
        let site = Site::new(&[("/", &links(&["abcdefghij"])), ("/abcdefghij", "<html></html>")]);

        Spider::with_download(site.clone(), 20)
            .visit("http://example.com/", Hooks::new())
            .await
            .unwrap();

        assert_eq!(site.downloads().len(), 1);
    }

    #[tokio::test]
    async fn test_scheme_aliases_share_a_key() {
        let site = Site::new(&[("/", &links(&["https://example.com/", "https://example.com/a"])), ("/a", "<html></html>")]);

        spider(site.clone())
            .visit("http://example.com/", Hooks::new())
            .await
            .unwrap();

        assert_eq!(
            site.downloads(),
            vec!["http://example.com/", "https://example.com/a"]
        );
    }

    #[test]
    fn test_options_defaults() {
        let options = SpiderOptions::default();
        assert_eq!(options.parallel_connections, 1);
        assert!(!options.session);
        assert_eq!(options.max_url_size, 128);
        assert!(options.user_agent.starts_with("arachnid/"));
    }
}
