use crate::error::{Result, SpiderError};
use crate::fetch::Download;
use crate::page::Page;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;
use url::Url;

/// Limits how many downloads run at once.
///
/// Waiters are served in FIFO order. A failed download releases its slot and
/// is reported to its caller once; nothing is retried.
pub struct BoundedDownloader {
    inner: Arc<dyn Download>,
    permits: Arc<Semaphore>,
    limit: usize,
}

impl BoundedDownloader {
    pub fn new(inner: Arc<dyn Download>, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            inner,
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots not currently held by an in-flight download.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl Download for BoundedDownloader {
    async fn download(&self, url: &Url) -> Result<Page> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| SpiderError::Other(format!("Download queue closed: {}", e)))?;
        debug!("Downloading {} ({} slots free)", url, self.permits.available_permits());
        self.inner.download(url).await
    }
}
