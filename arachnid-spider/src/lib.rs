pub mod address;
pub mod downloader;
pub mod error;
pub mod fetch;
pub mod page;
pub mod session;
pub mod spider;
pub mod visitor;

pub use address::{clean, clean_url, resolve_link, url_key};
pub use downloader::BoundedDownloader;
pub use error::{Hook, HookError, Result, SpiderError};
pub use fetch::{
    Download, Fetcher, HttpTransport, InspectCallback, RequestConfig, Transport,
    TransportResponse, fetch_page,
};
pub use page::{Page, extract_links, extract_title};
pub use session::Session;
pub use spider::{Spider, SpiderOptions};
pub use visitor::{Decision, HookResult, Hooks, Visitor};
