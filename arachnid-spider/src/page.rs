use crate::error::{Result, SpiderError};
use reqwest::header::HeaderMap;
use scraper::{Html, Selector};
use url::Url;

/// A successfully downloaded HTML page.
///
/// `url` is the address that actually served the body, which differs from
/// the requested address when redirects were followed. The document tree is
/// built on demand by [`Page::document`] so a `Page` stays `Send + Sync`.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub text: String,
}

impl Page {
    pub fn new(url: Url, text: impl Into<String>) -> Self {
        Self {
            url,
            status: 200,
            headers: HeaderMap::new(),
            text: text.into(),
        }
    }

    /// Parse the body into a queryable document.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.text)
    }

    /// Every `href` of every `<a>` element, in document order.
    pub fn links(&self) -> Result<Vec<String>> {
        extract_links(&self.document())
    }

    pub fn title(&self) -> Option<String> {
        extract_title(&self.document())
    }
}

/// Every `href` of every `<a>` element of an already parsed document.
pub fn extract_links(document: &Html) -> Result<Vec<String>> {
    let selector = Selector::parse("a[href]")
        .map_err(|e| SpiderError::ParseError(format!("a[href]: {}", e)))?;
    Ok(document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| href.to_string())
        .collect())
}

/// Trimmed text of the first `<title>`, if it has any.
pub fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}
