//! Address normalization.
//!
//! Every address the engine touches goes through [`clean`] before it is keyed
//! or queued. The dedup key drops the scheme, so `http://h/x` and
//! `https://h/x` are treated as the same page.

use crate::error::{Result, SpiderError};
use url::Url;

/// Parse an absolute address and normalize it with [`clean`].
pub fn clean_url(raw: &str) -> Result<Url> {
    let parsed = Url::parse(raw.trim())
        .map_err(|e| SpiderError::InvalidUrl(format!("{}: {}", raw, e)))?;
    Ok(clean(parsed))
}

/// Drop the fragment and exactly one trailing `/` from the path.
///
/// `http`/`https` URLs always serialize at least a `/` path, so the root
/// stays `/`: `http://h/` and `http://h` clean to the same address.
pub fn clean(mut url: Url) -> Url {
    url.set_fragment(None);
    if !url.cannot_be_a_base() {
        let path = url.path();
        if path.len() > 1 && path.ends_with('/') {
            let trimmed = path[..path.len() - 1].to_string();
            url.set_path(&trimmed);
        }
    }
    url
}

/// The dedup key of a cleaned address: its serialization without the scheme.
pub fn url_key(url: &Url) -> String {
    let serialized = url.as_str();
    serialized[url.scheme().len() + 1..].trim().to_string()
}

/// Resolve `href` against `base` using standard relative-reference rules.
///
/// The scheme of the result is not checked here.
pub fn resolve_link(base: &Url, href: &str) -> Result<Url> {
    base.join(href.trim())
        .map_err(|e| SpiderError::InvalidUrl(format!("{} (relative to {}): {}", href, base, e)))
}
