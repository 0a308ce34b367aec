//! Cookie session.
//!
//! A [`Session`] makes every request it issues look like it came from the
//! same client: the jar is serialized into a `Cookie` header on the way out
//! and every `Set-Cookie` on the way back is merged into it. There is no
//! expiry and no domain or path scoping; the last write to a name wins.

use crate::error::Result;
use crate::fetch::{Download, RequestConfig, Transport, TransportResponse, fetch_page};
use crate::page::Page;
use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, SET_COOKIE};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use url::Url;

type CookieJar = Arc<Mutex<HashMap<String, String>>>;

pub struct Session {
    transport: Arc<dyn Transport>,
    config: RequestConfig,
    cookies: CookieJar,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, config: RequestConfig) -> Self {
        Self {
            transport,
            config,
            cookies: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Snapshot of the jar.
    pub fn cookies(&self) -> HashMap<String, String> {
        lock(&self.cookies).clone()
    }

    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>) {
        lock(&self.cookies).insert(name.into(), value.into());
    }

    /// The `Cookie` header value for the current jar, or `None` if it is empty.
    pub fn cookie_header(&self) -> Option<String> {
        serialize_cookies(&lock(&self.cookies))
    }

    fn decorate(&self) -> RequestConfig {
        let mut config = self.config.clone();

        if let Some(cookie) = self.cookie_header() {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    config.headers.insert(COOKIE, value);
                }
                Err(e) => warn!("Dropping unencodable Cookie header: {}", e),
            }
        }

        let jar = self.cookies.clone();
        let user_inspect = config.inspect.take();
        config.inspect = Some(Arc::new(move |response: &TransportResponse| {
            store_set_cookies(&jar, &response.headers);
            if let Some(ref inspect) = user_inspect {
                inspect(response);
            }
        }));

        config
    }
}

#[async_trait]
impl Download for Session {
    async fn download(&self, url: &Url) -> Result<Page> {
        let config = self.decorate();
        fetch_page(self.transport.as_ref(), url, &config).await
    }
}

fn lock(jar: &CookieJar) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
    jar.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn serialize_cookies(cookies: &HashMap<String, String>) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    let mut pairs: Vec<String> = cookies
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                urlencoding::encode(name),
                urlencoding::encode(value)
            )
        })
        .collect();
    pairs.sort();
    Some(pairs.join("; "))
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Split a `Set-Cookie` value into `(name, value)` pairs.
///
/// Several cookies may be folded into one value separated by `,`; only the
/// first `;` segment of each entry is kept, attributes are ignored.
pub(crate) fn parse_set_cookie(header: &str) -> Vec<(String, String)> {
    header
        .split(',')
        .filter_map(|entry| {
            let pair = entry.split(';').next().unwrap_or(entry);
            let (name, value) = pair.split_once('=')?;
            let name = decode(name.trim());
            if name.is_empty() {
                return None;
            }
            Some((name, decode(value.trim())))
        })
        .collect()
}

fn store_set_cookies(jar: &CookieJar, headers: &HeaderMap) {
    let mut cookies = lock(jar);
    for value in headers.get_all(SET_COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for (name, value) in parse_set_cookie(value) {
            debug!("Storing cookie {}", name);
            cookies.insert(name, value);
        }
    }
}
