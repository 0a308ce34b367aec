use std::fmt;
use thiserror::Error;

/// Error produced by a visitor hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// The visitor hook that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    BeforeLoad,
    Visit,
    Leave,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::BeforeLoad => f.write_str("before_load"),
            Hook::Visit => f.write_str("visit"),
            Hook::Leave => f.write_str("leave"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SpiderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Content-Type is not text/html (={content_type}) for {url}")]
    UnsupportedContentType { url: String, content_type: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Hook {hook} failed for {url}: {source}")]
    HookFailure {
        hook: Hook,
        url: String,
        #[source]
        source: HookError,
    },

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SpiderError>;
