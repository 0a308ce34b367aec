//! Visitors and the driver that adapts them for the engine.
//!
//! A [`Visitor`] may implement any subset of its three hooks; the rest
//! default to "proceed unchanged". `before_load` and `visit` answer with a
//! [`Decision`], which can swap in a different visitor for everything below
//! the current page.

use crate::error::{Hook, HookError, Result, SpiderError};
use crate::page::Page;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use url::Url;

pub type HookResult<T = Decision> = std::result::Result<T, HookError>;

/// What a hook wants the engine to do next.
#[derive(Clone)]
pub enum Decision {
    /// Keep going with the current visitor.
    Proceed,
    /// Stop processing this branch.
    Abort,
    /// Keep going, but use this visitor for the rest of the node and its descendants.
    Replace(Arc<dyn Visitor>),
}

impl Decision {
    pub fn replace(visitor: impl Visitor + 'static) -> Self {
        Decision::Replace(Arc::new(visitor))
    }
}

impl fmt::Debug for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Proceed => f.write_str("Proceed"),
            Decision::Abort => f.write_str("Abort"),
            Decision::Replace(_) => f.write_str("Replace(..)"),
        }
    }
}

impl From<bool> for Decision {
    fn from(proceed: bool) -> Self {
        if proceed {
            Decision::Proceed
        } else {
            Decision::Abort
        }
    }
}

impl From<()> for Decision {
    fn from(_: ()) -> Self {
        Decision::Proceed
    }
}

#[async_trait]
pub trait Visitor: Send + Sync {
    /// Called before `url` is downloaded.
    async fn before_load(&self, _url: &Url) -> HookResult {
        Ok(Decision::Proceed)
    }

    /// Called with the downloaded page. Aborting here skips the page's
    /// links but `leave` still runs.
    async fn visit(&self, _page: &Page) -> HookResult {
        Ok(Decision::Proceed)
    }

    /// Called once every child of the page has finished.
    async fn leave(&self, _page: &Page) -> HookResult<()> {
        Ok(())
    }
}

type UrlHook = Box<dyn Fn(&Url) -> Decision + Send + Sync>;
type PageHook = Box<dyn Fn(&Page) -> Decision + Send + Sync>;
type LeaveHook = Box<dyn Fn(&Page) + Send + Sync>;

/// A visitor assembled from plain closures.
///
/// ```ignore
/// let visitor = Hooks::new()
///     .before_load(|url| !url.path().contains("private"))
///     .visit(|page| println!("{}", page.url));
/// ```
#[derive(Default)]
pub struct Hooks {
    before_load: Option<UrlHook>,
    visit: Option<PageHook>,
    leave: Option<LeaveHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before_load<F, R>(mut self, hook: F) -> Self
    where
        F: Fn(&Url) -> R + Send + Sync + 'static,
        R: Into<Decision>,
    {
        self.before_load = Some(Box::new(move |url: &Url| hook(url).into()));
        self
    }

    pub fn visit<F, R>(mut self, hook: F) -> Self
    where
        F: Fn(&Page) -> R + Send + Sync + 'static,
        R: Into<Decision>,
    {
        self.visit = Some(Box::new(move |page: &Page| hook(page).into()));
        self
    }

    pub fn leave<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Page) + Send + Sync + 'static,
    {
        self.leave = Some(Box::new(hook));
        self
    }
}

#[async_trait]
impl Visitor for Hooks {
    async fn before_load(&self, url: &Url) -> HookResult {
        Ok(self
            .before_load
            .as_ref()
            .map_or(Decision::Proceed, |hook| hook(url)))
    }

    async fn visit(&self, page: &Page) -> HookResult {
        Ok(self
            .visit
            .as_ref()
            .map_or(Decision::Proceed, |hook| hook(page)))
    }

    async fn leave(&self, page: &Page) -> HookResult<()> {
        if let Some(hook) = &self.leave {
            hook(page);
        }
        Ok(())
    }
}

/// Total form of a visitor used by the engine.
///
/// `before_load` and `visit` yield `None` to abort, or the driver to use from
/// here down: the same one when the hook proceeded, a fresh one around the
/// replacement visitor otherwise. Hook errors are never swallowed.
#[derive(Clone)]
pub(crate) struct Driver {
    visitor: Arc<dyn Visitor>,
}

impl Driver {
    pub(crate) fn new(visitor: Arc<dyn Visitor>) -> Self {
        Self { visitor }
    }

    fn adopt(&self, decision: Decision) -> Option<Driver> {
        match decision {
            Decision::Proceed => Some(self.clone()),
            Decision::Abort => None,
            Decision::Replace(visitor) => Some(Driver::new(visitor)),
        }
    }

    pub(crate) async fn before_load(&self, url: &Url) -> Result<Option<Driver>> {
        let decision = self
            .visitor
            .before_load(url)
            .await
            .map_err(|source| hook_failure(Hook::BeforeLoad, url, source))?;
        Ok(self.adopt(decision))
    }

    pub(crate) async fn visit(&self, page: &Page) -> Result<Option<Driver>> {
        let decision = self
            .visitor
            .visit(page)
            .await
            .map_err(|source| hook_failure(Hook::Visit, &page.url, source))?;
        Ok(self.adopt(decision))
    }

    pub(crate) async fn leave(&self, page: &Page) -> Result<()> {
        self.visitor
            .leave(page)
            .await
            .map_err(|source| hook_failure(Hook::Leave, &page.url, source))
    }
}

fn hook_failure(hook: Hook, url: &Url, source: HookError) -> SpiderError {
    SpiderError::HookFailure {
        hook,
        url: url.to_string(),
        source,
    }
}
