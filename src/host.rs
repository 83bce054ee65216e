use async_trait::async_trait;
use log::debug;

use crate::error::Result;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Text-over-HTTP capability.
///
/// Follows browser `fetch` semantics: the body is returned for any HTTP
/// status, and only a transport-level failure is an error. Caption
/// endpoints answer errors with HTML pages that the normalizer is expected
/// to reduce to blank, so a non-2xx status must not short-circuit a tier.
#[async_trait]
pub trait TextFetch: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String>;
}

/// Rendered-page capability surface.
///
/// The hosting environment (an extension content script, a headless
/// browser adapter) supplies element queries and click dispatch; the core
/// owns the selectors and the orchestration.
pub trait DomHost: Send + Sync {
    /// Canonical URL of the current page.
    fn url(&self) -> String;

    /// Declared document language, if any.
    fn lang(&self) -> Option<String>;

    /// The document title, if any.
    fn document_title(&self) -> Option<String>;

    /// Trimmed text content of every element matching `selector`.
    fn query_text(&self, selector: &str) -> Vec<String>;

    /// Attribute value of the first element matching `selector`.
    fn attribute(&self, selector: &str, name: &str) -> Option<String>;

    /// Click the first element matching `selector`. Returns whether a
    /// matching element existed.
    fn click(&self, selector: &str) -> bool;

    /// Scan open menu items for a label containing any of `needles`
    /// (case-insensitive) and activate the first match.
    fn activate_menu_item(&self, needles: &[&str]) -> bool;
}

/// reqwest-backed fetcher used by the real pipeline.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TextFetch for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {url}");
        let resp = self.client.get(url).header("User-Agent", USER_AGENT).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            debug!("GET {url} returned {status}");
        }
        Ok(body)
    }
}

/// DOM host for environments without a rendered page (the CLI driver).
///
/// Every query answers empty, so the DOM scrape tier yields blank and
/// metadata resolution falls through to the player state.
pub struct DetachedDom {
    url: String,
}

impl DetachedDom {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl DomHost for DetachedDom {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn lang(&self) -> Option<String> {
        None
    }

    fn document_title(&self) -> Option<String> {
        None
    }

    fn query_text(&self, _selector: &str) -> Vec<String> {
        Vec::new()
    }

    fn attribute(&self, _selector: &str, _name: &str) -> Option<String> {
        None
    }

    fn click(&self, _selector: &str) -> bool {
        false
    }

    fn activate_menu_item(&self, _needles: &[&str]) -> bool {
        false
    }
}
