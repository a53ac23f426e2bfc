//! The browser environment the detector runs against.
//!
//! In production this is the extension on the other side of the native
//! messaging pipe; tests use an in-memory fake.

use std::future::Future;

use serde::{Deserialize, Serialize};

/// Opaque browser tab identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An open tab as reported by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub tab_id: TabId,
    pub url: Option<String>,
}

/// Tab inspection and page scripting provided by the browser.
pub trait TabHost: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Current URL of a tab. `None` if the tab no longer exists or has no URL.
    fn tab_url(
        &self,
        tab: TabId,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    /// All open tabs.
    fn list_tabs(&self) -> impl Future<Output = Result<Vec<TabInfo>, Self::Error>> + Send;

    /// Evaluate `xpath` in the tab's page and return the first node's trimmed
    /// text content, or `None` if no node matches.
    fn extract_text(
        &self,
        tab: TabId,
        xpath: &str,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;
}
