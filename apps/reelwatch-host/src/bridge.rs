//! [`TabHost`] over the native messaging pipe.
//!
//! Each request is queued for the writer task with a fresh id and parked on a
//! oneshot slot until the read loop hands back the matching `reply`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use reelwatch_core::host::{TabHost, TabId, TabInfo};

use crate::error::HostError;
use crate::protocol::{HostMessage, TabSnapshot};

type ReplySlot = oneshot::Sender<Result<Value, String>>;

#[derive(Clone)]
pub struct BrowserBridge {
    inner: Arc<Inner>,
}

struct Inner {
    outbound: mpsc::UnboundedSender<HostMessage>,
    pending: Mutex<Pending>,
    next_id: AtomicU64,
    timeout: Duration,
}

/// Reply slots and the closed flag share one lock so a request cannot
/// register after `close` has drained the map.
#[derive(Default)]
struct Pending {
    slots: HashMap<u64, ReplySlot>,
    closed: bool,
}

impl BrowserBridge {
    /// Create a bridge and the queue of messages it wants written to the browser.
    pub fn new(timeout: Duration) -> (Self, mpsc::UnboundedReceiver<HostMessage>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let bridge = Self {
            inner: Arc::new(Inner {
                outbound,
                pending: Mutex::new(Pending::default()),
                next_id: AtomicU64::new(1),
                timeout,
            }),
        };
        (bridge, rx)
    }

    /// Deliver a reply. Returns `false` if no request is waiting on `id`.
    pub fn resolve(&self, id: u64, result: Result<Value, String>) -> bool {
        match self.pending().slots.remove(&id) {
            // The requester may have timed out between lookup and send.
            Some(slot) => slot.send(result).is_ok(),
            None => false,
        }
    }

    /// Fail every waiting request and refuse new ones.
    pub fn close(&self) {
        let dropped = {
            let mut pending = self.pending();
            pending.closed = true;
            pending.slots.drain().count()
        };
        if dropped > 0 {
            tracing::debug!(dropped, "Abandoned pending browser requests");
        }
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.pending().slots.len()
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue the request built from a fresh id and register its reply slot.
    fn enqueue(
        &self,
        build: impl FnOnce(u64) -> HostMessage,
    ) -> Result<(u64, oneshot::Receiver<Result<Value, String>>), HostError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (slot, rx) = oneshot::channel();
        {
            let mut pending = self.pending();
            if pending.closed {
                return Err(HostError::Disconnected);
            }
            pending.slots.insert(id, slot);
        }

        if self.inner.outbound.send(build(id)).is_err() {
            self.pending().slots.remove(&id);
            return Err(HostError::Disconnected);
        }
        Ok((id, rx))
    }

    async fn request(&self, build: impl FnOnce(u64) -> HostMessage) -> Result<Value, HostError> {
        let (id, rx) = self.enqueue(build)?;

        match tokio::time::timeout(self.inner.timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(HostError::Browser(message)),
            Ok(Err(_)) => Err(HostError::Disconnected),
            Err(_) => {
                self.pending().slots.remove(&id);
                tracing::warn!(id, "Browser request timed out");
                Err(HostError::Timeout { id })
            }
        }
    }
}

impl TabHost for BrowserBridge {
    type Error = HostError;

    async fn tab_url(&self, tab: TabId) -> Result<Option<String>, HostError> {
        let value = self
            .request(|id| HostMessage::GetTab { id, tab_id: tab })
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        let snapshot: TabSnapshot = serde_json::from_value(value)?;
        Ok(snapshot.url)
    }

    async fn list_tabs(&self) -> Result<Vec<TabInfo>, HostError> {
        let value = self.request(|id| HostMessage::QueryTabs { id }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn extract_text(&self, tab: TabId, xpath: &str) -> Result<Option<String>, HostError> {
        let xpath = xpath.to_string();
        let value = self
            .request(|id| HostMessage::ExtractText {
                id,
                tab_id: tab,
                xpath,
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn bridge() -> (BrowserBridge, mpsc::UnboundedReceiver<HostMessage>) {
        BrowserBridge::new(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_reply_resolves_request() {
        let (bridge, mut outbound) = bridge();
        let task = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.tab_url(TabId(3)).await }
        });

        let sent = outbound.recv().await.unwrap();
        assert!(matches!(sent, HostMessage::GetTab { tab_id: TabId(3), .. }));
        assert!(bridge.resolve(sent.id(), Ok(json!({ "url": "https://example.com/" }))));

        let url = task.await.unwrap().unwrap();
        assert_eq!(url.as_deref(), Some("https://example.com/"));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_null_reply_is_missing_tab() {
        let (bridge, mut outbound) = bridge();
        let task = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.tab_url(TabId(3)).await }
        });

        let sent = outbound.recv().await.unwrap();
        bridge.resolve(sent.id(), Ok(Value::Null));
        assert_eq!(task.await.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn test_ids_increase() {
        let (bridge, mut outbound) = bridge();
        for _ in 0..2 {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.list_tabs().await });
        }
        let first = outbound.recv().await.unwrap().id();
        let second = outbound.recv().await.unwrap().id();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_list_and_extract_decode() {
        let (bridge, mut outbound) = bridge();
        let task = tokio::spawn({
            let bridge = bridge.clone();
            async move {
                let tabs = bridge.list_tabs().await.unwrap();
                let title = bridge.extract_text(TabId(1), "//h1").await.unwrap();
                (tabs, title)
            }
        });

        let sent = outbound.recv().await.unwrap();
        bridge.resolve(
            sent.id(),
            Ok(json!([{ "tab_id": 1, "url": "https://a/" }, { "tab_id": 2, "url": null }])),
        );
        let sent = outbound.recv().await.unwrap();
        match &sent {
            HostMessage::ExtractText { xpath, .. } => assert_eq!(xpath, "//h1"),
            other => panic!("expected extract_text, got {other:?}"),
        }
        bridge.resolve(sent.id(), Ok(json!("Dune 2021")));

        let (tabs, title) = task.await.unwrap();
        assert_eq!(tabs.len(), 2);
        assert_eq!(tabs[1].url, None);
        assert_eq!(title.as_deref(), Some("Dune 2021"));
    }

    #[tokio::test]
    async fn test_unknown_reply_ignored() {
        let (bridge, _outbound) = bridge();
        assert!(!bridge.resolve(42, Ok(Value::Null)));
    }

    #[tokio::test]
    async fn test_browser_error_surfaces() {
        let (bridge, mut outbound) = bridge();
        let task = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.tab_url(TabId(8)).await }
        });

        let sent = outbound.recv().await.unwrap();
        bridge.resolve(sent.id(), Err("No tab with id: 8".into()));
        assert!(matches!(
            task.await.unwrap(),
            Err(HostError::Browser(message)) if message == "No tab with id: 8"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let (bridge, _outbound) = bridge();
        let err = bridge.tab_url(TabId(1)).await.unwrap_err();
        assert!(matches!(err, HostError::Timeout { .. }));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_close_fails_pending_and_new_requests() {
        let (bridge, mut outbound) = bridge();
        let task = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.tab_url(TabId(1)).await }
        });
        outbound.recv().await.unwrap();

        bridge.close();
        assert!(matches!(
            task.await.unwrap(),
            Err(HostError::Disconnected)
        ));
        assert!(matches!(
            bridge.list_tabs().await,
            Err(HostError::Disconnected)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_close_racing_requests_never_strands_one() {
        let (bridge, _outbound) = BrowserBridge::new(Duration::from_secs(60));
        let requests: Vec<_> = (0..64)
            .map(|i| {
                let bridge = bridge.clone();
                tokio::spawn(async move { bridge.tab_url(TabId(i)).await })
            })
            .collect();
        bridge.close();

        for request in requests {
            let result = tokio::time::timeout(Duration::from_secs(5), request)
                .await
                .expect("request left waiting after close")
                .unwrap();
            assert!(matches!(result, Err(HostError::Disconnected)));
        }
        assert_eq!(bridge.pending_count(), 0);
    }
}
