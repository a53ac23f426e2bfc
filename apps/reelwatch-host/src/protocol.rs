//! Messages exchanged with the browser extension.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use reelwatch_core::detector::TabEvent;
use reelwatch_core::host::TabId;

/// Sent by the extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrowserMessage {
    TabUpdated {
        tab_id: TabId,
        url: String,
    },
    TabActivated {
        tab_id: TabId,
    },
    TabRemoved {
        tab_id: TabId,
    },
    Installed,
    /// Answer to a [`HostMessage`] with the same `id`.
    Reply {
        id: u64,
        #[serde(default)]
        result: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Sent to the extension. Every request carries an `id` echoed in the reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// Reply result: `{ "url": string | null }`, or null if the tab is gone.
    GetTab { id: u64, tab_id: TabId },
    /// Reply result: `[{ "tab_id": number, "url": string | null }]`.
    QueryTabs { id: u64 },
    /// Reply result: the first matching node's text, or null.
    ExtractText {
        id: u64,
        tab_id: TabId,
        xpath: String,
    },
}

impl HostMessage {
    pub fn id(&self) -> u64 {
        match self {
            Self::GetTab { id, .. } | Self::QueryTabs { id } | Self::ExtractText { id, .. } => *id,
        }
    }
}

/// `get_tab` reply payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TabSnapshot {
    #[serde(default)]
    pub url: Option<String>,
}

/// Where an incoming message is routed.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    Event(TabEvent),
    Reply {
        id: u64,
        result: Result<Value, String>,
    },
}

impl From<BrowserMessage> for Inbound {
    fn from(message: BrowserMessage) -> Self {
        match message {
            BrowserMessage::TabUpdated { tab_id, url } => Inbound::Event(TabEvent::Navigated {
                tab: tab_id,
                url,
            }),
            BrowserMessage::TabActivated { tab_id } => {
                Inbound::Event(TabEvent::Activated { tab: tab_id })
            }
            BrowserMessage::TabRemoved { tab_id } => {
                Inbound::Event(TabEvent::Removed { tab: tab_id })
            }
            BrowserMessage::Installed => Inbound::Event(TabEvent::Installed),
            BrowserMessage::Reply { id, result, error } => Inbound::Reply {
                id,
                result: match error {
                    Some(message) => Err(message),
                    None => Ok(result),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: Value) -> BrowserMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_tab_events_route_to_detector() {
        let msg = parse(json!({
            "type": "tab_updated",
            "tab_id": 12,
            "url": "https://www.lookmovie2.to/movies/play/1630029-dune-2021"
        }));
        assert_eq!(
            Inbound::from(msg),
            Inbound::Event(TabEvent::Navigated {
                tab: TabId(12),
                url: "https://www.lookmovie2.to/movies/play/1630029-dune-2021".into(),
            })
        );

        let msg = parse(json!({ "type": "tab_removed", "tab_id": 3 }));
        assert_eq!(
            Inbound::from(msg),
            Inbound::Event(TabEvent::Removed { tab: TabId(3) })
        );

        let msg = parse(json!({ "type": "installed" }));
        assert_eq!(Inbound::from(msg), Inbound::Event(TabEvent::Installed));
    }

    #[test]
    fn test_reply_without_result_is_null() {
        let msg = parse(json!({ "type": "reply", "id": 4 }));
        assert_eq!(
            Inbound::from(msg),
            Inbound::Reply {
                id: 4,
                result: Ok(Value::Null)
            }
        );
    }

    #[test]
    fn test_reply_error_wins() {
        let msg = parse(json!({
            "type": "reply",
            "id": 5,
            "result": "ignored",
            "error": "No tab with id: 5"
        }));
        assert_eq!(
            Inbound::from(msg),
            Inbound::Reply {
                id: 5,
                result: Err("No tab with id: 5".into())
            }
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result: Result<BrowserMessage, _> =
            serde_json::from_value(json!({ "type": "bookmark_added", "id": 1 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_host_message_shape() {
        let msg = HostMessage::ExtractText {
            id: 9,
            tab_id: TabId(2),
            xpath: "//h1".into(),
        };
        assert_eq!(msg.id(), 9);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "type": "extract_text", "id": 9, "tab_id": 2, "xpath": "//h1" })
        );
        assert_eq!(
            serde_json::to_value(HostMessage::QueryTabs { id: 1 }).unwrap(),
            json!({ "type": "query_tabs", "id": 1 })
        );
    }
}
