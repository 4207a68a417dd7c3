//! HMR wire protocol and broadcaster (spec §4.8/§6).
//!
//! The broadcaster owns a `tokio::sync::broadcast` channel; every connected
//! browser subscribes a receiver and forwards each message as a JSON text
//! frame. A lagging client (one that falls behind the channel's ring buffer)
//! is sent a `full-reload` the next time it catches up, rather than being
//! silently desynced.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Messages sent from server to client over the HMR socket. Tagged the same
/// way `fastnode-proto`'s `Request`/`Response` enums are, so a packet sniffer
/// or test fixture can treat every wire format in the workspace uniformly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HmrWireMessage {
    /// Sent immediately on connect.
    Connected,
    /// One or more modules were invalidated and should be re-imported.
    Update { updates: Vec<HmrUpdatePayload> },
    /// No accepting boundary was found; the client should reload the page.
    FullReload { path: Option<String> },
    /// A build/transform error occurred; shown in the client overlay.
    Error { err: HmrErrorPayload },
    /// Heartbeat so the client can detect a dead connection.
    Ping,
    /// Acknowledges a client-sent `custom` event round-trip (rarely used).
    Custom { event: String, data: serde_json::Value },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HmrUpdatePayload {
    #[serde(rename = "type")]
    pub update_type: HmrUpdateType,
    pub path: String,
    #[serde(rename = "acceptedPath")]
    pub accepted_path: String,
    pub timestamp: u64,
    /// A CSS-only update can be applied by swapping the `<style>` tag without
    /// re-importing the JS module graph; anything else must be re-imported by
    /// the client for the update to actually take effect.
    #[serde(rename = "explicitImportRequired")]
    pub explicit_import_required: bool,
    /// Whether this boundary was reached through a circular import, so the
    /// client can avoid re-triggering an update loop across the cycle.
    #[serde(rename = "isWithinCircularImport")]
    pub is_within_circular_import: bool,
    /// Server-rendered module URLs that must also be invalidated so the next
    /// SSR render doesn't serve stale output.
    #[serde(rename = "ssrInvalidates")]
    pub ssr_invalidates: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HmrUpdateType {
    JsUpdate,
    CssUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HmrErrorPayload {
    pub message: String,
    pub stack: Option<String>,
    pub id: Option<String>,
    pub frame: Option<String>,
}

/// Messages the client may send back (only a couple are meaningful; the
/// rest exist so an unrecognized-but-well-formed payload doesn't crash the
/// server-side deserializer).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HmrClientMessage {
    Connected,
    Custom { event: String, data: serde_json::Value },
}

const CHANNEL_CAPACITY: usize = 256;

/// Broadcasts `HmrWireMessage`s to every connected browser tab.
///
/// Cloning is cheap (an `Arc`-backed sender clone); share one instance
/// across the axum router state and the HMR engine/watcher task.
#[derive(Clone)]
pub struct HmrBroadcaster {
    tx: broadcast::Sender<HmrWireMessage>,
}

impl Default for HmrBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl HmrBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe a new receiver, one per connected websocket.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HmrWireMessage> {
        self.tx.subscribe()
    }

    /// Send to all subscribers. Returns the number of receivers the message
    /// was delivered to (0 if nobody is connected — not an error).
    pub fn send(&self, message: HmrWireMessage) -> usize {
        self.tx.send(message).unwrap_or(0)
    }

    pub fn full_reload(&self, path: Option<String>) {
        self.send(HmrWireMessage::FullReload { path });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(HmrWireMessage::Error {
            err: HmrErrorPayload {
                message: message.into(),
                stack: None,
                id: None,
                frame: None,
            },
        });
    }

    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_message_round_trips() {
        let json = serde_json::to_string(&HmrWireMessage::Connected).unwrap();
        assert_eq!(json, r#"{"type":"connected"}"#);
        let back: HmrWireMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, HmrWireMessage::Connected));
    }

    #[test]
    fn update_message_shape() {
        let msg = HmrWireMessage::Update {
            updates: vec![HmrUpdatePayload {
                update_type: HmrUpdateType::JsUpdate,
                path: "/src/a.js".into(),
                accepted_path: "/src/a.js".into(),
                timestamp: 123,
                explicit_import_required: false,
                is_within_circular_import: false,
                ssr_invalidates: vec!["/src/a.js".into()],
            }],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"update\""));
        assert!(json.contains("\"js-update\""));
        assert!(json.contains("acceptedPath"));
        assert!(json.contains("explicitImportRequired"));
        assert!(json.contains("isWithinCircularImport"));
        assert!(json.contains("ssrInvalidates"));
    }

    #[tokio::test]
    async fn broadcaster_delivers_to_subscriber() {
        let b = HmrBroadcaster::new();
        let mut rx = b.subscribe();
        b.full_reload(None);
        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, HmrWireMessage::FullReload { path: None }));
    }

    #[test]
    fn send_with_no_subscribers_is_not_an_error() {
        let b = HmrBroadcaster::new();
        assert_eq!(b.send(HmrWireMessage::Ping), 0);
    }
}
