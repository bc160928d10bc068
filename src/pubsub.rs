//! Pub/sub backplane contract and wire format.
//!
//! A far-cache adapter may implement [`PubSub`] to broadcast invalidation
//! and refresh notices across instances. The remote transport must provide
//! at-least-once delivery to connected subscribers; missed deliveries
//! during disconnects are tolerated (eventual consistency).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::entry::Entry;
use crate::error::CacheResult;

/// Invalidation/refresh action carried by a [`ChannelMessage`].
///
/// Encoded on the wire as a small integer (`Set = 0`, `Del = 1`), via the
/// custom [`action_wire`] codec below, rather than serde's default
/// string-tagged enum encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Set = 0,
    Del = 1,
}

// Actions are encoded as small integers on the wire (§6), not strings; a
// manual (de)serializer keeps the JSON shape `{"action":0}` / `{"action":1}`
// instead of serde's default string-tagged enum encoding.
impl Serialize for ActionWire {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i8(self.0 as i8)
    }
}

impl<'de> Deserialize<'de> for ActionWire {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = i8::deserialize(deserializer)?;
        let action = match raw {
            0 => Action::Set,
            1 => Action::Del,
            other => {
                return Err(serde::de::Error::custom(format!(
                    "unknown pub/sub action: {other}"
                )))
            }
        };
        Ok(ActionWire(action))
    }
}

#[derive(Debug, Clone, Copy)]
struct ActionWire(Action);

/// Invalidation/refresh notice broadcast through pub/sub.
///
/// `data` carries the generically-decoded JSON entry for `Set`; it is
/// absent for `Del`. The coordinator re-decodes `data.value` into its own
/// value type when applying a peer `Set`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub gid: Uuid,
    pub key: String,
    #[serde(with = "action_wire")]
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Entry<Value>>,
}

mod action_wire {
    use super::{Action, ActionWire};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(action: &Action, s: S) -> Result<S::Ok, S::Error> {
        ActionWire(*action).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Action, D::Error> {
        Ok(ActionWire::deserialize(d)?.0)
    }
}

/// Pub/sub capability a far-cache adapter may implement.
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Broadcasts a message on the configured channel.
    async fn publish(&self, message: ChannelMessage) -> CacheResult<()>;

    /// Subscribes to the configured channel, returning a receiver that
    /// yields decoded messages until the transport is closed.
    fn subscribe(&self) -> broadcast::Receiver<ChannelMessage>;
}

/// `tokio::sync::broadcast`-backed reference pub/sub implementation, useful
/// for tests and single-process embedding.
pub struct InMemoryPubSub {
    sender: broadcast::Sender<ChannelMessage>,
}

impl InMemoryPubSub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }
}

impl Default for InMemoryPubSub {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl PubSub for InMemoryPubSub {
    async fn publish(&self, message: ChannelMessage) -> CacheResult<()> {
        // No subscribers is not an error: at-least-once delivery only
        // applies to connected subscribers.
        let _ = self.sender.send(message);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelMessage> {
        self.sender.subscribe()
    }
}
