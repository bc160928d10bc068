//! Subscriber loop: one per coordinator instance, applying peer mutations
//! while suppressing self-echoes.
//!
//! Peer-applied `Set`/`Del` messages are scheduled onto the worker pool
//! rather than applied inline, so a slow local adapter can never block
//! receipt of subsequent messages; adapter errors are logged rather than
//! propagated, since there is no caller left to return them to. The loop
//! calls the near/far adapters directly — never `Coordinator::set`/`del` —
//! so peer-applied writes never re-publish and cause a pub/sub loop.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::far::FarCache;
use crate::near::NearCache;
use crate::pool::Pool;
use crate::pubsub::{Action, ChannelMessage};

/// Spawns the subscriber task. Returns its `JoinHandle` so the coordinator
/// can abort it on close.
pub fn spawn<T>(
    own_gid: Uuid,
    mut receiver: broadcast::Receiver<ChannelMessage>,
    near: Arc<dyn NearCache<T>>,
    far: Arc<dyn FarCache<T>>,
    pool: Arc<Pool>,
) -> tokio::task::JoinHandle<()>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    tokio::spawn(async move {
        loop {
            let message = match receiver.recv().await {
                Ok(message) => message,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber lagged behind pub/sub backplane");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return,
            };

            if message.gid == own_gid {
                // Self-echo: this instance originated the message.
                continue;
            }

            let near = near.clone();
            let far = far.clone();
            match message.action {
                Action::Del => {
                    let key = message.key.clone();
                    pool.submit(async move {
                        if let Err(e) = far.del(&key).await {
                            tracing::error!(key, error = %e, "peer del: far adapter failed");
                        }
                        if let Err(e) = near.del(&key).await {
                            tracing::error!(key, error = %e, "peer del: near adapter failed");
                        }
                    })
                    .await;
                }
                Action::Set => {
                    let Some(entry) = message.data.clone() else {
                        tracing::error!(key = %message.key, "peer set message carried no data");
                        continue;
                    };
                    let key = message.key.clone();
                    pool.submit(async move {
                        let decoded = entry.map(|v| serde_json::from_value::<T>(v));
                        let entry = match decoded.value {
                            Ok(value) => crate::entry::Entry {
                                value,
                                ttl_seconds: decoded.ttl_seconds,
                                obsolete_at: decoded.obsolete_at,
                                expired_at: decoded.expired_at,
                            },
                            Err(e) => {
                                tracing::error!(key, error = %e, "peer set: undecodable payload");
                                return;
                            }
                        };
                        if let Err(e) = near.set(&key, &entry).await {
                            tracing::error!(key, error = %e, "peer set: near adapter failed");
                        }
                        if let Err(e) = far.set(&key, &entry).await {
                            tracing::error!(key, error = %e, "peer set: far adapter failed");
                        }
                    })
                    .await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::now_unix;
    use crate::entry::Entry;
    use crate::far::InMemoryFarCache;
    use crate::near::InMemoryNearCache;
    use crate::pubsub::{ChannelMessage, InMemoryPubSub, PubSub};
    use std::time::Duration;

    #[tokio::test]
    async fn self_echo_is_suppressed() {
        let near: Arc<dyn NearCache<i32>> = Arc::new(InMemoryNearCache::new(Duration::from_secs(60)));
        let far: Arc<dyn FarCache<i32>> = Arc::new(InMemoryFarCache::new());
        let bus = InMemoryPubSub::new(16);
        let pool = Pool::new(2, 8);
        let own_gid = Uuid::new_v4();

        let handle = spawn(own_gid, bus.subscribe(), near.clone(), far.clone(), pool.clone());

        bus.publish(ChannelMessage {
            gid: own_gid,
            key: "k".to_string(),
            action: Action::Set,
            data: Some(Entry::new(serde_json::json!(5), 30, 32, now_unix())),
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let got = near.get("k").await.unwrap();
        assert!(got.is_none(), "self-echo must not mutate local state");

        handle.abort();
        pool.release().await;
    }

    #[tokio::test]
    async fn peer_set_is_applied_to_near_and_far() {
        let near: Arc<dyn NearCache<i32>> = Arc::new(InMemoryNearCache::new(Duration::from_secs(60)));
        let far: Arc<dyn FarCache<i32>> = Arc::new(InMemoryFarCache::new());
        let bus = InMemoryPubSub::new(16);
        let pool = Pool::new(2, 8);
        let own_gid = Uuid::new_v4();
        let peer_gid = Uuid::new_v4();

        let handle = spawn(own_gid, bus.subscribe(), near.clone(), far.clone(), pool.clone());

        bus.publish(ChannelMessage {
            gid: peer_gid,
            key: "k".to_string(),
            action: Action::Set,
            data: Some(Entry::new(serde_json::json!(7), 30, 32, now_unix())),
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let got = near.get("k").await.unwrap().expect("peer set should apply");
        assert_eq!(got.value, 7);

        handle.abort();
        pool.release().await;
    }

    #[tokio::test]
    async fn peer_del_removes_from_both_tiers() {
        let near: Arc<dyn NearCache<i32>> = Arc::new(InMemoryNearCache::new(Duration::from_secs(60)));
        let far: Arc<dyn FarCache<i32>> = Arc::new(InMemoryFarCache::new());
        let entry = Entry::new(1, 30, 32, now_unix());
        near.set("k", &entry).await.unwrap();
        far.set("k", &entry).await.unwrap();

        let bus = InMemoryPubSub::new(16);
        let pool = Pool::new(2, 8);
        let own_gid = Uuid::new_v4();
        let peer_gid = Uuid::new_v4();
        let handle = spawn(own_gid, bus.subscribe(), near.clone(), far.clone(), pool.clone());

        bus.publish(ChannelMessage {
            gid: peer_gid,
            key: "k".to_string(),
            action: Action::Del,
            data: None,
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(near.get("k").await.unwrap().is_none());

        handle.abort();
        pool.release().await;
    }
}
