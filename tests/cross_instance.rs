use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use twotier_cache::{
    CacheError, CacheResult, Coordinator, InMemoryFarCache, InMemoryNearCache, InMemoryPubSub,
    Loader,
};

fn never_called_loader() -> Arc<Loader<String>> {
    Arc::new(Box::new(|_key: &str| {
        Box::pin(async move { Err(CacheError::DataSourceLoadNil) })
            as Pin<Box<dyn std::future::Future<Output = CacheResult<Option<String>>> + Send>>
    }))
}

fn counting_loader(calls: Arc<AtomicUsize>, value: &'static str) -> Arc<Loader<String>> {
    Arc::new(Box::new(move |_key: &str| {
        let calls = calls.clone();
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(value.to_string()))
        }) as Pin<Box<dyn std::future::Future<Output = CacheResult<Option<String>>> + Send>>
    }))
}

fn shared_far() -> Arc<InMemoryFarCache> {
    Arc::new(InMemoryFarCache::with_pubsub(Arc::new(InMemoryPubSub::new(64))))
}

#[tokio::test]
async fn s5_cross_instance_set_is_visible_without_invoking_loader() {
    let far = shared_far();
    let a = Coordinator::new(
        Some(far.clone()),
        Some(Arc::new(InMemoryNearCache::new(Duration::from_secs(60)))),
    )
    .unwrap();
    let b = Coordinator::new(
        Some(far),
        Some(Arc::new(InMemoryNearCache::new(Duration::from_secs(60)))),
    )
    .unwrap();

    a.set("k", "v1".to_string(), 30, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let got = b.get("k", 30, &never_called_loader()).await.unwrap();
    assert_eq!(got, "v1");
}

#[tokio::test]
async fn s6_cross_instance_del_forces_peer_reload() {
    let far = shared_far();
    let a = Coordinator::new(
        Some(far.clone()),
        Some(Arc::new(InMemoryNearCache::new(Duration::from_secs(60)))),
    )
    .unwrap();
    let b = Coordinator::new(
        Some(far),
        Some(Arc::new(InMemoryNearCache::new(Duration::from_secs(60)))),
    )
    .unwrap();

    a.set("k", "v1".to_string(), 30, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(b.get("k", 30, &never_called_loader()).await.unwrap(), "v1");

    a.del("k", true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let got = b.get("k", 30, &counting_loader(calls.clone(), "v2")).await.unwrap();
    assert_eq!(got, "v2");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn three_instances_converge_on_the_latest_write() {
    let far = shared_far();
    let a = Coordinator::new(
        Some(far.clone()),
        Some(Arc::new(InMemoryNearCache::new(Duration::from_secs(60)))),
    )
    .unwrap();
    let b = Coordinator::new(
        Some(far.clone()),
        Some(Arc::new(InMemoryNearCache::new(Duration::from_secs(60)))),
    )
    .unwrap();
    let c = Coordinator::new(
        Some(far),
        Some(Arc::new(InMemoryNearCache::new(Duration::from_secs(60)))),
    )
    .unwrap();

    a.set("shared", "first".to_string(), 30, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(b.get("shared", 30, &never_called_loader()).await.unwrap(), "first");
    assert_eq!(c.get("shared", 30, &never_called_loader()).await.unwrap(), "first");

    b.set("shared", "second".to_string(), 30, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(a.get("shared", 30, &never_called_loader()).await.unwrap(), "second");
    assert_eq!(c.get("shared", 30, &never_called_loader()).await.unwrap(), "second");
}

#[tokio::test]
async fn instance_never_applies_its_own_publish_as_a_peer_message() {
    let far = shared_far();
    let a = Coordinator::new(
        Some(far),
        Some(Arc::new(InMemoryNearCache::new(Duration::from_secs(60)))),
    )
    .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    a.set("k", "v1".to_string(), 30, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // If the subscriber misapplied the self-published Set, this would still
    // just read back "v1" from near with no loader call, so the real
    // assertion is that this never panics or double-logs; absence of
    // failure across a brief quiescence window is the signal here.
    let got = a.get("k", 30, &counting_loader(calls.clone(), "unused")).await.unwrap();
    assert_eq!(got, "v1");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
