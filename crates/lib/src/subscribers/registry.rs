//! Subscriber registry: register, unregister and snapshot connected subscribers.

use super::sink::SubscriberSink;
use crate::codec::ContentType;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Unique subscriber identifier (opaque string).
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct SubscriberId(String);

impl SubscriberId {
    fn generate() -> Self {
        Self(format!("sub-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One connected broadcast recipient. The sink is a handle to the connection,
/// which is owned by the transport layer.
pub struct Subscriber {
    id: SubscriberId,
    preferred: ContentType,
    sink: Arc<dyn SubscriberSink>,
    consecutive_failures: AtomicU32,
    detached: AtomicBool,
}

impl Subscriber {
    pub fn new(preferred: ContentType, sink: Arc<dyn SubscriberSink>) -> Self {
        Self {
            id: SubscriberId::generate(),
            preferred,
            sink,
            consecutive_failures: AtomicU32::new(0),
            detached: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    pub fn preferred(&self) -> ContentType {
        self.preferred
    }

    pub fn sink(&self) -> &dyn SubscriberSink {
        self.sink.as_ref()
    }

    /// True once the subscriber has been removed from its registry.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    pub(crate) fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
    }

    /// Returns the failure count including this one.
    pub(crate) fn record_failure(&self) -> u32 {
        self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("preferred", &self.preferred)
            .field("consecutive_failures", &self.consecutive_failures())
            .field("detached", &self.is_detached())
            .finish()
    }
}

type Members = HashMap<SubscriberId, Arc<Subscriber>>;

/// Point-in-time view of the registry. Unaffected by later register/unregister;
/// can be iterated any number of times. Members keep their detached flag live, so
/// consumers can still tell that a listed subscriber has since been removed.
#[derive(Clone)]
pub struct Snapshot(Arc<Members>);

impl Snapshot {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Subscriber>> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.0.contains_key(id)
    }
}

/// Registry of currently connected subscribers. The member map is copy-on-write:
/// snapshots share it, and a mutation clones it only while a snapshot is alive.
pub struct SubscriberRegistry {
    inner: RwLock<Arc<Members>>,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    pub async fn register(&self, subscriber: Subscriber) -> Arc<Subscriber> {
        let subscriber = Arc::new(subscriber);
        let mut g = self.inner.write().await;
        Arc::make_mut(&mut *g).insert(subscriber.id.clone(), subscriber.clone());
        log::debug!(
            "subscriber {} joined (prefers {}), {} connected",
            subscriber.id,
            subscriber.preferred,
            g.len()
        );
        subscriber
    }

    /// Remove a subscriber; returns false if it was not registered.
    pub async fn unregister(&self, subscriber: &Subscriber) -> bool {
        self.unregister_id(&subscriber.id).await.is_some()
    }

    pub async fn unregister_id(&self, id: &SubscriberId) -> Option<Arc<Subscriber>> {
        let mut g = self.inner.write().await;
        if !g.contains_key(id) {
            return None;
        }
        let removed = Arc::make_mut(&mut *g).remove(id)?;
        removed.detached.store(true, Ordering::Release);
        log::debug!("subscriber {} left, {} connected", id, g.len());
        Some(removed)
    }

    pub async fn list(&self) -> Snapshot {
        Snapshot(self.inner.read().await.clone())
    }

    pub async fn contains(&self, id: &SubscriberId) -> bool {
        self.inner.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
