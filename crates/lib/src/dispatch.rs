//! Broadcast dispatcher: fan one decoded message out to every subscriber.
//!
//! Each delivery runs in its own task with a timeout, so one stalled socket only
//! delays itself. Failures are counted per subscriber; a closed connection is
//! evicted at once, anything else after `evict_after_failures` in a row.

use crate::codec::{self, ContentType, Message};
use crate::config::BroadcastConfig;
use crate::subscribers::{DeliveryFailure, Frame, Subscriber, SubscriberRegistry};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};

/// Advisory outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Subscribers removed from the registry because of this broadcast.
    pub evicted: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct DeliveryPolicy {
    pub delivery_timeout: Duration,
    pub evict_after_failures: u32,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self::from(&BroadcastConfig::default())
    }
}

impl From<&BroadcastConfig> for DeliveryPolicy {
    fn from(c: &BroadcastConfig) -> Self {
        Self {
            delivery_timeout: Duration::from_millis(c.delivery_timeout_ms),
            evict_after_failures: c.evict_after_failures.max(1),
        }
    }
}

enum Outcome {
    Skipped,
    Delivered,
    Failed { evicted: bool },
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<SubscriberRegistry>,
    policy: DeliveryPolicy,
}

impl Dispatcher {
    pub fn new(registry: Arc<SubscriberRegistry>, policy: DeliveryPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Deliver `message`, encoded once as `content_type`, to every current subscriber.
    pub async fn broadcast(&self, message: &Message, content_type: ContentType) -> DeliveryReport {
        let frame = Frame::new(content_type, codec::encode(message, content_type));
        let snapshot = self.registry.list().await;
        let targets = snapshot.iter().map(|s| (s.clone(), frame.clone())).collect();
        self.deliver_all(targets).await
    }

    /// Deliver `message` to each subscriber in its preferred codec (encoded at most once per codec).
    pub async fn broadcast_preferred(&self, message: &Message) -> DeliveryReport {
        let text = Frame::new(
            ContentType::StructuredText,
            codec::encode(message, ContentType::StructuredText),
        );
        let binary = Frame::new(
            ContentType::CompactBinary,
            codec::encode(message, ContentType::CompactBinary),
        );
        let snapshot = self.registry.list().await;
        let targets = snapshot
            .iter()
            .map(|s| {
                let frame = match s.preferred() {
                    ContentType::StructuredText => text.clone(),
                    ContentType::CompactBinary => binary.clone(),
                };
                (s.clone(), frame)
            })
            .collect();
        self.deliver_all(targets).await
    }

    /// Run [`Dispatcher::broadcast`] as a detached task. The task is not tied to
    /// the caller: dropping the handle does not cancel delivery.
    pub fn spawn_broadcast(
        &self,
        message: Message,
        content_type: ContentType,
    ) -> JoinHandle<DeliveryReport> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let report = dispatcher.broadcast(&message, content_type).await;
            log_report(&report, content_type);
            report
        })
    }

    async fn deliver_all(&self, targets: Vec<(Arc<Subscriber>, Frame)>) -> DeliveryReport {
        let mut tasks = JoinSet::new();
        for (subscriber, frame) in targets {
            let registry = self.registry.clone();
            let policy = self.policy;
            tasks.spawn(deliver_one(registry, policy, subscriber, frame));
        }

        let mut report = DeliveryReport::default();
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::warn!("delivery task failed: {}", e);
                    report.attempted += 1;
                    report.failed += 1;
                    continue;
                }
            };
            match outcome {
                Outcome::Skipped => {}
                Outcome::Delivered => {
                    report.attempted += 1;
                    report.delivered += 1;
                }
                Outcome::Failed { evicted } => {
                    report.attempted += 1;
                    report.failed += 1;
                    if evicted {
                        report.evicted += 1;
                    }
                }
            }
        }
        report
    }
}

/// The snapshot fixes who is eligible for this broadcast. A member that detaches
/// after the snapshot but before its task runs has lost its connection and is
/// skipped without counting as an attempt.
async fn deliver_one(
    registry: Arc<SubscriberRegistry>,
    policy: DeliveryPolicy,
    subscriber: Arc<Subscriber>,
    frame: Frame,
) -> Outcome {
    if subscriber.is_detached() {
        return Outcome::Skipped;
    }
    let result = match tokio::time::timeout(policy.delivery_timeout, subscriber.sink().deliver(frame)).await {
        Ok(result) => result,
        Err(_) => Err(DeliveryFailure::TimedOut(policy.delivery_timeout)),
    };
    let failure = match result {
        Ok(()) => {
            subscriber.record_success();
            return Outcome::Delivered;
        }
        Err(failure) => failure,
    };

    let failures = subscriber.record_failure();
    log::debug!(
        "delivery to {} failed ({} in a row): {}",
        subscriber.id(),
        failures,
        failure
    );
    let evict = failure == DeliveryFailure::Closed || failures >= policy.evict_after_failures;
    let evicted = evict && registry.unregister_id(subscriber.id()).await.is_some();
    if evicted {
        log::warn!(
            "evicted subscriber {} after {} consecutive failure(s): {}",
            subscriber.id(),
            failures,
            failure
        );
    }
    Outcome::Failed { evicted }
}

fn log_report(report: &DeliveryReport, content_type: ContentType) {
    if report.failed > 0 {
        log::info!(
            "{} broadcast: {}/{} delivered, {} failed, {} evicted",
            content_type,
            report.delivered,
            report.attempted,
            report.failed,
            report.evicted
        );
    } else {
        log::debug!(
            "{} broadcast: {}/{} delivered",
            content_type,
            report.delivered,
            report.attempted
        );
    }
}
