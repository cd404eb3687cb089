//! Broadcast subscribers.
//!
//! A subscriber is a delivery sink (usually a WebSocket session) plus its
//! preferred codec. The registry hands out copy-on-write snapshots so a slow
//! broadcast never races with connects and disconnects.

mod registry;
mod sink;

pub use registry::{Snapshot, Subscriber, SubscriberId, SubscriberRegistry};
pub use sink::{ChannelSink, DeliveryFailure, Frame, SubscriberSink};
