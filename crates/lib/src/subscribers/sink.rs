//! Delivery sink: the only contract between the dispatcher and a connection.

use crate::codec::ContentType;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;

/// One encoded message ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub content_type: ContentType,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(content_type: ContentType, payload: Bytes) -> Self {
        Self {
            content_type,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryFailure {
    /// The connection is gone; the subscriber is evicted immediately.
    #[error("subscriber connection closed")]
    Closed,
    #[error("delivery timed out after {0:?}")]
    TimedOut(Duration),
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Attempt delivery of one frame to one addressed connection.
#[async_trait]
pub trait SubscriberSink: Send + Sync {
    async fn deliver(&self, frame: Frame) -> Result<(), DeliveryFailure>;
}

/// Sink backed by a bounded queue drained by the connection's own task.
/// A full queue makes `deliver` wait, which the dispatcher bounds with its timeout.
pub struct ChannelSink {
    tx: mpsc::Sender<Frame>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Frame>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl SubscriberSink for ChannelSink {
    async fn deliver(&self, frame: Frame) -> Result<(), DeliveryFailure> {
        self.tx.send(frame).await.map_err(|_| DeliveryFailure::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_forwards_frames() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = ChannelSink::new(tx);
        let frame = Frame::new(ContentType::StructuredText, Bytes::from_static(b"{}"));
        sink.deliver(frame.clone()).await.unwrap();
        assert_eq!(rx.recv().await, Some(frame));
    }

    #[tokio::test]
    async fn channel_sink_reports_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = ChannelSink::new(tx);
        let frame = Frame::new(ContentType::CompactBinary, Bytes::new());
        assert_eq!(sink.deliver(frame).await, Err(DeliveryFailure::Closed));
    }
}
