use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::ListingId;

/// Connection state reported by a push subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Connecting,
    Open,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Status(ChannelStatus),
    /// Raw score payload; `None` when the transport could not decode one.
    Payload(Option<Value>),
}

/// Live subscription to one listing's score events. Dropping it ends the
/// subscription.
#[derive(Debug)]
pub struct ScoreSubscription {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    pump: Option<JoinHandle<()>>,
}

impl ScoreSubscription {
    pub fn new(events: mpsc::UnboundedReceiver<ChannelEvent>) -> Self {
        Self { events, pump: None }
    }

    /// Subscription fed by a background task that is aborted on drop.
    pub fn with_pump(events: mpsc::UnboundedReceiver<ChannelEvent>, pump: JoinHandle<()>) -> Self {
        Self {
            events,
            pump: Some(pump),
        }
    }

    /// Next event, or `None` once the channel side has gone away.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }
}

impl Drop for ScoreSubscription {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Push transport for score updates.
pub trait ScoreChannel: Send + Sync {
    fn subscribe(&self, listing_id: &ListingId) -> ScoreSubscription;
}

/// In-process channel whose events are emitted by the caller.
#[derive(Debug, Default)]
pub struct ManualScoreChannel {
    subscribers: Mutex<Vec<(ListingId, mpsc::UnboundedSender<ChannelEvent>)>>,
}

impl ManualScoreChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every live subscription of `listing_id` and
    /// returns how many received it.
    pub fn emit(&self, listing_id: &ListingId, event: ChannelEvent) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|(_, sender)| !sender.is_closed());

        subscribers
            .iter()
            .filter(|(listing, _)| listing == listing_id)
            .filter(|(_, sender)| sender.send(event.clone()).is_ok())
            .count()
    }

    pub fn emit_status(&self, listing_id: &ListingId, status: ChannelStatus) -> usize {
        self.emit(listing_id, ChannelEvent::Status(status))
    }

    pub fn emit_payload(&self, listing_id: &ListingId, payload: Value) -> usize {
        self.emit(listing_id, ChannelEvent::Payload(Some(payload)))
    }

    pub fn subscriber_count(&self, listing_id: &ListingId) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(listing, sender)| listing == listing_id && !sender.is_closed())
            .count()
    }
}

impl ScoreChannel for ManualScoreChannel {
    fn subscribe(&self, listing_id: &ListingId) -> ScoreSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((listing_id.clone(), sender));
        ScoreSubscription::new(receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn manual_channel_routes_events_by_listing() {
        let channel = ManualScoreChannel::new();
        let first = ListingId::parse("k1").expect("valid id");
        let second = ListingId::parse("k2").expect("valid id");
        let mut subscription = channel.subscribe(&first);
        let _other = channel.subscribe(&second);

        assert_eq!(channel.emit_payload(&first, json!({ "score": 10 })), 1);
        assert_eq!(
            subscription.recv().await,
            Some(ChannelEvent::Payload(Some(json!({ "score": 10 }))))
        );
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let channel = ManualScoreChannel::new();
        let listing = ListingId::parse("k1").expect("valid id");
        let subscription = channel.subscribe(&listing);
        assert_eq!(channel.subscriber_count(&listing), 1);

        drop(subscription);

        assert_eq!(channel.subscriber_count(&listing), 0);
        assert_eq!(channel.emit_status(&listing, ChannelStatus::Open), 0);
    }
}
