//! Server-sent events push channel.
//!
//! The marketplace streams `scoreUpdated` events on
//! `GET /api/listings/{listingId}/scoreEvents`. Each event's `data` is the
//! score snapshot as JSON.

use std::collections::BTreeMap;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::channel::{ChannelEvent, ChannelStatus, ScoreChannel, ScoreSubscription};
use crate::api::score_events_path;
use crate::config::ClientConfig;
use crate::domain::ListingId;

pub const SCORE_EVENT_NAME: &str = "scoreUpdated";

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder. Chunks may split lines and
/// UTF-8 sequences anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);

        let mut dispatched = Vec::new();
        while let Some(newline) = self.pending.iter().position(|byte| *byte == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                dispatched.push(event);
            }
        }
        dispatched
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_owned()),
            "data" => self.data.push(value.to_owned()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| String::from("message")),
            data,
        })
    }
}

/// Push channel backed by the marketplace's SSE endpoint.
#[derive(Debug, Clone)]
pub struct SseScoreChannel {
    client: reqwest::Client,
    config: ClientConfig,
}

impl SseScoreChannel {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: ClientConfig) -> Self {
        Self { client, config }
    }
}

impl ScoreChannel for SseScoreChannel {
    /// Must be called from within a Tokio runtime.
    fn subscribe(&self, listing_id: &ListingId) -> ScoreSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let url = self.config.url(&score_events_path(listing_id));
        let mut headers = BTreeMap::new();
        self.config.auth.apply(&mut headers);

        let pump = tokio::spawn(pump_events(self.client.clone(), url, headers, sender));
        ScoreSubscription::with_pump(receiver, pump)
    }
}

async fn pump_events(
    client: reqwest::Client,
    url: String,
    headers: BTreeMap<String, String>,
    sender: mpsc::UnboundedSender<ChannelEvent>,
) {
    let send = |event: ChannelEvent| sender.send(event).is_ok();
    if !send(ChannelEvent::Status(ChannelStatus::Connecting)) {
        return;
    }

    let mut request = client.get(&url).header("accept", "text/event-stream");
    for (name, value) in &headers {
        request = request.header(name, value);
    }

    let response = match request.send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            warn!(status = response.status().as_u16(), "score stream rejected");
            send(ChannelEvent::Status(ChannelStatus::Error));
            return;
        }
        Err(error) => {
            warn!(error = %error, "score stream connection failed");
            send(ChannelEvent::Status(ChannelStatus::Error));
            return;
        }
    };

    if !send(ChannelEvent::Status(ChannelStatus::Open)) {
        return;
    }
    debug!(url = %url, "score stream open");

    let mut decoder = SseDecoder::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => {
                warn!(error = %error, "score stream interrupted");
                break;
            }
        };
        for event in decoder.feed(&chunk) {
            if event.event != SCORE_EVENT_NAME {
                continue;
            }
            let payload = serde_json::from_str::<Value>(&event.data).ok();
            if payload.is_none() {
                debug!("undecodable score event payload");
            }
            if !send(ChannelEvent::Payload(payload)) {
                return;
            }
        }
    }

    send(ChannelEvent::Status(ChannelStatus::Error));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_event_with_multiline_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: scoreUpdated\ndata: {\"score\":\ndata: 40}\n\n");

        assert_eq!(
            events,
            vec![SseEvent {
                event: String::from("scoreUpdated"),
                data: String::from("{\"score\":\n40}"),
            }]
        );
    }

    #[test]
    fn reassembles_events_split_across_chunks_and_crlf() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: scoreUp").is_empty());
        assert!(decoder.feed(b"dated\r\ndata: {\"score\":1}\r").is_empty());
        let events = decoder.feed(b"\n\r\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "scoreUpdated");
        assert_eq!(events[0].data, "{\"score\":1}");
    }

    #[test]
    fn ignores_comments_and_empty_events() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keep-alive\n\nevent: ping\n\ndata: x\n\n");

        assert_eq!(
            events,
            vec![SseEvent {
                event: String::from("message"),
                data: String::from("x"),
            }]
        );
    }
}
