use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

use super::channel::{ChannelEvent, ChannelStatus, ScoreChannel, ScoreSubscription};
use super::transport::{ConnectionStatus, Transport};
use crate::api::{ApiError, MarketplaceApi};
use crate::domain::{ListingId, ScoreSnapshot, Suggestion};

/// Score values with a one-deep history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreState {
    pub score: f64,
    pub previous_score: f64,
    pub label: String,
    pub suggestions: Vec<Suggestion>,
    pub normalized_score: Option<f64>,
    pub normalization_message: Option<String>,
}

impl ScoreState {
    /// Adopts a validated snapshot, moving the current score into
    /// `previous_score`.
    pub fn adopt(&mut self, snapshot: ScoreSnapshot) {
        self.previous_score = self.score;
        self.score = snapshot.score;
        self.label = snapshot.label;
        self.suggestions = snapshot.suggestions;
        self.normalized_score = snapshot.normalized_score;
        self.normalization_message = snapshot.normalization_message;
    }

    /// Adopts `payload` if it carries a finite score. Returns whether it did.
    pub fn apply_payload(&mut self, payload: Option<&Value>) -> bool {
        match ScoreSnapshot::from_payload(payload) {
            Some(snapshot) => {
                self.adopt(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// External contract of the synchronizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveScore {
    pub score: f64,
    pub previous_score: f64,
    pub label: String,
    pub suggestions: Vec<Suggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization_message: Option<String>,
    pub connection_status: ConnectionStatus,
    pub is_polling: bool,
}

impl LiveScore {
    pub fn delta(&self) -> f64 {
        self.score - self.previous_score
    }
}

#[derive(Debug)]
struct Board {
    values: ScoreState,
    transport: Transport,
    /// Bumped on every teardown; drivers of an older generation stop writing.
    generation: u64,
}

#[derive(Debug, Default)]
struct Control {
    listing_id: Option<ListingId>,
    disabled: bool,
    driver: Option<JoinHandle<()>>,
}

/// Keeps one listing's score live over a push channel, falling back to
/// polling the recompute endpoint while the channel is in error.
///
/// Transports run on a spawned task, so listing changes and enabling must
/// happen inside a Tokio runtime.
pub struct LiveScoreSynchronizer {
    channel: Arc<dyn ScoreChannel>,
    api: MarketplaceApi,
    poll_interval: Duration,
    board: Arc<Mutex<Board>>,
    control: Mutex<Control>,
}

impl LiveScoreSynchronizer {
    pub fn new(channel: Arc<dyn ScoreChannel>, api: MarketplaceApi) -> Self {
        let poll_interval = api.config().score_poll_interval;
        Self {
            channel,
            api,
            poll_interval,
            board: Arc::new(Mutex::new(Board {
                values: ScoreState::default(),
                transport: Transport::Disconnected,
                generation: 0,
            })),
            control: Mutex::new(Control::default()),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn listing_id(&self) -> Option<ListingId> {
        self.lock_control().listing_id.clone()
    }

    pub fn is_disabled(&self) -> bool {
        self.lock_control().disabled
    }

    /// Retargets the synchronizer. Any change tears down both transports and
    /// clears the score values; `None` leaves everything stopped.
    pub fn set_listing(&self, listing_id: Option<ListingId>) {
        let mut control = self.lock_control();
        if control.listing_id == listing_id {
            return;
        }

        self.teardown(&mut control);
        lock_board(&self.board).values.reset();
        control.listing_id = listing_id;
        self.start(&mut control);
    }

    /// While disabled no transport runs, whatever the channel reports.
    pub fn set_disabled(&self, disabled: bool) {
        let mut control = self.lock_control();
        if control.disabled == disabled {
            return;
        }

        control.disabled = disabled;
        if disabled {
            self.teardown(&mut control);
        } else {
            self.start(&mut control);
        }
    }

    pub fn snapshot(&self) -> LiveScore {
        let board = lock_board(&self.board);
        LiveScore {
            score: board.values.score,
            previous_score: board.values.previous_score,
            label: board.values.label.clone(),
            suggestions: board.values.suggestions.clone(),
            normalized_score: board.values.normalized_score,
            normalization_message: board.values.normalization_message.clone(),
            connection_status: board.transport.connection_status(),
            is_polling: board.transport.is_polling(),
        }
    }

    /// Stops all transports and forgets the listing.
    pub fn shutdown(&self) {
        self.set_listing(None);
    }

    fn start(&self, control: &mut Control) {
        if control.disabled || control.driver.is_some() {
            return;
        }
        let Some(listing_id) = control.listing_id.clone() else {
            return;
        };

        let generation = lock_board(&self.board).generation;
        let subscription = self.channel.subscribe(&listing_id);
        info!(listing_id = %listing_id, "score sync started");

        let driver = Driver {
            listing_id,
            api: self.api.clone(),
            board: Arc::clone(&self.board),
            poll_interval: self.poll_interval,
            generation,
        };
        control.driver = Some(tokio::spawn(driver.run(subscription)));
    }

    /// The only place transports are stopped.
    fn teardown(&self, control: &mut Control) {
        if let Some(driver) = control.driver.take() {
            driver.abort();
            debug!("score sync stopped");
        }
        let mut board = lock_board(&self.board);
        board.generation += 1;
        board.transport = Transport::Disconnected;
    }

    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LiveScoreSynchronizer {
    fn drop(&mut self) {
        let control = self.control.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(driver) = control.driver.take() {
            driver.abort();
        }
    }
}

impl std::fmt::Debug for LiveScoreSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveScoreSynchronizer")
            .field("poll_interval", &self.poll_interval)
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}

fn lock_board(board: &Mutex<Board>) -> MutexGuard<'_, Board> {
    board.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Driver {
    listing_id: ListingId,
    api: MarketplaceApi,
    board: Arc<Mutex<Board>>,
    poll_interval: Duration,
    generation: u64,
}

type PendingPoll = Pin<Box<dyn Future<Output = Result<Value, ApiError>> + Send>>;

impl Driver {
    async fn run(self, mut subscription: ScoreSubscription) {
        let mut poll: Option<Interval> = None;
        let mut pending: Option<PendingPoll> = None;
        let mut channel_closed = false;

        loop {
            tokio::select! {
                event = subscription.recv(), if !channel_closed => match event {
                    Some(ChannelEvent::Payload(payload)) => self.apply(payload.as_ref(), "push"),
                    Some(ChannelEvent::Status(status)) => {
                        self.on_status(status, &mut poll, &mut pending);
                    }
                    None => {
                        channel_closed = true;
                        self.on_status(ChannelStatus::Error, &mut poll, &mut pending);
                    }
                },
                () = next_tick(&mut poll) => {
                    if pending.is_some() {
                        debug!(listing_id = %self.listing_id, "previous score poll still running; tick skipped");
                    } else {
                        pending = Some(self.start_poll());
                    }
                }
                result = poll_result(&mut pending) => {
                    pending = None;
                    match result {
                        Ok(body) => self.apply(Some(&body), "poll"),
                        Err(error) => debug!(error = %error, "score poll failed"),
                    }
                }
                else => break,
            }
        }
    }

    /// Leaving the polling state drops both the interval and any request
    /// still in flight, so a late recompute is never applied.
    fn on_status(
        &self,
        status: ChannelStatus,
        poll: &mut Option<Interval>,
        pending: &mut Option<PendingPoll>,
    ) {
        let next = {
            let mut board = lock_board(&self.board);
            if board.generation != self.generation {
                return;
            }
            let next = board.transport.on_channel_status(status, self.poll_interval);
            board.transport = next;
            next
        };

        match next {
            Transport::Polling { every } => {
                if poll.is_none() {
                    info!(listing_id = %self.listing_id, "score push unavailable; polling");
                    let mut interval = tokio::time::interval(every);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    *poll = Some(interval);
                }
            }
            Transport::Push | Transport::Disconnected => {
                if poll.take().is_some() {
                    debug!(listing_id = %self.listing_id, "score polling stopped");
                }
                if pending.take().is_some() {
                    debug!(listing_id = %self.listing_id, "in-flight score poll dropped");
                }
            }
        }
    }

    fn start_poll(&self) -> PendingPoll {
        let api = self.api.clone();
        let listing_id = self.listing_id.clone();
        Box::pin(async move { api.recalculate_score(&listing_id).await })
    }

    fn apply(&self, payload: Option<&Value>, via: &'static str) {
        let mut board = lock_board(&self.board);
        if board.generation != self.generation {
            return;
        }
        if board.values.apply_payload(payload) {
            debug!(via, score = board.values.score, "score updated");
        } else {
            debug!(via, "discarded malformed score payload");
        }
    }
}

async fn poll_result(pending: &mut Option<PendingPoll>) -> Result<Value, ApiError> {
    match pending {
        Some(request) => request.await,
        None => std::future::pending().await,
    }
}

async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn adopting_moves_score_into_previous() {
        let mut state = ScoreState::default();
        assert!(state.apply_payload(Some(&json!({ "score": 50 }))));
        assert!(state.apply_payload(Some(&json!({ "score": 72, "label": "Good" }))));

        assert_eq!(state.score, 72.0);
        assert_eq!(state.previous_score, 50.0);
        assert_eq!(state.label, "Good");
    }

    #[test]
    fn malformed_payloads_leave_state_untouched() {
        let mut state = ScoreState::default();
        state.apply_payload(Some(&json!({ "score": 50 })));
        state.apply_payload(Some(&json!({ "score": 72 })));
        let before = state.clone();

        assert!(!state.apply_payload(None));
        assert!(!state.apply_payload(Some(&Value::Null)));
        assert!(!state.apply_payload(Some(&json!({}))));
        assert!(!state.apply_payload(Some(&json!({ "score": "high" }))));

        assert_eq!(state, before);
    }

    #[test]
    fn reset_clears_everything() {
        let mut state = ScoreState::default();
        state.apply_payload(Some(&json!({
            "score": 64,
            "label": "Fair",
            "suggestions": [{ "field": "mileage", "message": "Add mileage", "boost": 4 }]
        })));

        state.reset();

        assert_eq!(state, ScoreState::default());
    }
}
