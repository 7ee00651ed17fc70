//! Live visibility score.
//!
//! ```text
//! ScoreChannel (push) ──events──┐
//!                               ├──> Driver task ──> ScoreState ──> LiveScore
//! MarketplaceApi (poll) ──body──┘        │
//!                                Transport: Disconnected | Push | Polling
//! ```
//!
//! The push channel is primary. While it reports `Error` the driver polls
//! the recompute endpoint on a fixed interval, with the first request sent
//! immediately.

mod channel;
mod live;
mod sse;
mod transport;

pub use channel::{ChannelEvent, ChannelStatus, ManualScoreChannel, ScoreChannel, ScoreSubscription};
pub use live::{LiveScore, LiveScoreSynchronizer, ScoreState};
pub use sse::{SseDecoder, SseEvent, SseScoreChannel, SCORE_EVENT_NAME};
pub use transport::{ConnectionStatus, Transport};
