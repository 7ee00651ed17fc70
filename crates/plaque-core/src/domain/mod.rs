//! # Domain Models
//!
//! Types shared by every component of the listing editor core.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ListingId`] | Validated listing id |
//! | [`FieldValue`] | Text or numeric field value |
//! | [`FieldResult`] | Merged field returned by a lookup or resync |
//! | [`ProviderOutcome`] | Per-adapter outcome of one call |
//! | [`AdapterAvailability`] | Resync candidate adapter |
//! | [`ScoreSnapshot`] | Server-computed visibility score |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Wire types keep the marketplace API's camelCase names through serde
//! renames; Rust code uses snake_case throughout.

mod field;
mod listing;
mod provider;
mod score;
mod timestamp;

pub use field::{FieldResult, FieldValue};
pub use listing::ListingId;
pub use provider::{AdapterAvailability, CacheStatus, OutcomeStatus, ProviderOutcome};
pub use score::{ScoreSnapshot, Suggestion};
pub use timestamp::UtcDateTime;
