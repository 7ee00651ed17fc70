//! Core of the plaque listing editor.
//!
//! This crate contains:
//! - Vehicle identifier classification (plate / VIN)
//! - Per-field provenance (empty, certified, declared)
//! - Multi-provider lookup aggregation with partial-failure semantics
//! - Targeted resync of stale or failed provider adapters
//! - Live visibility score over push with a polling fallback
//! - The marketplace HTTP boundary and its configuration

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod identifier;
pub mod lookup;
pub mod provenance;
pub mod resync;
pub mod score;
pub mod session;
pub mod wire;

pub use api::{ApiError, MarketplaceApi};
pub use config::ClientConfig;
pub use domain::{
    AdapterAvailability, CacheStatus, FieldResult, FieldValue, ListingId, OutcomeStatus,
    ProviderOutcome, ScoreSnapshot, Suggestion, UtcDateTime,
};
pub use error::ValidationError;
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
    ScriptedHttpClient,
};
pub use identifier::{
    classify, format_plate, is_valid_identifier, IdentifierCandidate, IdentifierFormat,
    IdentifierType,
};
pub use lookup::{LookupAggregator, LookupSnapshot, LookupState};
pub use provenance::{
    ApplyReport, FieldProvenanceStore, FieldState, FieldStatus, FieldView, ProvenanceSummary,
    DEFAULT_FIELDS,
};
pub use resync::{ResyncCoordinator, ResyncReport, ResyncState};
pub use score::{
    ChannelEvent, ChannelStatus, ConnectionStatus, LiveScore, LiveScoreSynchronizer,
    ManualScoreChannel, ScoreChannel, SseScoreChannel,
};
pub use session::EditingSession;
