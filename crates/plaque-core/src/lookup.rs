//! Identifier lookup across provider adapters.
//!
//! One request goes out; the server fans it out to every provider adapter and
//! answers with the merged fields plus one [`ProviderOutcome`] per adapter.
//! The aggregator folds those outcomes into a single verdict:
//!
//! | Outcomes | State |
//! |----------|-------|
//! | transport or HTTP failure | `Error(server message or generic)` |
//! | every adapter `failed` | `Error("all services unavailable")` |
//! | some adapters `failed` | `Partial` |
//! | no adapter `failed` | `Success` |
//!
//! On `Success` and `Partial` the certified fields are written into the
//! shared [`FieldProvenanceStore`], which keeps user-declared values.
//!
//! Each call takes a token; a response whose token is no longer the latest
//! (a newer lookup started or [`LookupAggregator::reset`] ran) is dropped
//! without touching state or the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::MarketplaceApi;
use crate::domain::{FieldResult, ProviderOutcome};
use crate::identifier::IdentifierType;
use crate::provenance::{ApplyReport, FieldProvenanceStore};

pub const ALL_SERVICES_UNAVAILABLE: &str = "all services unavailable";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "lowercase")]
pub enum LookupState {
    Idle,
    Loading,
    Success,
    Partial,
    Error(String),
}

impl LookupState {
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Verdict derived from per-adapter outcomes alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateVerdict {
    Success,
    Partial,
    AllFailed,
}

/// An empty outcome list has no failed adapter and counts as success.
pub fn aggregate_verdict(sources: &[ProviderOutcome]) -> AggregateVerdict {
    let failed = sources.iter().filter(|outcome| outcome.is_failed()).count();
    if failed == 0 {
        AggregateVerdict::Success
    } else if failed == sources.len() {
        AggregateVerdict::AllFailed
    } else {
        AggregateVerdict::Partial
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupSnapshot {
    #[serde(flatten)]
    pub state: LookupState,
    pub fields: Vec<FieldResult>,
    pub sources: Vec<ProviderOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<ApplyReport>,
}

impl LookupSnapshot {
    fn idle() -> Self {
        Self {
            state: LookupState::Idle,
            fields: Vec::new(),
            sources: Vec::new(),
            applied: None,
        }
    }

    pub fn failed_sources(&self) -> Vec<&ProviderOutcome> {
        self.sources.iter().filter(|outcome| outcome.is_failed()).collect()
    }

    pub fn degraded_sources(&self) -> Vec<&ProviderOutcome> {
        self.sources
            .iter()
            .filter(|outcome| outcome.is_degraded())
            .collect()
    }
}

/// `idle -> loading -> {success | partial | error}` state machine.
pub struct LookupAggregator {
    api: MarketplaceApi,
    store: Arc<FieldProvenanceStore>,
    snapshot: Mutex<LookupSnapshot>,
    latest_token: AtomicU64,
}

impl LookupAggregator {
    pub fn new(api: MarketplaceApi, store: Arc<FieldProvenanceStore>) -> Self {
        Self {
            api,
            store,
            snapshot: Mutex::new(LookupSnapshot::idle()),
            latest_token: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> LookupState {
        self.lock().state.clone()
    }

    pub fn snapshot(&self) -> LookupSnapshot {
        self.lock().clone()
    }

    /// Runs one lookup and returns the resulting snapshot. Never fails:
    /// errors end up in [`LookupState::Error`].
    pub async fn lookup(&self, identifier: &str, identifier_type: IdentifierType) -> LookupSnapshot {
        let token = {
            let mut snapshot = self.lock();
            let token = self.latest_token.fetch_add(1, Ordering::SeqCst) + 1;
            *snapshot = LookupSnapshot {
                state: LookupState::Loading,
                ..LookupSnapshot::idle()
            };
            token
        };

        debug!(identifier, %identifier_type, token, "lookup started");
        let result = self.api.auto_fill(identifier, identifier_type).await;

        let mut snapshot = self.lock();
        if self.latest_token.load(Ordering::SeqCst) != token {
            debug!(token, "discarding superseded lookup response");
            return snapshot.clone();
        }

        *snapshot = match result {
            Err(error) => {
                warn!(%identifier_type, %error, "lookup request failed");
                LookupSnapshot {
                    state: LookupState::Error(error.user_message()),
                    ..LookupSnapshot::idle()
                }
            }
            Ok(response) => {
                let verdict = aggregate_verdict(&response.sources);
                let (state, applied) = match verdict {
                    AggregateVerdict::AllFailed => {
                        (LookupState::Error(String::from(ALL_SERVICES_UNAVAILABLE)), None)
                    }
                    AggregateVerdict::Partial => (
                        LookupState::Partial,
                        Some(self.store.apply_certified(&response.fields)),
                    ),
                    AggregateVerdict::Success => (
                        LookupState::Success,
                        Some(self.store.apply_certified(&response.fields)),
                    ),
                };

                info!(
                    %identifier_type,
                    ?verdict,
                    fields = response.fields.len(),
                    failed = response.sources.iter().filter(|s| s.is_failed()).count(),
                    total = response.sources.len(),
                    "lookup completed"
                );

                LookupSnapshot {
                    state,
                    fields: response.fields,
                    sources: response.sources,
                    applied,
                }
            }
        };

        snapshot.clone()
    }

    /// Back to `Idle`. An in-flight request is not aborted, but its response
    /// will be discarded.
    pub fn reset(&self) {
        let mut snapshot = self.lock();
        self.latest_token.fetch_add(1, Ordering::SeqCst);
        *snapshot = LookupSnapshot::idle();
    }

    fn lock(&self) -> MutexGuard<'_, LookupSnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CacheStatus;

    #[test]
    fn verdict_success_when_nothing_failed() {
        let sources = [
            ProviderOutcome::success("IVehicleRegistry", "siv"),
            ProviderOutcome::cached("IHistoryReport", "histovec", CacheStatus::Stale),
        ];
        assert_eq!(aggregate_verdict(&sources), AggregateVerdict::Success);
        assert_eq!(aggregate_verdict(&[]), AggregateVerdict::Success);
    }

    #[test]
    fn verdict_partial_when_some_failed() {
        let sources = [
            ProviderOutcome::success("IVehicleRegistry", "siv"),
            ProviderOutcome::failed("IHistoryReport", "histovec", "timeout"),
            ProviderOutcome::success("IEmissions", "ademe"),
        ];
        assert_eq!(aggregate_verdict(&sources), AggregateVerdict::Partial);
    }

    #[test]
    fn verdict_all_failed() {
        let sources = [
            ProviderOutcome::failed("IVehicleRegistry", "siv", "503"),
            ProviderOutcome::failed("IHistoryReport", "histovec", "timeout"),
        ];
        assert_eq!(aggregate_verdict(&sources), AggregateVerdict::AllFailed);
    }

    #[test]
    fn state_serializes_with_error_message() {
        let json = serde_json::to_value(LookupState::Error(String::from("boom"))).expect("serialize");
        assert_eq!(json, serde_json::json!({ "state": "error", "error": "boom" }));
        let json = serde_json::to_value(LookupState::Partial).expect("serialize");
        assert_eq!(json, serde_json::json!({ "state": "partial" }));
    }
}
