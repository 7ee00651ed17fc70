//! Targeted re-fetch of certified fields from stale or failed adapters.
//!
//! ```text
//! idle -> checking -> idle        (nothing resyncable)
//!                  -> available   -> syncing -> done | error
//! ```
//!
//! Unlike a lookup, a resync where some adapters failed is still `done`:
//! the report lists the failed adapters and the caller decides what to show.
//! Only transport and HTTP failures produce `error`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::MarketplaceApi;
use crate::domain::{AdapterAvailability, ListingId};
use crate::provenance::{ApplyReport, FieldProvenanceStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncReport {
    pub success: bool,
    pub updated_field_count: usize,
    pub failed_adapters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_visibility_score: Option<f64>,
    pub applied: ApplyReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ResyncState {
    Idle,
    Checking,
    Available { adapters: Vec<AdapterAvailability> },
    Syncing,
    Done { result: ResyncReport },
    Error { error: String },
}

impl ResyncState {
    pub fn available_adapters(&self) -> &[AdapterAvailability] {
        match self {
            Self::Available { adapters } => adapters,
            _ => &[],
        }
    }

    pub fn report(&self) -> Option<&ResyncReport> {
        match self {
            Self::Done { result } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error { error } => Some(error),
            _ => None,
        }
    }
}

pub struct ResyncCoordinator {
    api: MarketplaceApi,
    store: Arc<FieldProvenanceStore>,
    state: Mutex<ResyncState>,
    latest_token: AtomicU64,
}

impl ResyncCoordinator {
    pub fn new(api: MarketplaceApi, store: Arc<FieldProvenanceStore>) -> Self {
        Self {
            api,
            store,
            state: Mutex::new(ResyncState::Idle),
            latest_token: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ResyncState {
        self.lock().clone()
    }

    /// Asks which adapters can refresh the listing's certified fields.
    pub async fn check_availability(&self, listing_id: &ListingId) -> ResyncState {
        let token = self.begin(ResyncState::Checking);
        let result = self.api.resync_availability(listing_id).await;

        self.finish(token, || match result {
            Err(error) => {
                warn!(%listing_id, %error, "resync availability check failed");
                ResyncState::Error {
                    error: error.user_message(),
                }
            }
            Ok(response) if !response.has_resyncable_fields || response.available_adapters.is_empty() => {
                debug!(%listing_id, "no resyncable fields");
                ResyncState::Idle
            }
            Ok(response) => {
                info!(
                    %listing_id,
                    adapters = response.available_adapters.len(),
                    "resync available"
                );
                ResyncState::Available {
                    adapters: response.available_adapters,
                }
            }
        })
    }

    /// Re-fetches from the selected adapters and re-certifies what came back.
    pub async fn resync(&self, listing_id: &ListingId, adapters: &[String]) -> ResyncState {
        let token = self.begin(ResyncState::Syncing);
        let result = self.api.resync(listing_id, adapters).await;

        self.finish(token, || match result {
            Err(error) => {
                warn!(%listing_id, %error, "resync failed");
                ResyncState::Error {
                    error: error.user_message(),
                }
            }
            Ok(response) => {
                let applied = if response.success {
                    self.store.apply_certified(&response.updated_fields)
                } else {
                    ApplyReport::default()
                };

                info!(
                    %listing_id,
                    success = response.success,
                    updated = response.updated_fields.len(),
                    failed = response.failed_adapters.len(),
                    "resync completed"
                );

                ResyncState::Done {
                    result: ResyncReport {
                        success: response.success,
                        updated_field_count: response.updated_fields.len(),
                        failed_adapters: response.failed_adapters,
                        new_visibility_score: response.new_visibility_score,
                        applied,
                    },
                }
            }
        })
    }

    /// Back to `Idle`; any in-flight response will be discarded.
    pub fn reset(&self) {
        let mut state = self.lock();
        self.latest_token.fetch_add(1, Ordering::SeqCst);
        *state = ResyncState::Idle;
    }

    fn begin(&self, state: ResyncState) -> u64 {
        let mut current = self.lock();
        *current = state;
        self.latest_token.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn finish(&self, token: u64, next: impl FnOnce() -> ResyncState) -> ResyncState {
        let mut state = self.lock();
        if self.latest_token.load(Ordering::SeqCst) != token {
            debug!(token, "discarding superseded resync response");
            return state.clone();
        }
        *state = next();
        state.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ResyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_serializes_with_tag() {
        let state = ResyncState::Available {
            adapters: vec![AdapterAvailability {
                adapter_interface: String::from("IHistoryReport"),
                provider_key: String::from("histovec"),
                is_available: true,
                certifiable_fields: vec![String::from("mileage")],
            }],
        };

        let json = serde_json::to_value(&state).expect("serialize");

        assert_eq!(json["state"], "available");
        assert_eq!(json["adapters"][0]["providerKey"], "histovec");
        assert_eq!(json["adapters"][0]["certifiableFields"], json!(["mileage"]));
    }

    #[test]
    fn accessors_are_empty_outside_matching_states() {
        assert!(ResyncState::Idle.available_adapters().is_empty());
        assert!(ResyncState::Syncing.report().is_none());
        assert_eq!(
            ResyncState::Error {
                error: String::from("boom")
            }
            .error(),
            Some("boom")
        );
    }
}
