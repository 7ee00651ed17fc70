//! One listing-editing session.
//!
//! The session owns everything that used to be ambient state: the field
//! store shared by the lookup and resync machines, both machines, and the
//! live score synchronizer. Nothing here is global; two sessions never
//! observe each other.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::api::MarketplaceApi;
use crate::config::ClientConfig;
use crate::domain::{FieldValue, ListingId};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::identifier::IdentifierCandidate;
use crate::lookup::{LookupAggregator, LookupSnapshot};
use crate::provenance::{FieldProvenanceStore, FieldStatus};
use crate::resync::{ResyncCoordinator, ResyncState};
use crate::score::{LiveScore, LiveScoreSynchronizer, ScoreChannel, SseScoreChannel};
use crate::ValidationError;

pub struct EditingSession {
    store: Arc<FieldProvenanceStore>,
    lookup: LookupAggregator,
    resync: ResyncCoordinator,
    score: LiveScoreSynchronizer,
    listing_id: Mutex<Option<ListingId>>,
}

impl EditingSession {
    pub fn new(api: MarketplaceApi, channel: Arc<dyn ScoreChannel>) -> Self {
        let store = Arc::new(FieldProvenanceStore::new());
        Self {
            lookup: LookupAggregator::new(api.clone(), Arc::clone(&store)),
            resync: ResyncCoordinator::new(api.clone(), Arc::clone(&store)),
            score: LiveScoreSynchronizer::new(channel, api),
            store,
            listing_id: Mutex::new(None),
        }
    }

    /// Session over the production transports: reqwest for requests and
    /// SSE for score pushes.
    pub fn from_config(config: ClientConfig) -> Self {
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
        let channel: Arc<dyn ScoreChannel> = Arc::new(SseScoreChannel::new(config.clone()));
        Self::new(MarketplaceApi::new(http, config), channel)
    }

    pub fn store(&self) -> &Arc<FieldProvenanceStore> {
        &self.store
    }

    pub fn lookup(&self) -> &LookupAggregator {
        &self.lookup
    }

    pub fn resync(&self) -> &ResyncCoordinator {
        &self.resync
    }

    pub fn score(&self) -> &LiveScoreSynchronizer {
        &self.score
    }

    pub fn live_score(&self) -> LiveScore {
        self.score.snapshot()
    }

    pub fn listing_id(&self) -> Option<ListingId> {
        self.lock_listing().clone()
    }

    /// Switches the session to another listing. A change clears the field
    /// store, resets both machines and retargets the score; setting the same
    /// id again does nothing.
    pub fn set_listing(&self, listing_id: Option<ListingId>) {
        let mut current = self.lock_listing();
        if *current == listing_id {
            return;
        }

        info!(
            from = current.as_ref().map(ListingId::as_str),
            to = listing_id.as_ref().map(ListingId::as_str),
            "editing session retargeted"
        );
        self.store.clear();
        self.lookup.reset();
        self.resync.reset();
        self.score.set_listing(listing_id.clone());
        *current = listing_id;
    }

    pub fn initialize_fields<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.store.initialize(names);
    }

    pub fn initialize_default_fields(&self) {
        self.store.initialize_defaults();
    }

    pub fn edit_field(
        &self,
        name: &str,
        value: Option<FieldValue>,
    ) -> Result<FieldStatus, ValidationError> {
        self.store.edit(name, value)
    }

    /// Classifies raw input and runs a lookup once it forms a complete
    /// identifier. Incomplete input returns `None` without any request.
    pub async fn lookup_identifier(&self, raw_input: &str) -> Option<LookupSnapshot> {
        let (identifier, identifier_type) = IdentifierCandidate::from_input(raw_input).submission()?;
        Some(self.lookup.lookup(&identifier, identifier_type).await)
    }

    /// Availability check for the current listing; `None` without one.
    pub async fn check_resync(&self) -> Option<ResyncState> {
        let listing_id = self.listing_id()?;
        Some(self.resync.check_availability(&listing_id).await)
    }

    pub async fn run_resync(&self, adapters: &[String]) -> Option<ResyncState> {
        let listing_id = self.listing_id()?;
        Some(self.resync.resync(&listing_id, adapters).await)
    }

    /// Tears down the score transports and drops all session state.
    pub fn dispose(&self) {
        self.set_listing(None);
        self.store.clear();
    }

    fn lock_listing(&self) -> MutexGuard<'_, Option<ListingId>> {
        self.listing_id.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EditingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditingSession")
            .field("listing_id", &self.listing_id())
            .field("fields", &self.store.len())
            .finish_non_exhaustive()
    }
}
