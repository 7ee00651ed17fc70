use std::sync::Arc;

use plaque_core::{FieldProvenanceStore, ListingId, MarketplaceApi, ResyncCoordinator, ResyncState};

use crate::cli::{ListingArgs, ResyncRunArgs};
use crate::error::CliError;

use super::CommandOutcome;

pub async fn check(args: &ListingArgs, api: MarketplaceApi) -> Result<CommandOutcome, CliError> {
    let listing_id = ListingId::parse(&args.listing_id)?;
    let coordinator = ResyncCoordinator::new(api, Arc::new(FieldProvenanceStore::new()));

    let state = coordinator.check_availability(&listing_id).await;
    outcome(&state)
}

pub async fn run(args: &ResyncRunArgs, api: MarketplaceApi) -> Result<CommandOutcome, CliError> {
    let listing_id = ListingId::parse(&args.listing_id)?;
    let coordinator = ResyncCoordinator::new(api, Arc::new(FieldProvenanceStore::new()));

    let state = coordinator.resync(&listing_id, &args.adapters).await;
    outcome(&state)
}

fn outcome(state: &ResyncState) -> Result<CommandOutcome, CliError> {
    let data = serde_json::to_value(state)?;
    Ok(match state {
        ResyncState::Error { .. } => CommandOutcome::failed(data),
        _ => CommandOutcome::ok(data),
    })
}
