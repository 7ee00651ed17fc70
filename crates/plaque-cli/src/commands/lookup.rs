use std::sync::Arc;

use plaque_core::{
    FieldProvenanceStore, IdentifierCandidate, LookupAggregator, LookupState, MarketplaceApi,
    ValidationError,
};
use serde_json::json;

use crate::cli::LookupArgs;
use crate::error::CliError;

use super::CommandOutcome;

pub async fn run(args: &LookupArgs, api: MarketplaceApi) -> Result<CommandOutcome, CliError> {
    let candidate = IdentifierCandidate::from_input(&args.identifier);
    let Some((identifier, identifier_type)) = candidate.submission() else {
        return Err(ValidationError::IncompleteIdentifier {
            value: args.identifier.clone(),
        }
        .into());
    };

    let store = Arc::new(FieldProvenanceStore::new());
    store.initialize_defaults();
    let aggregator = LookupAggregator::new(api, Arc::clone(&store));
    let snapshot = aggregator.lookup(&identifier, identifier_type).await;

    let data = json!({
        "identifier": identifier,
        "identifierType": identifier_type,
        "lookup": snapshot,
        "failedSources": snapshot.failed_sources(),
        "fields": store.views(),
        "summary": store.summary(),
    });

    Ok(match snapshot.state {
        LookupState::Error(_) => CommandOutcome::failed(data),
        _ => CommandOutcome::ok(data),
    })
}
