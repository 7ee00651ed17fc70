use std::sync::Arc;
use std::time::Duration;

use plaque_core::{
    ClientConfig, HttpClient, ListingId, LiveScoreSynchronizer, MarketplaceApi, ReqwestHttpClient,
    ScoreChannel, SseScoreChannel,
};
use serde_json::json;
use tracing::info;

use crate::cli::ScoreWatchArgs;
use crate::error::CliError;
use crate::output;

use super::CommandOutcome;

const SAMPLE_EVERY: Duration = Duration::from_millis(250);

pub async fn watch(args: &ScoreWatchArgs, config: ClientConfig) -> Result<CommandOutcome, CliError> {
    let listing_id = ListingId::parse(&args.listing_id)?;
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let channel: Arc<dyn ScoreChannel> = Arc::new(SseScoreChannel::new(config.clone()));
    let synchronizer = LiveScoreSynchronizer::new(channel, MarketplaceApi::new(http, config));

    synchronizer.set_listing(Some(listing_id.clone()));
    info!(listing_id = %listing_id, seconds = args.seconds, "watching score");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.seconds);
    let mut sampler = tokio::time::interval(SAMPLE_EVERY);
    let mut last = None;
    let mut updates = 0_usize;

    while tokio::time::Instant::now() < deadline {
        sampler.tick().await;
        let current = synchronizer.snapshot();
        if last.as_ref() != Some(&current) {
            output::render_line(&current)?;
            updates += 1;
            last = Some(current);
        }
    }

    synchronizer.shutdown();
    Ok(CommandOutcome::ok(json!({
        "listingId": listing_id,
        "updates": updates,
        "final": last,
    })))
}
