mod classify;
mod lookup;
mod resync;
mod score;

use std::sync::Arc;

use plaque_core::config::parse_millis;
use plaque_core::{ClientConfig, HttpClient, MarketplaceApi, ReqwestHttpClient};
use serde_json::Value;

use crate::cli::{Cli, Command, ResyncCommand, ScoreCommand};
use crate::error::CliError;

pub struct CommandOutcome {
    pub data: Value,
    /// The operation ended in an error state; exit code 3.
    pub failed: bool,
}

impl CommandOutcome {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            failed: false,
        }
    }

    pub fn failed(data: Value) -> Self {
        Self { data, failed: true }
    }
}

pub async fn run(cli: &Cli) -> Result<CommandOutcome, CliError> {
    match &cli.command {
        Command::Classify(args) => classify::run(args),
        Command::Lookup(args) => lookup::run(args, api(cli)?).await,
        Command::Resync(ResyncCommand::Check(args)) => resync::check(args, api(cli)?).await,
        Command::Resync(ResyncCommand::Run(args)) => resync::run(args, api(cli)?).await,
        Command::Score(ScoreCommand::Watch(args)) => score::watch(args, client_config(cli)?).await,
    }
}

fn client_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url.as_str())?;
    }
    if let Some(token) = cli.token.as_deref().filter(|token| !token.trim().is_empty()) {
        config = config.with_bearer_token(token);
    }
    if let Some(raw) = &cli.timeout_ms {
        config = config.with_request_timeout(parse_millis("--timeout-ms", raw)?);
    }
    if let Some(raw) = &cli.poll_ms {
        config = config.with_score_poll_interval(parse_millis("--poll-ms", raw)?);
    }
    Ok(config)
}

fn api(cli: &Cli) -> Result<MarketplaceApi, CliError> {
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    Ok(MarketplaceApi::new(http, client_config(cli)?))
}
