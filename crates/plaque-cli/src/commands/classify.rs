use plaque_core::{format_plate, IdentifierCandidate, IdentifierFormat};
use serde::Serialize;

use crate::cli::ClassifyArgs;
use crate::error::CliError;

use super::CommandOutcome;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyData {
    #[serde(flatten)]
    candidate: IdentifierCandidate,
    #[serde(skip_serializing_if = "Option::is_none")]
    formatted_plate: Option<String>,
}

pub fn run(args: &ClassifyArgs) -> Result<CommandOutcome, CliError> {
    let candidate = IdentifierCandidate::from_input(&args.input);
    let formatted_plate =
        (candidate.format == IdentifierFormat::Plate).then(|| format_plate(&args.input));

    let data = serde_json::to_value(ClassifyData {
        candidate,
        formatted_plate,
    })?;
    Ok(CommandOutcome::ok(data))
}
