//! Marketplace endpoints consumed by the core.
//!
//! | Call | Method | Path |
//! |------|--------|------|
//! | Identifier lookup | `POST` | `/api/seller/autoFillByPlate` |
//! | Resync availability | `POST` | `/api/seller/resyncAvailability` |
//! | Resync execution | `POST` | `/api/seller/resyncListing` |
//! | Score recompute | `POST` | `/api/listings/{listingId}/recalculateScore` |
//! | Score push stream | `GET` | `/api/listings/{listingId}/scoreEvents` |

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::ClientConfig;
use crate::domain::{AdapterAvailability, FieldResult, ListingId, ProviderOutcome};
use crate::http_client::{HttpClient, HttpRequest};
use crate::identifier::IdentifierType;
use crate::wire::embedded;

pub const AUTO_FILL_PATH: &str = "/api/seller/autoFillByPlate";
pub const RESYNC_AVAILABILITY_PATH: &str = "/api/seller/resyncAvailability";
pub const RESYNC_PATH: &str = "/api/seller/resyncListing";

pub fn recalculate_score_path(listing_id: &ListingId) -> String {
    format!(
        "/api/listings/{}/recalculateScore",
        urlencoding::encode(listing_id.as_str())
    )
}

pub fn score_events_path(listing_id: &ListingId) -> String {
    format!(
        "/api/listings/{}/scoreEvents",
        urlencoding::encode(listing_id.as_str())
    )
}

/// Failure of one request/response exchange.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server returned status {status}")]
    Status { status: u16, message: Option<String> },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("request encoding failed: {0}")]
    Encode(String),
}

impl ApiError {
    /// Message for the user: the server's own wording when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            Self::Status {
                message: Some(message),
                ..
            } => message.clone(),
            Self::Status {
                status,
                message: None,
            } => format!("request failed with status {status}"),
            Self::Transport(_) => String::from("unable to reach the marketplace service"),
            Self::Decode(_) => String::from("unexpected response from the marketplace service"),
            Self::Encode(_) => String::from("request could not be prepared"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub identifier: String,
    pub identifier_type: IdentifierType,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    #[serde(deserialize_with = "embedded", default)]
    pub fields: Vec<FieldResult>,
    #[serde(deserialize_with = "embedded", default)]
    pub sources: Vec<ProviderOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncAvailabilityRequest<'a> {
    pub listing_id: &'a ListingId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncAvailabilityResponse {
    #[serde(default)]
    pub has_resyncable_fields: bool,
    #[serde(deserialize_with = "embedded", default)]
    pub available_adapters: Vec<AdapterAvailability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncRequest<'a> {
    pub listing_id: &'a ListingId,
    pub adapters: &'a [String],
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(deserialize_with = "embedded", default)]
    pub updated_fields: Vec<FieldResult>,
    #[serde(deserialize_with = "embedded", default)]
    pub failed_adapters: Vec<String>,
    #[serde(default)]
    pub new_visibility_score: Option<f64>,
}

/// Authenticated client for the marketplace endpoints.
#[derive(Clone)]
pub struct MarketplaceApi {
    http: Arc<dyn HttpClient>,
    config: ClientConfig,
}

impl MarketplaceApi {
    pub fn new(http: Arc<dyn HttpClient>, config: ClientConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn auto_fill(
        &self,
        identifier: &str,
        identifier_type: IdentifierType,
    ) -> Result<LookupResponse, ApiError> {
        let body = LookupRequest {
            identifier: identifier.to_owned(),
            identifier_type,
        };
        self.post(AUTO_FILL_PATH, Some(&body)).await
    }

    pub async fn resync_availability(
        &self,
        listing_id: &ListingId,
    ) -> Result<ResyncAvailabilityResponse, ApiError> {
        let body = ResyncAvailabilityRequest { listing_id };
        self.post(RESYNC_AVAILABILITY_PATH, Some(&body)).await
    }

    pub async fn resync(
        &self,
        listing_id: &ListingId,
        adapters: &[String],
    ) -> Result<ResyncResponse, ApiError> {
        let body = ResyncRequest {
            listing_id,
            adapters,
        };
        self.post(RESYNC_PATH, Some(&body)).await
    }

    /// Recompute endpoint used by the polling fallback. The body is a score
    /// snapshot directly, not double-encoded.
    pub async fn recalculate_score(&self, listing_id: &ListingId) -> Result<Value, ApiError> {
        self.post::<(), Value>(&recalculate_score_path(listing_id), None)
            .await
    }

    async fn post<B, R>(&self, path: &str, body: Option<&B>) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = HttpRequest::post(self.config.url(path))
            .with_auth(&self.config.auth)
            .with_header("accept", "application/json")
            .with_timeout_ms(duration_ms(self.config.request_timeout));
        if let Some(body) = body {
            request = request
                .with_json(body)
                .map_err(|error| ApiError::Encode(error.to_string()))?;
        }

        debug!(path, "sending marketplace request");
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|error| ApiError::Transport(error.message().to_owned()))?;

        if !response.is_success() {
            return Err(ApiError::Status {
                status: response.status,
                message: server_message(&response.body),
            });
        }

        serde_json::from_str(&response.body).map_err(|error| ApiError::Decode(error.to_string()))
    }
}

/// Extracts `message`, `error` or `error.message` from a JSON error body.
pub fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let candidate = value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
        .or_else(|| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
        })?;

    let trimmed = candidate.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn duration_ms(duration: std::time::Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpMethod, HttpResponse, ScriptedHttpClient};
    use serde_json::json;

    fn api(http: Arc<ScriptedHttpClient>) -> MarketplaceApi {
        let config = ClientConfig::default()
            .with_base_url("http://api.test")
            .expect("valid url")
            .with_bearer_token("secret");
        MarketplaceApi::new(http, config)
    }

    #[tokio::test]
    async fn auto_fill_posts_identifier_and_type() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.respond_json(HttpMethod::Post, AUTO_FILL_PATH, json!({ "fields": [], "sources": [] }));

        api(http.clone())
            .auto_fill("AB-123-CD", IdentifierType::Plate)
            .await
            .expect("lookup succeeds");

        let requests = http.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "http://api.test/api/seller/autoFillByPlate");
        assert_eq!(
            requests[0].body.as_deref(),
            Some(r#"{"identifier":"AB-123-CD","identifierType":"plate"}"#)
        );
        assert_eq!(
            requests[0].headers.get("authorization").map(String::as_str),
            Some("Bearer secret")
        );
    }

    #[tokio::test]
    async fn status_error_prefers_server_message() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.respond(
            HttpMethod::Post,
            AUTO_FILL_PATH,
            HttpResponse::new(429, r#"{"message":"quota exceeded"}"#),
        );

        let error = api(http)
            .auto_fill("AB-123-CD", IdentifierType::Plate)
            .await
            .expect_err("status 429 fails");

        assert_eq!(
            error,
            ApiError::Status {
                status: 429,
                message: Some(String::from("quota exceeded"))
            }
        );
        assert_eq!(error.user_message(), "quota exceeded");
    }

    #[tokio::test]
    async fn transport_error_uses_generic_message() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.fail(
            HttpMethod::Post,
            RESYNC_PATH,
            HttpError::new("connection failed: refused"),
        );
        let listing = ListingId::parse("k1").expect("valid id");

        let error = api(http)
            .resync(&listing, &[String::from("siv")])
            .await
            .expect_err("transport failure");

        assert!(matches!(error, ApiError::Transport(_)));
        assert_eq!(error.user_message(), "unable to reach the marketplace service");
    }

    #[test]
    fn listing_id_is_embedded_in_score_paths() {
        let listing = ListingId::parse("a.b_c-1").expect("valid id");
        assert_eq!(recalculate_score_path(&listing), "/api/listings/a.b_c-1/recalculateScore");
    }

    #[test]
    fn server_message_reads_nested_error() {
        assert_eq!(
            server_message(r#"{"error":{"message":"listing not found"}}"#),
            Some(String::from("listing not found"))
        );
        assert_eq!(server_message(r#"{"error":"  "}"#), None);
        assert_eq!(server_message("<html>"), None);
    }

    #[test]
    fn resync_response_accepts_string_encoded_lists() {
        let response: ResyncResponse = serde_json::from_value(json!({
            "success": true,
            "updatedFields": "[{\"fieldName\":\"co2\",\"fieldValue\":118,\"source\":\"ademe\",\"isCertified\":true}]",
            "failedAdapters": "[\"histovec\"]",
            "newVisibilityScore": 64
        }))
        .expect("decode");

        assert_eq!(response.updated_fields.len(), 1);
        assert_eq!(response.failed_adapters, vec!["histovec"]);
        assert_eq!(response.new_visibility_score, Some(64.0));
    }
}
