use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

/// HTTP methods used by the marketplace endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Authentication applied to outgoing requests.
///
/// Token acquisition belongs to the surrounding application; the core only
/// forwards what it is given.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum HttpAuth {
    #[default]
    None,
    BearerToken(String),
    Header { name: String, value: String },
}

impl HttpAuth {
    pub fn apply(&self, headers: &mut BTreeMap<String, String>) {
        match self {
            Self::None => {}
            Self::BearerToken(token) => {
                headers.insert(String::from("authorization"), format!("Bearer {token}"));
            }
            Self::Header { name, value } => {
                headers.insert(name.to_ascii_lowercase(), value.clone());
            }
        }
    }
}

impl std::fmt::Debug for HttpAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::BearerToken(_) => f.write_str("BearerToken(<redacted>)"),
            Self::Header { name, .. } => write!(f, "Header({name}: <redacted>)"),
        }
    }
}

/// Timeout for requests that never call [`HttpRequest::with_timeout_ms`].
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Transport-neutral request handed to an [`HttpClient`].
///
/// Header names are stored lowercased, so later writes of the same header
/// replace earlier ones whatever their casing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `body` and marks the request as JSON.
    pub fn with_json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, serde_json::Error> {
        let encoded = serde_json::to_string(body)?;
        Ok(self
            .with_header("content-type", "application/json")
            .with_body(encoded))
    }

    pub fn with_auth(mut self, auth: &HttpAuth) -> Self {
        auth.apply(&mut self.headers);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Path component of the URL, without query string.
    pub fn path(&self) -> &str {
        url_path(&self.url)
    }
}

/// HTTP response envelope returned by an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok_json(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level HTTP error: the request never produced a status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Request/response transport used by every marketplace call.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

const USER_AGENT: &str = concat!("plaque/", env!("CARGO_PKG_VERSION"));

/// Marketplace transport over a shared [`reqwest::Client`].
///
/// Cloning is cheap: every clone reuses the same connection pool and cookie
/// jar. Each [`HttpRequest`] carries its own timeout, so one client serves
/// both the short lookup calls and the score recompute endpoint.
///
/// Only transport failures become [`HttpError`]. Any status code, including
/// 4xx and 5xx, comes back as an [`HttpResponse`] for the API layer to judge.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    pool: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Client identifying itself as `plaque/<version>`.
    ///
    /// Falls back to reqwest's stock client when the tuned builder cannot
    /// initialise.
    pub fn new() -> Self {
        let pool = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "tuned http client unavailable; using defaults");
                reqwest::Client::new()
            });
        Self { pool }
    }

    /// Wraps a caller-built client, for proxies or custom TLS roots.
    pub fn with_client(pool: reqwest::Client) -> Self {
        Self { pool }
    }

    /// Translates the envelope into a ready-to-send reqwest request.
    fn prepare(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            timeout_ms,
        } = request;

        let prepared = headers.iter().fold(
            self.pool
                .request(method.to_reqwest(), url)
                .timeout(Duration::from_millis(timeout_ms)),
            |prepared, (name, value)| prepared.header(name, value),
        );

        match body {
            Some(body) => prepared.body(body),
            None => prepared,
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let prepared = self.prepare(request);
        Box::pin(async move {
            let response = prepared.send().await.map_err(HttpError::from_send)?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|error| {
                HttpError::new(format!("response body unreadable: {error}"))
            })?;
            Ok(HttpResponse::new(status, body))
        })
    }
}

impl HttpMethod {
    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
        }
    }
}

impl HttpError {
    /// Names the stage a send failed at, so logs tell a slow marketplace
    /// apart from an unreachable one.
    fn from_send(error: reqwest::Error) -> Self {
        let stage = if error.is_timeout() {
            "timed out"
        } else if error.is_connect() {
            "could not connect"
        } else {
            "failed"
        };
        Self::new(format!("marketplace request {stage}: {error}"))
    }
}

#[derive(Debug, Clone)]
struct ScriptedReply {
    delay: Option<Duration>,
    result: Result<HttpResponse, HttpError>,
}

type RouteKey = (HttpMethod, String);

/// In-memory transport for deterministic offline tests.
///
/// Replies are queued per `(method, path)`. Each call consumes the front of
/// the queue except the last reply, which keeps answering. Unscripted routes
/// answer 404. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    routes: Mutex<HashMap<RouteKey, VecDeque<ScriptedReply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: HttpMethod, path: &str, response: HttpResponse) -> &Self {
        self.push(method, path, None, Ok(response))
    }

    pub fn respond_json(&self, method: HttpMethod, path: &str, body: serde_json::Value) -> &Self {
        self.respond(method, path, HttpResponse::ok_json(body.to_string()))
    }

    /// Like [`respond`](Self::respond) but the reply resolves after `delay`.
    pub fn respond_after(
        &self,
        method: HttpMethod,
        path: &str,
        delay: Duration,
        response: HttpResponse,
    ) -> &Self {
        self.push(method, path, Some(delay), Ok(response))
    }

    pub fn fail(&self, method: HttpMethod, path: &str, error: HttpError) -> &Self {
        self.push(method, path, None, Err(error))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|request| request.path() == path)
            .count()
    }

    fn push(
        &self,
        method: HttpMethod,
        path: &str,
        delay: Option<Duration>,
        result: Result<HttpResponse, HttpError>,
    ) -> &Self {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((method, path.to_owned()))
            .or_default()
            .push_back(ScriptedReply { delay, result });
        self
    }

    fn next_reply(&self, method: HttpMethod, path: &str) -> Option<ScriptedReply> {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = routes.get_mut(&(method, path.to_owned()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let reply = self.next_reply(request.method, request.path());
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request);

            let Some(reply) = reply else {
                return Ok(HttpResponse::new(404, r#"{"message":"no scripted route"}"#));
            };

            if let Some(delay) = reply.delay {
                tokio::time::sleep(delay).await;
            }
            reply.result
        })
    }
}

fn url_path(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme
        .find('/')
        .map_or("/", |index| &without_scheme[index..]);
    path.split(['?', '#']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_auth_populates_authorization_header() {
        let request = HttpRequest::post("https://api.example.test/api/seller/autoFillByPlate")
            .with_auth(&HttpAuth::BearerToken(String::from("token-123")));

        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Bearer token-123")
        );
    }

    #[test]
    fn auth_debug_output_redacts_secrets() {
        let rendered = format!("{:?}", HttpAuth::BearerToken(String::from("token-123")));
        assert!(!rendered.contains("token-123"));
    }

    #[test]
    fn json_body_sets_content_type() {
        let request = HttpRequest::post("http://localhost:3000/api/x")
            .with_json(&serde_json::json!({ "listingId": "k1" }))
            .expect("json body");

        assert_eq!(
            request.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(request.body.as_deref(), Some(r#"{"listingId":"k1"}"#));
    }

    #[test]
    fn extracts_url_path() {
        assert_eq!(url_path("https://host:8080/api/a?b=c"), "/api/a");
        assert_eq!(url_path("http://host"), "/");
        assert_eq!(url_path("/api/listings/k1/recalculateScore"), "/api/listings/k1/recalculateScore");
    }

    #[tokio::test]
    async fn scripted_client_replays_queue_then_sticks_to_last_reply() {
        let client = ScriptedHttpClient::new();
        client
            .respond(HttpMethod::Post, "/api/a", HttpResponse::new(500, "{}"))
            .respond(HttpMethod::Post, "/api/a", HttpResponse::ok_json("{}"));

        let statuses = [
            client.execute(HttpRequest::post("http://h/api/a")).await,
            client.execute(HttpRequest::post("http://h/api/a")).await,
            client.execute(HttpRequest::post("http://h/api/a")).await,
        ]
        .map(|result| result.map(|response| response.status));

        assert_eq!(statuses, [Ok(500), Ok(200), Ok(200)]);
        assert_eq!(client.request_count("/api/a"), 3);
    }

    #[tokio::test]
    async fn scripted_client_answers_404_for_unknown_route() {
        let client = ScriptedHttpClient::new();
        let response = client
            .execute(HttpRequest::get("http://h/api/missing"))
            .await
            .expect("scripted client never fails unscripted routes");
        assert_eq!(response.status, 404);
    }

    #[test]
    fn reqwest_request_carries_envelope_fields() {
        let client = ReqwestHttpClient::new();
        let envelope = HttpRequest::post("https://api.example.test/api/listings/k1/recalculateScore")
            .with_auth(&HttpAuth::BearerToken(String::from("token-123")))
            .with_body("{}")
            .with_timeout_ms(1_500);

        let built = client.prepare(envelope).build().expect("valid request");

        assert_eq!(built.method(), &reqwest::Method::POST);
        assert_eq!(built.url().path(), "/api/listings/k1/recalculateScore");
        assert_eq!(built.timeout(), Some(&Duration::from_millis(1_500)));
        assert_eq!(
            built
                .headers()
                .get("authorization")
                .and_then(|value| value.to_str().ok()),
            Some("Bearer token-123")
        );
        assert_eq!(
            built.body().and_then(reqwest::Body::as_bytes),
            Some(&b"{}"[..])
        );
    }

    #[test]
    fn reqwest_get_has_no_body() {
        let built = ReqwestHttpClient::new()
            .prepare(HttpRequest::get("http://localhost:3000/api/seller/resync"))
            .build()
            .expect("valid request");

        assert_eq!(built.method(), &reqwest::Method::GET);
        assert!(built.body().is_none());
    }
}
