//! API gateway client.
//!
//! Every HTTP call to the BJDMS API goes through [`ApiClient::request`], which
//! attaches the bearer token, enforces the timeout, honours cancellation and
//! applies the 401 policy. Typed endpoint wrappers live in the submodules.

mod activities;
mod analytics;
mod auth;
mod finance;
mod join_requests;
mod notifications;
mod org;
mod search;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::errors::{ClientError, ClientResult};

/// Header carrying the per-call correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Raw outcome of a single HTTP exchange, before the 401 policy is applied.
pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
    /// Token that was attached to the request, if any
    pub token: Option<String>,
}

/// Gateway for all REST calls.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<Config>,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(config: Arc<Config>, session: Arc<SessionStore>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            session,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Perform one call and return the parsed JSON body.
    ///
    /// Resolves to `Ok(None)` when the server answers 401: the session has
    /// already been dropped and subscribers told to send the user to login.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> ClientResult<Option<Value>> {
        self.request_with_cancel(method, endpoint, body, &CancellationToken::new())
            .await
    }

    /// Like [`request`](Self::request), abandoning the call when `cancel` fires.
    pub async fn request_with_cancel(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        cancel: &CancellationToken,
    ) -> ClientResult<Option<Value>> {
        let raw = self.send_raw(method, endpoint, body, cancel).await?;

        if raw.status == StatusCode::UNAUTHORIZED {
            self.session.expire(raw.token.as_deref()).await;
            return Ok(None);
        }

        ensure_success(raw.status)?;
        parse_json_body(&raw.body).map(Some)
    }

    /// GET an enveloped endpoint and decode its `data`.
    pub(crate) async fn get_data<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
    ) -> ClientResult<Option<T>> {
        match self
            .request_with_cancel(Method::GET, endpoint, None, cancel)
            .await?
        {
            Some(value) => decode_data(value).map(Some),
            None => Ok(None),
        }
    }

    /// GET an enveloped list endpoint; a null or missing `data` is an empty list.
    pub(crate) async fn get_list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
    ) -> ClientResult<Option<Vec<T>>> {
        match self
            .request_with_cancel(Method::GET, endpoint, None, cancel)
            .await?
        {
            Some(value) => decode_list(value).map(Some),
            None => Ok(None),
        }
    }

    /// Send a body to an enveloped endpoint and decode its `data`.
    pub(crate) async fn send_data<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> ClientResult<Option<T>> {
        match self.request(method, endpoint, body).await? {
            Some(value) => decode_data(value).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) async fn send_raw(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        cancel: &CancellationToken,
    ) -> ClientResult<RawResponse> {
        let url = self.config.endpoint_url(endpoint)?;
        let token = self.session.token();
        let request_id = Uuid::new_v4();

        let mut builder = self
            .http
            .request(method.clone(), url)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(token) = &token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        tracing::debug!(%request_id, %method, endpoint, "API request");

        let timeout = self.config.request_timeout;
        let exchange = async {
            let response = builder
                .send()
                .await
                .map_err(|e| transport_error(e, timeout))?;
            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| transport_error(e, timeout))?;
            Ok::<_, ClientError>((status, body.to_vec()))
        };

        let (status, body) = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(%request_id, endpoint, "API request cancelled");
                return Err(ClientError::Cancelled);
            }
            result = exchange => result?,
        };

        if status.is_success() {
            tracing::debug!(%request_id, status = status.as_u16(), endpoint, "API response");
        } else {
            tracing::warn!(%request_id, status = status.as_u16(), endpoint, "API request failed");
        }

        Ok(RawResponse {
            status,
            body,
            token,
        })
    }
}

fn ensure_success(status: StatusCode) -> ClientResult<()> {
    if status.is_success() {
        return Ok(());
    }
    Err(ClientError::Api {
        status_code: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
    })
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> ClientError {
    if err.is_timeout() {
        tracing::warn!("API request timed out after {:?}", timeout);
        ClientError::Timeout(timeout)
    } else {
        ClientError::from(err)
    }
}

/// Extract `data` from a `{ success, data, message }` envelope. Bare payloads
/// (no envelope) are decoded as-is.
pub fn decode_data<T: DeserializeOwned>(value: Value) -> ClientResult<T> {
    let data = unwrap_envelope(value);
    serde_json::from_value(data).map_err(ClientError::from)
}

/// Like [`decode_data`] but treats a null payload as an empty list.
pub fn decode_list<T: DeserializeOwned>(value: Value) -> ClientResult<Vec<T>> {
    match unwrap_envelope(value) {
        Value::Null => Ok(Vec::new()),
        data => serde_json::from_value(data).map_err(ClientError::from),
    }
}

fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("success") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Append query parameters, skipping absent ones.
pub(crate) fn with_query(path: &str, params: &[(&str, Option<&str>)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in params {
        if let Some(value) = value {
            serializer.append_pair(key, value);
            any = true;
        }
    }
    if any {
        format!("{}?{}", path, serializer.finish())
    } else {
        path.to_string()
    }
}

/// Escape a path segment such as an id.
pub(crate) fn segment(raw: &str) -> String {
    // byte_serialize only emits '+' for spaces; '+' itself becomes %2B.
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Parse a 2xx body. An empty body (204) is `null`.
fn parse_json_body(body: &[u8]) -> ClientResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| {
        ClientError::MalformedResponse(format!("Response body is not valid JSON: {}", e))
    })
}
