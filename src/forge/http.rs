//! forge::http
//!
//! REST transport shared by the adapters.
//!
//! # Design
//!
//! [`RestClient`] wraps a `reqwest::Client` with the platform's default
//! headers already installed. Requests return [`ApiFailure`], a transport
//! level error that keeps the HTTP status. Adapters convert it into a
//! [`ForgeError`] at the operation boundary, where the right not-found
//! policy and context message are known.
//!
//! Paths are built from segments so that identifiers containing `/`
//! (GitLab's `group/project`) are percent-encoded as a single segment.

use std::fmt;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use super::traits::ForgeError;

/// Largest page size either platform accepts.
pub(crate) const MAX_PER_PAGE: usize = 100;

/// Failure of a single REST call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ApiFailure {
    /// The platform answered with a non-success status.
    Status { status: u16, message: String },
    /// The request never produced a response.
    Transport(String),
    /// The response body was not what we expected.
    Decode(String),
}

impl ApiFailure {
    pub(crate) fn is_not_found(&self) -> bool {
        matches!(self, ApiFailure::Status { status: 404, .. })
    }

    /// Convert into the public error type.
    ///
    /// `context` describes the operation, e.g. "Failed to get issue 5".
    pub(crate) fn into_forge(self, platform: &str, context: &str) -> ForgeError {
        match self {
            ApiFailure::Status { status: 401, message } => {
                ForgeError::Authentication(format!("{}: {}", context, message))
            }
            ApiFailure::Status { status, message } => ForgeError::Platform {
                message: format!("{}: {}", context, message),
                platform: platform.to_string(),
                status: Some(status),
            },
            ApiFailure::Transport(message) => {
                ForgeError::Network(format!("{}: {}", context, message))
            }
            ApiFailure::Decode(message) => ForgeError::Platform {
                message: format!("{}: failed to parse response: {}", context, message),
                platform: platform.to_string(),
                status: None,
            },
        }
    }

    /// Like [`into_forge`](Self::into_forge), but a 404 becomes
    /// [`ForgeError::ResourceNotFound`].
    pub(crate) fn into_forge_or_not_found(
        self,
        platform: &str,
        resource_type: &str,
        resource_id: &str,
        context: &str,
    ) -> ForgeError {
        if self.is_not_found() {
            ForgeError::not_found(resource_type, resource_id, platform)
        } else {
            self.into_forge(platform, context)
        }
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiFailure::Status { status, message } => write!(f, "HTTP {}: {}", status, message),
            ApiFailure::Transport(message) => write!(f, "transport error: {}", message),
            ApiFailure::Decode(message) => write!(f, "decode error: {}", message),
        }
    }
}

/// Attach operation context to a REST result.
pub(crate) trait ApiResultExt<T> {
    fn or_forge<C>(self, platform: &str, context: C) -> Result<T, ForgeError>
    where
        C: FnOnce() -> String;

    /// As [`or_forge`](Self::or_forge), with 404 reported as
    /// [`ForgeError::ResourceNotFound`].
    fn or_not_found<C>(
        self,
        platform: &str,
        resource_type: &str,
        resource_id: &str,
        context: C,
    ) -> Result<T, ForgeError>
    where
        C: FnOnce() -> String;
}

impl<T> ApiResultExt<T> for Result<T, ApiFailure> {
    fn or_forge<C>(self, platform: &str, context: C) -> Result<T, ForgeError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|e| e.into_forge(platform, &context()))
    }

    fn or_not_found<C>(
        self,
        platform: &str,
        resource_type: &str,
        resource_id: &str,
        context: C,
    ) -> Result<T, ForgeError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|e| e.into_forge_or_not_found(platform, resource_type, resource_id, &context()))
    }
}

/// Map a lookup result so that 404 becomes `Ok(None)`.
pub(crate) fn optional<T>(result: Result<T, ApiFailure>) -> Result<Option<T>, ApiFailure> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// A decoded payload together with the raw JSON it came from.
///
/// The raw value becomes the resource's `metadata`.
#[derive(Debug, Clone)]
pub(crate) struct Raw<T> {
    pub(crate) wire: T,
    pub(crate) raw: Value,
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Raw<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let wire = T::deserialize(&raw).map_err(serde::de::Error::custom)?;
        Ok(Raw { wire, raw })
    }
}

/// Authenticated JSON client for one platform instance.
#[derive(Clone)]
pub(crate) struct RestClient {
    client: Client,
    api_base: Url,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("api_base", &self.api_base.as_str())
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Build a client that sends `headers` with every request.
    pub(crate) fn new(
        api_base: &str,
        headers: HeaderMap,
        timeout: Option<Duration>,
    ) -> Result<Self, ApiFailure> {
        let api_base = Url::parse(api_base)
            .map_err(|e| ApiFailure::Transport(format!("invalid API URL '{}': {}", api_base, e)))?;

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiFailure::Transport(e.to_string()))?;

        Ok(Self { client, api_base })
    }

    /// Build an endpoint URL by appending path segments to the API base.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url, ApiFailure> {
        let mut url = self.api_base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                ApiFailure::Transport(format!("API URL cannot be a base: {}", self.api_base))
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, ApiFailure> {
        let request = self.client.get(url.clone()).query(query);
        let response = send(request, &Method::GET, &url).await?;
        decode(response).await
    }

    pub(crate) async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, ApiFailure> {
        self.send_json(Method::POST, url, body).await
    }

    pub(crate) async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, ApiFailure> {
        self.send_json(Method::PUT, url, body).await
    }

    pub(crate) async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, ApiFailure> {
        self.send_json(Method::PATCH, url, body).await
    }

    /// DELETE, ignoring any response body.
    pub(crate) async fn delete(&self, url: Url) -> Result<(), ApiFailure> {
        let request = self.client.delete(url.clone());
        send(request, &Method::DELETE, &url).await?;
        Ok(())
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<T, ApiFailure> {
        let request = self.client.request(method.clone(), url.clone()).json(body);
        let response = send(request, &method, &url).await?;
        decode(response).await
    }

    /// Fetch pages of a list endpoint until `limit` items are collected or
    /// a short page signals the end.
    pub(crate) async fn paginate<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
        limit: Option<usize>,
    ) -> Result<Vec<T>, ApiFailure> {
        self.paginate_where(url, query, limit, |page: Vec<T>| page, |_| true)
            .await
    }

    /// Like [`paginate`](Self::paginate) for endpoints that wrap each page
    /// in an envelope; `unwrap` extracts the items.
    pub(crate) async fn paginate_by<P, T, F>(
        &self,
        url: Url,
        query: &[(&str, String)],
        limit: Option<usize>,
        unwrap: F,
    ) -> Result<Vec<T>, ApiFailure>
    where
        P: DeserializeOwned,
        F: Fn(P) -> Vec<T>,
    {
        self.paginate_where(url, query, limit, unwrap, |_| true).await
    }

    /// General pagination: `unwrap` turns a page into items and `keep`
    /// drops items client-side. `limit` counts kept items only; the end of
    /// the listing is detected from the unfiltered page size.
    pub(crate) async fn paginate_where<P, T, F, K>(
        &self,
        url: Url,
        query: &[(&str, String)],
        limit: Option<usize>,
        unwrap: F,
        keep: K,
    ) -> Result<Vec<T>, ApiFailure>
    where
        P: DeserializeOwned,
        F: Fn(P) -> Vec<T>,
        K: Fn(&T) -> bool,
    {
        let per_page = limit.map_or(MAX_PER_PAGE, |l| l.clamp(1, MAX_PER_PAGE));
        let mut items: Vec<T> = Vec::new();
        let mut page: usize = 1;

        loop {
            let mut page_query = query.to_vec();
            page_query.push(("per_page", per_page.to_string()));
            page_query.push(("page", page.to_string()));

            let batch = unwrap(self.get::<P>(url.clone(), &page_query).await?);
            let count = batch.len();
            items.extend(batch.into_iter().filter(|item| keep(item)));

            if let Some(limit) = limit {
                if items.len() >= limit {
                    items.truncate(limit);
                    break;
                }
            }
            if count < per_page {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

async fn send(request: RequestBuilder, method: &Method, url: &Url) -> Result<Response, ApiFailure> {
    debug!(%method, path = url.path(), "sending request");

    let response = request
        .send()
        .await
        .map_err(|e| ApiFailure::Transport(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        debug!(%method, path = url.path(), status = status.as_u16(), "request failed");
        Err(error_from_response(response, status).await)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiFailure> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiFailure::Transport(e.to_string()))?;
    // 204 and friends: decode as JSON null so `()` and `Value` targets work
    let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
    serde_json::from_slice(body).map_err(|e| ApiFailure::Decode(e.to_string()))
}

async fn error_from_response(response: Response, status: StatusCode) -> ApiFailure {
    let text = response.text().await.unwrap_or_default();
    ApiFailure::Status {
        status: status.as_u16(),
        message: error_message(&text, status),
    }
}

/// Extract a human-readable message from an error body.
///
/// GitHub sends `{"message": "..."}`; GitLab sends `message` as a string,
/// list or field map, or `error` / `error_description` for OAuth failures.
fn error_message(body: &str, status: StatusCode) -> String {
    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    };

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        let trimmed = body.trim();
        return if trimmed.is_empty() || trimmed.len() > 200 {
            fallback()
        } else {
            trimmed.to_string()
        };
    };

    for key in ["message", "error_description", "error"] {
        match value.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Null) | None => continue,
            Some(other) => return other.to_string(),
        }
    }
    fallback()
}
