use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, header::AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

use crate::{ApiConfig, FlowdeckError, Result};

/// Source of the bearer token attached to every request.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Option<String>;
}

/// Token fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token)
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Thin reqwest wrapper bound to one backend base url.
#[derive(Clone)]
pub struct ApiClient {
    pub(super) http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    tokens: Arc<dyn TokenProvider>,
}

impl ApiClient {
    pub fn new(
        config: &ApiConfig,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        // no client-wide timeout, it would cut long-lived event streams
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(
        &self,
        path: &str,
    ) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Current access token, or an auth error when the user is signed out.
    pub async fn token(&self) -> Result<String> {
        self.tokens.access_token().await.ok_or_else(|| FlowdeckError::Auth("No access token available".to_string()))
    }

    /// Authorized request with the default timeout.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
    ) -> Result<RequestBuilder> {
        Ok(self.request_untimed(method, path).await?.timeout(self.timeout))
    }

    /// Authorized request without a timeout, for event streams.
    pub async fn request_untimed(
        &self,
        method: Method,
        path: &str,
    ) -> Result<RequestBuilder> {
        let token = self.token().await?;
        trace!("api::request({} {})", method, path);
        Ok(self.http.request(method, self.url(path)).header(AUTHORIZATION, format!("Bearer {}", token)))
    }

    /// Sends the request and fails on any non-success status.
    pub async fn send(
        &self,
        request: RequestBuilder,
    ) -> Result<Response> {
        let response = request.send().await?;
        check(response).await
    }

    /// Sends the request and decodes the JSON body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = self.send(request).await?;
        Ok(response.json::<T>().await?)
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), url = %url, "request failed");
    Err(classify_status(status.as_u16(), &body))
}

/// Maps a failed response to an error category.
///
/// The message prefers the server's `detail.message`, `detail`, `message` or
/// `error` field and falls back to a default for the status bucket.
pub fn classify_status(
    status: u16,
    body: &str,
) -> FlowdeckError {
    let json: Option<Value> = serde_json::from_str(body).ok();
    let detail = json.as_ref().and_then(|v| v.get("detail")).cloned();
    let message = server_message(json.as_ref()).unwrap_or_else(|| status_message(status).to_string());

    match status {
        402 => FlowdeckError::Billing {
            message,
            detail,
        },
        401 | 403 => FlowdeckError::Auth(message),
        404 => FlowdeckError::NotFound(message),
        _ => FlowdeckError::Http {
            status,
            message,
        },
    }
}

fn server_message(json: Option<&Value>) -> Option<String> {
    let json = json?;
    if let Some(detail) = json.get("detail") {
        if let Some(message) = detail.get("message").and_then(Value::as_str) {
            return Some(message.to_string());
        }
        if let Some(message) = detail.as_str() {
            return Some(message.to_string());
        }
    }
    ["message", "error"].iter().find_map(|key| json.get(*key).and_then(Value::as_str)).map(str::to_string)
}

/// Default user-facing message for a status code.
pub fn status_message(status: u16) -> &'static str {
    match status {
        400 => "The request was invalid. Please check your input and try again.",
        401 => "Your session has expired. Please sign in again.",
        402 => "Your plan limit has been reached. Please upgrade to continue.",
        403 => "You do not have permission to perform this action.",
        404 => "The requested resource could not be found.",
        408 => "The request timed out. Please try again.",
        409 => "This resource was changed by someone else. Please refresh and try again.",
        422 => "Some of the submitted data is invalid.",
        429 => "Too many requests. Please wait a moment and try again.",
        400..=499 => "The request could not be completed. Please check your input.",
        500..=599 => "Something went wrong on our side. Our team has been notified.",
        _ => "An unexpected error occurred.",
    }
}
