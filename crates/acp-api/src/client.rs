//! One authenticated JSON call against the management service.

use std::time::Duration;

use acp_config::{ApiSettings, ApiToken};
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::retry::RetryPolicy;

const TOKEN_HEADER: &str = "x-api-token";

/// Longest slice of a non-JSON error body carried into an error message.
const BODY_SNIPPET_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Upper bound for one request/response round trip.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Authenticated JSON client. Cheap to clone; clones share the connection pool.
///
/// The token is attached to every request and never logged.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: ApiToken,
    retry: RetryPolicy,
}

impl ApiClient {
    /// Client for `https://<api.host>/<api.version>`.
    pub fn new(api: &ApiSettings, token: ApiToken, opts: ClientOptions) -> Result<Self, ApiError> {
        Self::new_with_base_url(api.base_url(), token, opts)
    }

    pub fn new_with_base_url(
        base_url: impl Into<String>,
        token: ApiToken,
        opts: ClientOptions,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(opts.call_timeout)
            .build()
            .map_err(|e| ApiError::Transport {
                message: format!("http client build failed: {e}"),
                connect: false,
            })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            retry: opts.retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.call::<T, ()>(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.call(Method::POST, path, Some(body)).await
    }

    /// Perform `method` on `<base_url><path>` and decode the success payload.
    ///
    /// The body is serialized once up front; `Content-Length` is the byte
    /// length of that encoding. Retryable failures are retried per the
    /// client's [`RetryPolicy`]; non-GET calls only when a resend cannot
    /// duplicate the effect.
    pub async fn call<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let payload = match body {
            Some(b) => Some(serde_json::to_vec(b).map_err(|e| ApiError::Encode(e.to_string()))?),
            None => None,
        };

        let mut attempt: u32 = 1;
        let value = loop {
            match self.send_once(&method, path, payload.as_deref()).await {
                Ok(v) => break v,
                Err(err) => {
                    let resend_ok = method == Method::GET || err.is_safe_to_resend();
                    if !(err.is_retryable() && resend_ok && self.retry.allows_another(attempt)) {
                        return Err(err);
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        method = %method,
                        path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "api call failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        };

        serde_json::from_value(value).map_err(|e| ApiError::Decode(format!("{method} {path}: {e}")))
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        payload: Option<&[u8]>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .http
            .request(method.clone(), url)
            .header(TOKEN_HEADER, self.token.expose())
            .header(ACCEPT, "application/json");

        if let Some(bytes) = payload {
            req = req
                .header(CONTENT_TYPE, "application/json")
                .header(CONTENT_LENGTH, bytes.len())
                .body(bytes.to_vec());
        }

        let resp = req.send().await.map_err(ApiError::from_reqwest)?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await.map_err(ApiError::from_reqwest)?;

        debug!(method = %method, path, status, bytes = bytes.len(), "api call");
        classify_body(status, &bytes)
    }
}

/// Classify a complete response.
///
/// 1. A JSON object carrying both `code` and `message` is a service failure,
///    whatever the HTTP status says.
/// 2. A body that is not JSON is a transport failure, whatever the status.
///    The status is kept so gateway pages stay retryable.
/// 3. Any other non-2xx status is a service failure keyed by the status.
/// 4. Otherwise the parsed JSON is the success payload.
pub fn classify_body(status: u16, body: &[u8]) -> Result<Value, ApiError> {
    let success = (200..300).contains(&status);

    let value: Value = serde_json::from_slice(body).map_err(|e| ApiError::InvalidJson {
        status,
        message: format!("{e}; body: {}", snippet(&String::from_utf8_lossy(body))),
    })?;

    if let Some(obj) = value.as_object() {
        if let (Some(code), Some(message)) = (obj.get("code"), obj.get("message")) {
            return Err(ApiError::Service {
                status,
                code: render(code),
                message: render(message),
            });
        }
    }

    if !success {
        return Err(ApiError::Service {
            status,
            code: status.to_string(),
            message: snippet(&value.to_string()),
        });
    }

    Ok(value)
}

fn render(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn snippet(s: &str) -> String {
    s.chars().take(BODY_SNIPPET_LEN).collect()
}
