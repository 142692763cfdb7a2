//! API client for communicating with the SwingLens REST API.
//!
//! Every request reads the current credential from the shared [`TokenStore`]
//! and sends it as a bearer token. Any 401 response clears the store before
//! the error reaches the caller, which is how an expired session logs the
//! user out.

use std::time::Duration;

use reqwest::{header, Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::auth::TokenStore;
use crate::models::{
    CoachLoginRequest, CoachLoginResponse, HealthStatus, OtpSendRequest, OtpSendResponse,
    OtpVerifyRequest, PlayerOtpVerifyResponse, ReviewQueueItem,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

pub const COACH_LOGIN_PATH: &str = "/api/v1/auth/coach/login";
pub const PLAYER_OTP_SEND_PATH: &str = "/api/v1/auth/player/otp/send";
pub const PLAYER_OTP_VERIFY_PATH: &str = "/api/v1/auth/player/otp/verify";
pub const COACH_QUEUE_PATH: &str = "/api/v1/coach/queue";
pub const HEALTH_PATH: &str = "/api/v1/health";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Accepts both `{ "data": T }` and a bare `T`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(value) => value,
        }
    }
}

/// API client for SwingLens.
/// Clone is cheap - reqwest::Client and TokenStore are both Arc-backed.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: TokenStore,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a client for `base_url` that authenticates from `store`.
    pub fn new(base_url: impl Into<String>, store: TokenStore) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first rate-limit backoff delay (doubles on each retry).
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Headers for the next request, built from the store's current credential.
    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(credential) = self.store.credential() {
            let mut value =
                header::HeaderValue::from_str(&format!("Bearer {}", credential.as_str()))
                    .map_err(|_| ApiError::InvalidCredential)?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Send a request, retrying on 429 with exponential backoff.
    ///
    /// A 401 clears the token store exactly once and is returned as
    /// [`ApiError::Unauthorized`] without retrying.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let headers = self.auth_headers()?;
            let authenticated = headers.contains_key(header::AUTHORIZATION);
            debug!(%method, path, authenticated, "Sending request");

            let mut request = self.client.request(method.clone(), &url).headers(headers);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(path, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }

            return self.check_response(path, response).await;
        }
    }

    /// Check if response is successful, returning a structured error if not.
    async fn check_response(&self, path: &str, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(path, %status, body = %ApiError::truncate_body(&body), "Request failed");

        if status == StatusCode::UNAUTHORIZED {
            warn!(path, "Server rejected credentials, clearing session");
            if let Err(e) = self.store.clear().await {
                error!(error = %e, "Failed to clear session after 401");
            }
        }

        Err(ApiError::from_status(status, &body))
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        match serde_json::from_str::<Envelope<T>>(&text) {
            Ok(envelope) => Ok(envelope.into_inner()),
            Err(_) => {
                // Re-parse as the bare type for a useful error message
                let err = serde_json::from_str::<T>(&text)
                    .err()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unexpected response shape".to_string());
                Err(ApiError::InvalidResponse(format!("{}: {}", path, err)))
            }
        }
    }

    /// GET `path` and decode the payload.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(Method::GET, path, None).await?;
        Self::decode(path, response).await
    }

    /// POST `body` as JSON to `path` and decode the payload.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("unserializable request body: {}", e)))?;
        let response = self.execute(Method::POST, path, Some(&body)).await?;
        Self::decode(path, response).await
    }

    // ===== Endpoints =====

    /// Exchange coach email and password for a session token.
    pub async fn coach_login(
        &self,
        request: &CoachLoginRequest,
    ) -> Result<CoachLoginResponse, ApiError> {
        self.post(COACH_LOGIN_PATH, request).await
    }

    /// Ask the backend to text a one-time code to `phone`.
    pub async fn player_send_otp(&self, phone: &str) -> Result<OtpSendResponse, ApiError> {
        let request = OtpSendRequest {
            phone: phone.to_string(),
        };
        self.post(PLAYER_OTP_SEND_PATH, &request).await
    }

    /// Exchange a phone number and one-time code for a session token.
    pub async fn player_verify_otp(
        &self,
        request: &OtpVerifyRequest,
    ) -> Result<PlayerOtpVerifyResponse, ApiError> {
        self.post(PLAYER_OTP_VERIFY_PATH, request).await
    }

    /// Swings waiting for the signed-in coach's review.
    pub async fn review_queue(&self) -> Result<Vec<ReviewQueueItem>, ApiError> {
        self.get(COACH_QUEUE_PATH).await
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.get(HEALTH_PATH).await
    }
}
