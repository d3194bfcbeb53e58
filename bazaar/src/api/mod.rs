//! Request/response client for the storefront data service.
//!
//! Thin JSON-over-HTTP glue: products, cart, purchases, account verification.
//! Every request carries the ambient session cookie; a 401 surfaces as
//! [`ApiError::Unauthorized`] so the host application can route to its login
//! flow. Business logic lives entirely on the backend.

mod cart;
mod products;
mod purchases;
mod users;

pub use products::ProductImage;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::Config;

const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The session cookie is missing or expired. Hosts redirect to login.
    #[error("session expired or not logged in")]
    Unauthorized,
    #[error("data service returned {status}: {}", message.as_deref().unwrap_or("no detail"))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not build request URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("session cookie contains characters that cannot be sent in a header")]
    InvalidCookie,
    #[error("invalid input: {0}")]
    Invalid(String),
}

/// HTTP client for the data service, authenticated by the session cookie.
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if !config.session_cookie.is_empty() {
            let value = HeaderValue::from_str(&config.session_cookie)
                .map_err(|_| ApiError::InvalidCookie)?;
            headers.insert(COOKIE, value);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base: config.api_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoint(path)?;
        check(self.http.get(url).send().await?).await
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoint(path)?;
        check(self.http.post(url).json(body).send().await?).await
    }

    async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoint(path)?;
        check(self.http.post(url).multipart(form).send().await?).await
    }
}

/// Map non-success statuses to the error taxonomy, keeping the backend's
/// `message` when its error body has one.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        let message = response
            .json::<MessageEnvelope>()
            .await
            .ok()
            .and_then(|body| body.message);
        return Err(ApiError::Status { status, message });
    }
    Ok(response)
}

/// The backend wraps confirmations as `{"message": "..."}`.
#[derive(Debug, Deserialize)]
struct MessageEnvelope {
    #[serde(default)]
    message: Option<String>,
}

/// Extract the confirmation message of a mutation response.
async fn confirmation(response: reqwest::Response) -> Result<String, ApiError> {
    let body: MessageEnvelope = response.json().await?;
    Ok(body.message.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_envelope_parses_with_and_without_message() {
        let body: MessageEnvelope =
            serde_json::from_str(r#"{"message": "Product created successfully"}"#).unwrap();
        assert_eq!(body.message.as_deref(), Some("Product created successfully"));

        let body: MessageEnvelope = serde_json::from_str(r#"{}"#).unwrap();
        assert!(body.message.is_none());
    }

    #[test]
    fn test_error_display_includes_backend_detail() {
        let error = ApiError::Status {
            status: StatusCode::CONFLICT,
            message: Some("Product already in cart".to_string()),
        };
        assert!(error.to_string().contains("Product already in cart"));

        let bare = ApiError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: None,
        };
        assert!(bare.to_string().contains("no detail"));
    }
}
