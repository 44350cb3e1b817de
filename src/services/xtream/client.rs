//! Xtream Codes API Client
//!
//! HTTP client for the Xtream Codes Player API v2 endpoints used by sync:
//! authentication, category lists and the three stream collections.

use super::types::*;
use crate::services::parser::{fragment, XtreamKind};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Xtream API Client
pub struct XtreamClient {
    http: Client,
    base_url: String,
    user_agent: String,
}

impl XtreamClient {
    /// Create a client over a shared HTTP connection pool
    pub fn new(http: Client, creds: &XtreamCredentials, user_agent: &str) -> Self {
        Self {
            http,
            base_url: creds.api_url(),
            user_agent: user_agent.to_string(),
        }
    }

    /// GET player_api.php with an optional action, returning the raw body
    async fn get_text(&self, action: &str) -> Result<String, XtreamError> {
        let url = if action.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}&action={}", self.base_url, action)
        };

        debug!("Xtream API request: {}", if action.is_empty() { "auth" } else { action });

        let response = self
            .http
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(XtreamError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(XtreamError::Http(status.as_u16()));
        }

        response.text().await.map_err(XtreamError::from_reqwest)
    }

    fn decode<T: DeserializeOwned>(action: &str, text: &str) -> Result<T, XtreamError> {
        serde_json::from_str(text).map_err(|e| {
            error!(
                "Failed to parse Xtream response for action '{}': {}",
                action, e
            );
            debug!("Response text: {}", fragment(text));
            XtreamError::Parse {
                action: action.to_string(),
                message: e.to_string(),
                fragment: fragment(text),
            }
        })
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Get authentication info and require an active account
    pub async fn get_auth(&self) -> Result<XtreamAuthResponse, XtreamError> {
        let text = self.get_text("").await?;
        let trimmed = text.trim();

        if trimmed.is_empty() || trimmed == "null" {
            return Err(XtreamError::EmptyResponse);
        }

        // Some servers return HTML error pages instead of JSON
        if trimmed.starts_with('<') {
            return Err(XtreamError::Auth(
                "server returned HTML instead of JSON, likely invalid credentials".to_string(),
            ));
        }

        let auth: XtreamAuthResponse = Self::decode("auth", trimmed)?;

        if !auth.user_info.is_active() {
            return Err(XtreamError::Auth(format!(
                "account not active, status: {}",
                auth.user_info.status
            )));
        }

        Ok(auth)
    }

    // ========================================================================
    // Categories & Streams
    // ========================================================================

    /// Categories for one kind. Malformed elements are skipped.
    pub async fn get_categories(&self, kind: XtreamKind) -> Result<Vec<XtreamCategory>, XtreamError> {
        let action = kind.categories_action();
        let elements = self.get_collection(action).await?;

        let total = elements.len();
        let categories: Vec<XtreamCategory> = elements
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        if categories.len() < total {
            warn!(
                action,
                skipped = total - categories.len(),
                "Skipped malformed Xtream categories"
            );
        }

        Ok(categories)
    }

    /// Raw elements of one stream collection, mapped later one by one
    pub async fn get_streams(&self, kind: XtreamKind) -> Result<Vec<Value>, XtreamError> {
        self.get_collection(kind.streams_action()).await
    }

    /// Fetch a JSON array. Empty bodies, `null` and `{}` mean no results.
    async fn get_collection(&self, action: &str) -> Result<Vec<Value>, XtreamError> {
        let text = self.get_text(action).await?;
        let trimmed = text.trim();

        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Vec::new());
        }

        match Self::decode::<Value>(action, trimmed)? {
            Value::Array(elements) => Ok(elements),
            Value::Object(map) if map.is_empty() => Ok(Vec::new()),
            _ => Err(XtreamError::Parse {
                action: action.to_string(),
                message: "expected a JSON array".to_string(),
                fragment: fragment(trimmed),
            }),
        }
    }
}

/// Xtream API Error types
#[derive(Debug, Error)]
pub enum XtreamError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("invalid JSON for '{action}': {message} (near: {fragment})")]
    Parse {
        action: String,
        message: String,
        fragment: String,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("empty response")]
    EmptyResponse,
}

impl XtreamError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            XtreamError::Timeout
        } else if e.is_connect() {
            XtreamError::Connect(e.to_string())
        } else {
            XtreamError::Request(e.to_string())
        }
    }
}
