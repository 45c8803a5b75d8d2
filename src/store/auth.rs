//! Anonymous sign-in against the hosted identity service.
//!
//! The database rules only require *some* signed-in user, so the service
//! signs up anonymously once and then keeps the id token fresh with the
//! refresh token.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;

use super::StoreError;

// ---

const SIGN_UP_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:signUp";
const REFRESH_URL: &str = "https://securetoken.googleapis.com/v1/token";

/// Renew this long before the token actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug)]
struct Token {
    id_token: String,
    refresh_token: String,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct AnonymousAuth {
    client: reqwest::Client,
    api_key: String,
    token: Mutex<Option<Token>>,
}

impl AnonymousAuth {
    // ---
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            token: Mutex::new(None),
        }
    }

    /// A valid id token, signing in or refreshing as needed.
    pub async fn id_token(&self) -> Result<String, StoreError> {
        // ---
        let mut guard = self.token.lock().await;

        let renewed = match guard.take() {
            Some(token) if token.expires_at > Instant::now() => token,
            Some(token) => {
                tracing::debug!("Refreshing anonymous id token");
                self.refresh(&token.refresh_token).await?
            }
            None => {
                tracing::info!("Signing in anonymously");
                self.sign_up().await?
            }
        };

        let id_token = renewed.id_token.clone();
        *guard = Some(renewed);
        Ok(id_token)
    }

    /// Drop the cached token so the next call refreshes it.
    pub async fn invalidate(&self) {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_mut() {
            token.expires_at = Instant::now();
        }
    }

    async fn sign_up(&self) -> Result<Token, StoreError> {
        // ---
        let response = self
            .client
            .post(SIGN_UP_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "returnSecureToken": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!("sign-up returned {}: {}", status, body)));
        }

        let body: SignUpResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Auth(format!("bad sign-up response: {}", e)))?;

        Ok(Token {
            expires_at: expiry(&body.expires_in),
            id_token: body.id_token,
            refresh_token: body.refresh_token,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Token, StoreError> {
        // ---
        let response = self
            .client
            .post(REFRESH_URL)
            .query(&[("key", self.api_key.as_str())])
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!("token refresh returned {}: {}", status, body)));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Auth(format!("bad refresh response: {}", e)))?;

        Ok(Token {
            expires_at: expiry(&body.expires_in),
            id_token: body.id_token,
            refresh_token: body.refresh_token,
        })
    }
}

/// Deadline for a token valid for `expires_in` seconds (sent as a string).
fn expiry(expires_in: &str) -> Instant {
    // ---
    let seconds = expires_in.trim().parse::<u64>().unwrap_or(3600);
    Instant::now() + Duration::from_secs(seconds).saturating_sub(EXPIRY_MARGIN)
}
