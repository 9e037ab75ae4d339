//! OAuth 2.0 `client_credentials` token exchange.
//!
//! Two flows are supported:
//! - shared secret: client id and secret sent as HTTP basic auth
//! - signed assertion: an RS384 JWT signed with the client's private key (RFC 7523), as used
//!   by Epic backend services

use super::token_cache::CachedToken;
use crate::config::{AuthMethod, SharedSecretGrant, SignedAssertionGrant};
use crate::constants::{
    ASSERTION_LIFETIME_MINUTES, DEFAULT_TOKEN_EXPIRY_SECS, JWT_BEARER_ASSERTION_TYPE,
};
use crate::{GatewayError, GatewayResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::Value;

/// Claims of the signed client assertion.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    aud: &'a str,
    iss: &'a str,
    sub: &'a str,
    jti: String,
    exp: i64,
}

/// Fetches access tokens from the configured token endpoint.
#[derive(Clone, Debug)]
pub struct CredentialExchange {
    client: reqwest::Client,
}

impl CredentialExchange {
    /// Create an exchange whose calls give up after `timeout`.
    pub fn new(timeout: std::time::Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build auth HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Obtain a fresh access token for `method`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Auth`] for methods without a token endpoint, signing failures, error
    ///   statuses and responses lacking `access_token`.
    /// - [`GatewayError::ServerUnavailable`] if the token endpoint cannot be reached in time.
    pub async fn fetch(&self, method: &AuthMethod) -> GatewayResult<CachedToken> {
        match method {
            AuthMethod::TokenBasic(grant) => self.fetch_shared_secret(grant).await,
            AuthMethod::TokenEpic(grant) => self.fetch_signed_assertion(grant).await,
            other => Err(GatewayError::Auth(format!(
                "unsupported auth method: {}",
                other.name()
            ))),
        }
    }

    async fn fetch_shared_secret(&self, grant: &SharedSecretGrant) -> GatewayResult<CachedToken> {
        let request = self
            .client
            .post(&grant.token_url)
            .basic_auth(&grant.client_id, Some(&grant.client_secret))
            .form(&[("grant_type", "client_credentials"), ("scope", "")]);

        self.exchange(&grant.token_url, request).await
    }

    async fn fetch_signed_assertion(
        &self,
        grant: &SignedAssertionGrant,
    ) -> GatewayResult<CachedToken> {
        let assertion = sign_assertion(grant)?;
        let request = self.client.post(&grant.token_url).form(&[
            ("grant_type", "client_credentials"),
            ("client_assertion_type", JWT_BEARER_ASSERTION_TYPE),
            ("client_assertion", assertion.as_str()),
        ]);

        self.exchange(&grant.token_url, request).await
    }

    async fn exchange(
        &self,
        token_url: &str,
        request: reqwest::RequestBuilder,
    ) -> GatewayResult<CachedToken> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(url = token_url, "token request failed: {e}");
            GatewayError::ServerUnavailable("could not connect to the auth server".into())
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::error!(url = token_url, "failed to read token response: {e}");
            GatewayError::ServerUnavailable("could not connect to the auth server".into())
        })?;

        if status.is_client_error() || status.is_server_error() {
            tracing::error!(url = token_url, status = status.as_u16(), body = %body, "token request rejected");
            return Err(GatewayError::Auth(format!(
                "token request failed with status {status}: {body}"
            )));
        }

        let json: Value = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(url = token_url, body = %body, "token response is not JSON");
            GatewayError::Auth(format!("token response is not JSON: {e}"))
        })?;

        token_from_response(&json)
    }
}

fn sign_assertion(grant: &SignedAssertionGrant) -> GatewayResult<String> {
    let key = EncodingKey::from_rsa_pem(&grant.private_key_pem)
        .map_err(|e| GatewayError::Auth(format!("invalid private key: {e}")))?;
    let claims = AssertionClaims {
        aud: &grant.token_url,
        iss: &grant.client_id,
        sub: &grant.client_id,
        jti: uuid::Uuid::new_v4().to_string(),
        exp: (Utc::now() + Duration::minutes(ASSERTION_LIFETIME_MINUTES)).timestamp(),
    };

    jsonwebtoken::encode(&Header::new(Algorithm::RS384), &claims, &key)
        .map_err(|e| GatewayError::Auth(format!("failed to sign client assertion: {e}")))
}

fn token_from_response(json: &Value) -> GatewayResult<CachedToken> {
    let value = json
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::Auth("token response has no access_token".into()))?;

    let expires_in = match json.get("expires_in") {
        Some(Value::Number(n)) => n.as_i64().or_else(|| whole_seconds(n.as_f64()?)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| whole_seconds(s.parse().ok()?))
        }
        _ => None,
    }
    .unwrap_or(DEFAULT_TOKEN_EXPIRY_SECS);

    let expiry = Duration::try_seconds(expires_in)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| {
            tracing::error!(expires_in, "token response has an unusable expires_in");
            GatewayError::Auth(format!("invalid expires_in: {expires_in}"))
        })?;

    Ok(CachedToken::new(value, expiry))
}

/// Truncate a fractional lifetime to whole seconds. Non-finite values are rejected and
/// out-of-range values saturate.
fn whole_seconds(secs: f64) -> Option<i64> {
    secs.is_finite().then(|| secs.trunc() as i64)
}
