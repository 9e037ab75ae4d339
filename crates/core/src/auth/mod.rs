//! Authentication of outbound FHIR calls.
//!
//! [`Authenticator`] attaches credentials to a request according to the configured
//! [`AuthMethod`]. Token methods go through a [`TokenCache`] backed by a
//! [`CredentialExchange`], so the token endpoint is only called when the cached token has
//! expired.

pub mod exchange;
pub mod token_cache;

pub use exchange::CredentialExchange;
pub use token_cache::{CachedToken, TokenCache};

use crate::config::AuthMethod;
use crate::GatewayResult;

/// Per-method auth attachment for outbound requests.
#[derive(Debug)]
pub struct Authenticator {
    method: AuthMethod,
    cache: TokenCache,
    exchange: CredentialExchange,
}

impl Authenticator {
    pub fn new(method: AuthMethod, exchange: CredentialExchange) -> Self {
        Self {
            method,
            cache: TokenCache::new(),
            exchange,
        }
    }

    pub fn method(&self) -> &AuthMethod {
        &self.method
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Current access token, refreshed through the exchange when due.
    pub async fn get_token(&self) -> GatewayResult<String> {
        self.cache
            .get_token(|| self.exchange.fetch(&self.method))
            .await
    }

    /// Attach credentials to `request`.
    ///
    /// # Errors
    ///
    /// Token methods propagate token exchange failures unchanged.
    pub async fn authorise(
        &self,
        request: reqwest::RequestBuilder,
    ) -> GatewayResult<reqwest::RequestBuilder> {
        match &self.method {
            AuthMethod::None => Ok(request),
            AuthMethod::Basic(credentials) => Ok(request.basic_auth(
                &credentials.client_id,
                Some(&credentials.client_secret),
            )),
            AuthMethod::TokenBasic(_) | AuthMethod::TokenEpic(_) => {
                let token = self.get_token().await?;
                Ok(request.bearer_auth(token))
            }
        }
    }
}
