//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::constants::{
    DEFAULT_AUTH_TIMEOUT_SECS, DEFAULT_MRN_SYSTEM, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::{GatewayError, GatewayResult};
use base64::{engine::general_purpose, Engine as _};
use std::fmt;
use std::time::Duration;

/// Client id and secret sent as HTTP basic credentials.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// `client_credentials` grant authenticated with a shared secret.
#[derive(Clone)]
pub struct SharedSecretGrant {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

/// `client_credentials` grant authenticated with an RS384-signed client assertion.
#[derive(Clone)]
pub struct SignedAssertionGrant {
    pub token_url: String,
    pub client_id: String,
    /// PEM-encoded RSA private key.
    pub private_key_pem: Vec<u8>,
}

/// How outbound FHIR calls are authenticated.
#[derive(Clone)]
pub enum AuthMethod {
    None,
    Basic(ClientCredentials),
    TokenBasic(SharedSecretGrant),
    TokenEpic(SignedAssertionGrant),
}

impl AuthMethod {
    /// Configuration name of the method.
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::Basic(_) => "basic",
            AuthMethod::TokenBasic(_) => "token_basic",
            AuthMethod::TokenEpic(_) => "token_epic",
        }
    }

    /// Whether the method obtains bearer tokens from a token endpoint.
    pub fn uses_tokens(&self) -> bool {
        matches!(self, AuthMethod::TokenBasic(_) | AuthMethod::TokenEpic(_))
    }

    /// Build an `AuthMethod` from raw settings.
    ///
    /// `None` is accepted as an alias of `none`. Token methods must carry every credential they
    /// need; the `token_epic` key is base64-decoded and checked to be a usable RSA PEM key here
    /// so that a bad key fails at startup rather than on the first request.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] for unknown method names and missing or malformed
    /// credentials.
    pub fn from_settings(settings: AuthSettings) -> GatewayResult<Self> {
        let method = settings
            .method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or("none");

        match method {
            "none" | "None" => Ok(AuthMethod::None),
            "basic" => Ok(AuthMethod::Basic(ClientCredentials {
                client_id: required(settings.client_id, "FHIR_SERVER_CLIENT_ID", method)?,
                client_secret: required(
                    settings.client_secret,
                    "FHIR_SERVER_CLIENT_SECRET",
                    method,
                )?,
            })),
            "token_basic" => Ok(AuthMethod::TokenBasic(SharedSecretGrant {
                token_url: required(settings.token_url, "FHIR_SERVER_TOKEN_URL", method)?,
                client_id: required(settings.client_id, "FHIR_SERVER_CLIENT_ID", method)?,
                client_secret: required(
                    settings.client_secret,
                    "FHIR_SERVER_CLIENT_SECRET",
                    method,
                )?,
            })),
            "token_epic" => {
                let encoded = required(
                    settings.private_key_base64,
                    "FHIR_SERVER_TOKEN_PRIVATE_KEY",
                    method,
                )?;
                let private_key_pem = general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| {
                        GatewayError::Config(format!(
                            "FHIR_SERVER_TOKEN_PRIVATE_KEY is not valid base64: {e}"
                        ))
                    })?;
                jsonwebtoken::EncodingKey::from_rsa_pem(&private_key_pem).map_err(|e| {
                    GatewayError::Config(format!(
                        "FHIR_SERVER_TOKEN_PRIVATE_KEY is not an RSA PEM private key: {e}"
                    ))
                })?;

                Ok(AuthMethod::TokenEpic(SignedAssertionGrant {
                    token_url: required(settings.token_url, "FHIR_SERVER_TOKEN_URL", method)?,
                    client_id: required(settings.client_id, "FHIR_SERVER_CLIENT_ID", method)?,
                    private_key_pem,
                }))
            }
            other => Err(GatewayError::Config(format!(
                "unknown FHIR_SERVER_AUTH_METHOD '{other}' (expected none, basic, token_basic or token_epic)"
            ))),
        }
    }
}

// Credentials stay out of logs.
impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::None => f.write_str("None"),
            AuthMethod::Basic(c) => f
                .debug_struct("Basic")
                .field("client_id", &c.client_id)
                .finish_non_exhaustive(),
            AuthMethod::TokenBasic(g) => f
                .debug_struct("TokenBasic")
                .field("token_url", &g.token_url)
                .field("client_id", &g.client_id)
                .finish_non_exhaustive(),
            AuthMethod::TokenEpic(g) => f
                .debug_struct("TokenEpic")
                .field("token_url", &g.token_url)
                .field("client_id", &g.client_id)
                .finish_non_exhaustive(),
        }
    }
}

fn required(value: Option<String>, var: &str, method: &str) -> GatewayResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GatewayError::Config(format!("{var} is required for auth method {method}")))
}

/// Raw auth settings as read from the environment.
#[derive(Clone, Debug, Default)]
pub struct AuthSettings {
    pub method: Option<String>,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub private_key_base64: Option<String>,
}

/// Gateway configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    base_url: String,
    mrn_system: String,
    auth_method: AuthMethod,
    request_timeout: Duration,
    auth_timeout: Duration,
}

impl GatewayConfig {
    /// Create a new `GatewayConfig` with default timeouts.
    ///
    /// A trailing `/` on `base_url` is dropped so endpoints can be joined with a single `/`.
    pub fn new(
        base_url: impl Into<String>,
        mrn_system: impl Into<String>,
        auth_method: AuthMethod,
    ) -> GatewayResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(GatewayError::Config(
                "FHIR_SERVER_BASE_URL cannot be empty".into(),
            ));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(GatewayError::Config(format!(
                "FHIR_SERVER_BASE_URL must be an http(s) URL, got '{base_url}'"
            )));
        }

        let mrn_system = mrn_system.into();
        if mrn_system.trim().is_empty() {
            return Err(GatewayError::Config(
                "FHIR_SERVER_MRN_SYSTEM cannot be empty".into(),
            ));
        }

        Ok(Self {
            base_url,
            mrn_system,
            auth_method,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            auth_timeout: Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECS),
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn mrn_system(&self) -> &str {
        &self.mrn_system
    }

    pub fn auth_method(&self) -> &AuthMethod {
        &self.auth_method
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn auth_timeout(&self) -> Duration {
        self.auth_timeout
    }

    /// Resolve configuration from process environment variables.
    ///
    /// Call once at startup, after `.env` has been loaded. The literal value `None` counts as
    /// unset, matching how deployment manifests spell optional settings.
    pub fn load_from_env() -> GatewayResult<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| v != "None");

        let base_url = var("FHIR_SERVER_BASE_URL")
            .ok_or_else(|| GatewayError::Config("FHIR_SERVER_BASE_URL is required".into()))?;
        let mrn_system = var("FHIR_SERVER_MRN_SYSTEM")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MRN_SYSTEM.to_string());

        let auth_method = AuthMethod::from_settings(AuthSettings {
            method: var("FHIR_SERVER_AUTH_METHOD"),
            token_url: var("FHIR_SERVER_TOKEN_URL"),
            client_id: var("FHIR_SERVER_CLIENT_ID"),
            client_secret: var("FHIR_SERVER_CLIENT_SECRET"),
            private_key_base64: var("FHIR_SERVER_TOKEN_PRIVATE_KEY"),
        })?;

        let request_timeout = timeout_from_env_value(
            "FHIR_REQUEST_TIMEOUT_SECS",
            var("FHIR_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        let auth_timeout = timeout_from_env_value(
            "FHIR_AUTH_TIMEOUT_SECS",
            var("FHIR_AUTH_TIMEOUT_SECS"),
            DEFAULT_AUTH_TIMEOUT_SECS,
        )?;

        Ok(Self::new(base_url, mrn_system, auth_method)?
            .with_request_timeout(request_timeout)
            .with_auth_timeout(auth_timeout))
    }
}

/// Parse a timeout in whole seconds from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns `default_secs`. Zero is rejected.
pub fn timeout_from_env_value(
    name: &str,
    value: Option<String>,
    default_secs: u64,
) -> GatewayResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let Some(value) = value else {
        return Ok(Duration::from_secs(default_secs));
    };

    match value.parse::<u64>() {
        Ok(0) => Err(GatewayError::Config(format!("{name} must be greater than zero"))),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(GatewayError::Config(format!(
            "{name} must be a whole number of seconds: {e}"
        ))),
    }
}
