//! Constants used throughout the gateway core crate.
//!
//! This module contains protocol strings and configuration defaults to ensure
//! consistency across the codebase and make maintenance easier.

/// Media type requested from the FHIR server.
pub const FHIR_JSON: &str = "application/fhir+json";

/// MRN identifier system used when none is configured.
pub const DEFAULT_MRN_SYSTEM: &str = "MRN";

/// Token lifetime assumed when the auth server omits `expires_in`.
pub const DEFAULT_TOKEN_EXPIRY_SECS: i64 = 3600;

/// Lifetime of a signed client assertion.
pub const ASSERTION_LIFETIME_MINUTES: i64 = 5;

/// OAuth 2.0 `client_assertion_type` for JWT bearer client authentication (RFC 7523).
pub const JWT_BEARER_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Default timeout for calls to the FHIR server.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default timeout for calls to the token endpoint.
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;
