//! # API Shared
//!
//! Shared utilities and definitions for the gateway APIs.
//!
//! Contains:
//! - Request/response shapes with OpenAPI schemas (`types` module)
//! - Shared services like `HealthService`
//! - Caller identity and scope checks
//!
//! Used by `api-rest` and the CLI for common functionality.

pub mod auth;
pub mod health;
pub mod types;

pub use auth::{AccessError, CallerIdentity};
pub use health::HealthService;
pub use types::*;
