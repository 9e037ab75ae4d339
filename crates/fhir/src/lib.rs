//! FHIR wire/boundary support for the EPR gateway.
//!
//! This crate provides **wire models** and **translation helpers** for the FHIR JSON exchanged
//! with the external clinical-records server:
//! - lenient Patient and Bundle wire structs (unknown fields are ignored)
//! - the Patient resource body sent on create
//! - extraction of compact [`CanonicalPatient`] records from search bundles
//!
//! This crate does no I/O. HTTP transport, authentication and auditing live in `gateway-core`.

pub mod bundle;
pub mod extract;
pub mod patient;

// Re-export facades
pub use bundle::Bundle;
pub use extract::{extract_name, CanonicalPatient, PatientExtractor};
pub use patient::{NameUse, NewPatient, Patient, PatientResource};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
