//! # Gateway Core
//!
//! Core business logic for the EPR gateway.
//!
//! This crate talks to the external FHIR server on behalf of the API layer:
//! - authentication of outbound calls (basic auth or cached OAuth 2.0 bearer tokens)
//! - Patient search and create, plus the development-only `$expunge` reset
//! - an audit ledger recording every completed exchange
//! - extraction of compact patient records from search results
//!
//! **No API concerns**: inbound authentication, HTTP servers, or service interfaces belong in
//! `api-rest` or `api-shared`.

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod patient;

pub use config::{AuthMethod, AuthSettings, GatewayConfig};
pub use error::{GatewayError, GatewayResult, LedgerError, LedgerResult};
pub use gateway::FhirGateway;
pub use ledger::{
    Exchange, ExchangeRecord, FileLedgerStore, LedgerStore, MemoryLedgerStore, RequestLedger,
};
pub use patient::{extract_patients, DropReport, PatientSearch, PatientService};

pub use fhir::{CanonicalPatient, NewPatient};
