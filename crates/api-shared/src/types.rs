//! Request and response bodies of the gateway API.

use fhir::{CanonicalPatient, NewPatient};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Error body returned with every non-2xx response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    #[schema(example = 503)]
    pub code: u16,
    #[schema(example = "could not connect to the FHIR server")]
    pub message: String,
}

/// Patient search request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PatientSearchReq {
    /// MRN or hospital number.
    #[schema(example = "123456")]
    pub mrn: String,
}

/// One patient found on the FHIR server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PatientRes {
    /// ID of the resource on the FHIR server.
    #[schema(example = "5690f87c-c23a-4fa0-95a7-d803aff2b8e0")]
    pub fhir_resource_id: String,
    #[schema(example = "Elizabeth")]
    pub first_name: String,
    #[schema(example = "Windsor")]
    pub last_name: String,
    #[schema(example = "1926-04-21")]
    pub date_of_birth: String,
    #[schema(example = "123456")]
    pub mrn: Option<String>,
}

impl From<CanonicalPatient> for PatientRes {
    fn from(p: CanonicalPatient) -> Self {
        Self {
            fhir_resource_id: p.external_id,
            first_name: p.first_name,
            last_name: p.last_name,
            date_of_birth: p.date_of_birth,
            mrn: p.mrn,
        }
    }
}

/// Patient create request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PatientCreateReq {
    #[schema(example = "Elizabeth")]
    pub first_name: String,
    #[schema(example = "Windsor")]
    pub last_name: String,
    /// ISO 8601 date or date-time.
    #[schema(example = "1926-04-21")]
    pub date_of_birth: String,
    #[schema(example = "123456")]
    pub mrn: String,
}

impl From<PatientCreateReq> for NewPatient {
    fn from(req: PatientCreateReq) -> Self {
        Self {
            first_name: req.first_name,
            last_name: req.last_name,
            date_of_birth: req.date_of_birth,
            mrn: req.mrn,
        }
    }
}

/// Result of the development data reset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DropDataRes {
    pub complete: bool,
    /// Elapsed seconds with an `s` suffix.
    #[schema(example = "0.42s")]
    pub time_taken: String,
}

impl DropDataRes {
    pub fn completed(time_taken: std::time::Duration) -> Self {
        Self {
            complete: true,
            time_taken: format!("{}s", time_taken.as_secs_f64()),
        }
    }
}
