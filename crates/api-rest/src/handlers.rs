//! REST endpoint handlers.

use crate::error::ApiError;
use crate::AppState;
use api_shared::auth::{
    CALLER_ID_HEADER, CALLER_SCOPES_HEADER, PATIENT_SEARCH_SCOPES, SYSTEM_ID_HEADER,
};
use api_shared::{
    AccessError, CallerIdentity, DropDataRes, ErrorRes, HealthRes, HealthService,
    PatientCreateReq, PatientRes, PatientSearchReq,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

/// Identity of the caller, read from the headers set by the upstream verifier.
pub struct Caller(pub CallerIdentity);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = CallerIdentity::from_headers(
            header(&parts.headers, CALLER_ID_HEADER),
            header(&parts.headers, CALLER_SCOPES_HEADER),
            header(&parts.headers, SYSTEM_ID_HEADER),
        )?;
        Ok(Caller(identity))
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// This endpoint is used for monitoring and load balancer health checks.
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/v1/patient_search",
    request_body = PatientSearchReq,
    responses(
        (status = 200, description = "Search results", body = [PatientRes]),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 401, description = "Caller identity missing", body = ErrorRes),
        (status = 403, description = "Missing patient read scope", body = ErrorRes),
        (status = 503, description = "FHIR or auth server unavailable", body = ErrorRes)
    ),
    tag = "patient"
)]
/// Search the FHIR server for patients with an MRN
///
/// Requires one of `read:patient`, `read:gdm_patient` or `read:gdm_patient_all`.
/// Resources whose MRN does not match the searched MRN are left out of the results.
#[axum::debug_handler]
pub async fn patient_search(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<PatientSearchReq>, JsonRejection>,
) -> Result<Json<Vec<PatientRes>>, ApiError> {
    caller.require_any_scope(PATIENT_SEARCH_SCOPES)?;
    let Json(req) = payload?;

    let patients = state.patients.search(&req.mrn, caller.actor()).await?;
    Ok(Json(patients.into_iter().map(PatientRes::from).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/patient_search",
    responses(
        (status = 200, description = "All patients", body = [PatientRes]),
        (status = 401, description = "Caller identity missing", body = ErrorRes),
        (status = 403, description = "Not a system caller", body = ErrorRes),
        (status = 503, description = "FHIR or auth server unavailable", body = ErrorRes)
    ),
    tag = "dev"
)]
/// List every patient on the FHIR server. Dev-only.
pub async fn list_patients(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<PatientRes>>, ApiError> {
    caller.require_system()?;

    let patients = state.patients.list_all(caller.actor()).await?;
    Ok(Json(patients.into_iter().map(PatientRes::from).collect()))
}

#[utoipa::path(
    post,
    path = "/v1/patient_create",
    request_body = PatientCreateReq,
    responses(
        (status = 201, description = "Patient created", body = PatientRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 401, description = "Caller identity missing", body = ErrorRes),
        (status = 403, description = "Not a system caller", body = ErrorRes),
        (status = 503, description = "FHIR or auth server unavailable", body = ErrorRes)
    ),
    tag = "dev"
)]
/// Create a patient on the FHIR server. Dev-only.
#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<PatientCreateReq>, JsonRejection>,
) -> Result<(StatusCode, Json<PatientRes>), ApiError> {
    caller.require_system()?;
    let Json(req) = payload?;

    let patient = state.patients.create(&req.into(), caller.actor()).await?;
    Ok((StatusCode::CREATED, Json(patient.into())))
}

#[utoipa::path(
    post,
    path = "/v1/drop_data",
    responses(
        (status = 200, description = "Drop results", body = DropDataRes),
        (status = 401, description = "Caller identity missing", body = ErrorRes),
        (status = 403, description = "Not a system caller, or dropping data is disabled", body = ErrorRes),
        (status = 503, description = "FHIR or auth server unavailable", body = ErrorRes)
    ),
    tag = "dev"
)]
/// Clear the request ledger and expunge the FHIR server. Dev-only.
///
/// Refused unless `ALLOW_DROP_DATA` is enabled.
pub async fn drop_data(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<DropDataRes>, ApiError> {
    caller.require_system()?;
    if !state.allow_drop_data {
        return Err(AccessError::Forbidden("Cannot drop data in this environment".into()).into());
    }

    let report = state.patients.drop_data().await?;
    Ok(Json(DropDataRes::completed(report.time_taken)))
}
