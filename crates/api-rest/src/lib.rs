//! # API REST
//!
//! REST API implementation for the EPR gateway.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, caller headers)
//!
//! Uses `api-shared` for common types and utilities and `gateway-core` for FHIR access.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod handlers;

use api_shared::{
    DropDataRes, ErrorRes, HealthRes, PatientCreateReq, PatientRes, PatientSearchReq,
};
use axum::routing::{get, post};
use axum::Router;
use gateway_core::PatientService;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::ApiError;

/// Application state shared across REST API handlers
#[derive(Clone, Debug)]
pub struct AppState {
    pub patients: PatientService,
    /// Whether `POST /v1/drop_data` may run.
    pub allow_drop_data: bool,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "EPR Gateway",
        description = "A service for making requests to a FHIR server"
    ),
    paths(
        handlers::health,
        handlers::patient_search,
        handlers::list_patients,
        handlers::create_patient,
        handlers::drop_data,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        PatientSearchReq,
        PatientRes,
        PatientCreateReq,
        DropDataRes,
    ))
)]
pub struct ApiDoc;

/// Build the application router.
///
/// `dev_routes` mounts the development-only endpoints and the Swagger UI; it must be off in
/// production.
pub fn router(state: AppState, dev_routes: bool) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/patient_search", post(handlers::patient_search));

    if dev_routes {
        app = app
            .route("/v1/patient_search", get(handlers::list_patients))
            .route("/v1/patient_create", post(handlers::create_patient))
            .route("/v1/drop_data", post(handlers::drop_data))
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    app.layer(CorsLayer::permissive()).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use gateway_core::{AuthMethod, FhirGateway, GatewayConfig, RequestLedger};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state(base_url: &str, allow_drop_data: bool) -> AppState {
        let config = GatewayConfig::new(base_url, "MRN", AuthMethod::None).expect("config");
        let gateway = FhirGateway::new(&config, RequestLedger::in_memory()).expect("gateway");
        AppState {
            patients: PatientService::new(Arc::new(gateway)),
            allow_drop_data,
        }
    }

    fn post_json(uri: &str, headers: &[(&str, &str)], body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn bundle() -> Value {
        json!({
            "resourceType": "Bundle",
            "total": 2,
            "entry": [
                {"resource": {
                    "resourceType": "Patient",
                    "id": "p1",
                    "identifier": [{"system": "MRN", "value": "123456"}],
                    "name": [{"use": "official", "family": "Chalmers", "given": ["Jim"]}],
                    "birthDate": "1970-01-01"
                }},
                {"resource": {
                    "resourceType": "Patient",
                    "id": "p2",
                    "identifier": [{"system": "MRN", "value": "654321"}],
                    "name": [{"family": "Other", "given": ["Someone"]}],
                    "birthDate": "1980-01-01"
                }}
            ]
        })
    }

    #[tokio::test]
    async fn health_is_open() {
        let app = router(state("http://fhir.local", false), false);
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"ok": true, "message": "EPR gateway is alive"})
        );
    }

    #[tokio::test]
    async fn search_returns_only_matching_mrn() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Patient"))
            .and(query_param("identifier", "MRN|123456"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bundle()))
            .expect(1)
            .mount(&server)
            .await;

        let app = router(state(&server.uri(), false), false);
        let response = app
            .oneshot(post_json(
                "/v1/patient_search",
                &[("x-caller-id", "clinician-1"), ("x-caller-scopes", "read:gdm_patient")],
                json!({"mrn": "123456"}),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!([{
                "fhir_resource_id": "p1",
                "first_name": "Jim",
                "last_name": "Chalmers",
                "date_of_birth": "1970-01-01",
                "mrn": "123456"
            }])
        );
    }

    #[tokio::test]
    async fn search_requires_identity_and_scope() {
        let app = router(state("http://fhir.local", false), false);

        let response = app
            .clone()
            .oneshot(post_json("/v1/patient_search", &[], json!({"mrn": "1"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(post_json(
                "/v1/patient_search",
                &[("x-caller-id", "clinician-1"), ("x-caller-scopes", "write:patient")],
                json!({"mrn": "1"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn search_rejects_blank_and_malformed_bodies() {
        let app = router(state("http://fhir.local", false), false);
        let headers = [("x-caller-id", "clinician-1"), ("x-caller-scopes", "read:patient")];

        let response = app
            .clone()
            .oneshot(post_json("/v1/patient_search", &headers, json!({"mrn": ""})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_json("/v1/patient_search", &headers, json!({"id": "1"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], json!(400));
    }

    #[tokio::test]
    async fn unreachable_fhir_server_is_503() {
        let app = router(state("http://127.0.0.1:1", false), false);
        let response = app
            .oneshot(post_json(
                "/v1/patient_search",
                &[("x-caller-id", "clinician-1"), ("x-caller-scopes", "read:patient")],
                json!({"mrn": "1"}),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            json_body(response).await["message"],
            json!("could not connect to the FHIR server")
        );
    }

    #[tokio::test]
    async fn dev_routes_are_absent_in_production() {
        let app = router(state("http://fhir.local", true), false);
        let response = app
            .oneshot(post_json(
                "/v1/drop_data",
                &[("x-system-id", "dhos-robot")],
                json!({}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_returns_201_for_system_callers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Patient"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "resourceType": "Patient",
                "id": "new-1",
                "identifier": [{"system": "MRN", "value": "999"}],
                "name": [{"use": "official", "family": "Windsor", "given": ["Elizabeth"]}],
                "birthDate": "1926-04-21"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let app = router(state(&server.uri(), false), true);
        let body = json!({
            "first_name": "Elizabeth",
            "last_name": "Windsor",
            "date_of_birth": "1926-04-21",
            "mrn": "999"
        });

        let response = app
            .clone()
            .oneshot(post_json(
                "/v1/patient_create",
                &[("x-caller-id", "clinician-1"), ("x-caller-scopes", "read:patient")],
                body.clone(),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(post_json(
                "/v1/patient_create",
                &[("x-system-id", "dhos-robot")],
                body,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json_body(response).await["fhir_resource_id"], json!("new-1"));
    }

    #[tokio::test]
    async fn drop_data_is_forbidden_unless_enabled() {
        let app = router(state("http://fhir.local", false), true);
        let response = app
            .oneshot(post_json(
                "/v1/drop_data",
                &[("x-system-id", "dhos-robot")],
                json!({}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn drop_data_expunges_when_enabled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/$expunge"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"resourceType": "Parameters"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let app = router(state(&server.uri(), true), true);
        let response = app
            .oneshot(post_json(
                "/v1/drop_data",
                &[("x-system-id", "dhos-robot")],
                json!({}),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["complete"], json!(true));
        assert!(body["time_taken"]
            .as_str()
            .expect("string")
            .ends_with('s'));
    }

    #[tokio::test]
    async fn list_all_is_dev_only_for_system_callers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Patient"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bundle()))
            .expect(1)
            .mount(&server)
            .await;

        let app = router(state(&server.uri(), false), true);
        let response = app
            .oneshot(
                Request::get("/v1/patient_search")
                    .header("x-system-id", "dhos-robot")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response)
                .await
                .as_array()
                .expect("array")
                .len(),
            2
        );
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for route in [
            "/health",
            "/v1/patient_search",
            "/v1/patient_create",
            "/v1/drop_data",
        ] {
            assert!(doc.paths.paths.contains_key(route), "{route} missing");
        }
    }
}
