//! Patient service and related types.
//!
//! This module ties the [`FhirGateway`] to the [`PatientExtractor`]: it issues searches and
//! creates against the FHIR server and turns the recorded responses into
//! [`CanonicalPatient`]s.

use crate::gateway::FhirGateway;
use crate::ledger::ExchangeRecord;
use crate::{GatewayError, GatewayResult};
use fhir::{CanonicalPatient, NewPatient, PatientExtractor};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The search that produced an [`ExchangeRecord`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientSearch {
    pub mrn: String,
}

/// Outcome of [`PatientService::drop_data`].
#[derive(Clone, Debug)]
pub struct DropReport {
    pub time_taken: Duration,
    /// Ledger records removed, or `None` if clearing the ledger failed.
    pub ledger_records_removed: Option<usize>,
}

/// Extract patients from a recorded search.
///
/// When `validate_mrn` is set and `search` is given, resources whose MRN does not match the
/// searched MRN are dropped. A record without a response body yields nothing.
pub fn extract_patients(
    extractor: &PatientExtractor,
    record: &ExchangeRecord,
    validate_mrn: bool,
    search: Option<&PatientSearch>,
) -> Vec<CanonicalPatient> {
    let Some(response) = record.response_body.as_ref() else {
        tracing::warn!(uuid = %record.uuid, "exchange record has no response body");
        return Vec::new();
    };

    let expected = search
        .filter(|_| validate_mrn)
        .map(|s| s.mrn.as_str());
    extractor.extract_patients(response, expected)
}

/// Patient operations against the FHIR server - no API concerns
#[derive(Clone, Debug)]
pub struct PatientService {
    gateway: Arc<FhirGateway>,
    extractor: PatientExtractor,
}

impl PatientService {
    /// Creates a new instance of PatientService.
    ///
    /// The extractor uses the gateway's MRN system, so MRN matching agrees with the query the
    /// gateway sends.
    pub fn new(gateway: Arc<FhirGateway>) -> Self {
        let extractor = PatientExtractor::new(gateway.mrn_system());
        Self { gateway, extractor }
    }

    pub fn gateway(&self) -> &FhirGateway {
        &self.gateway
    }

    /// Find patients by MRN.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidInput`] if `mrn` is blank, otherwise whatever the
    /// gateway returns. Extraction never fails; unusable resources are skipped.
    pub async fn search(&self, mrn: &str, actor: &str) -> GatewayResult<Vec<CanonicalPatient>> {
        let mrn = mrn.trim();
        if mrn.is_empty() {
            return Err(GatewayError::InvalidInput("mrn is required".into()));
        }

        let record = self.gateway.search(Some(mrn), actor).await?;
        let search = PatientSearch {
            mrn: mrn.to_string(),
        };
        let patients = extract_patients(&self.extractor, &record, true, Some(&search));
        tracing::info!(uuid = %record.uuid, matches = patients.len(), "patient search complete");
        Ok(patients)
    }

    /// List every patient the FHIR server returns for an unfiltered search.
    pub async fn list_all(&self, actor: &str) -> GatewayResult<Vec<CanonicalPatient>> {
        let record = self.gateway.search(None, actor).await?;
        Ok(extract_patients(&self.extractor, &record, false, None))
    }

    /// Create a patient on the FHIR server.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidInput`] if a name or the MRN is blank or the date of
    /// birth cannot be parsed, and [`GatewayError::Fhir`] if the server's response is not a
    /// usable Patient.
    pub async fn create(
        &self,
        details: &NewPatient,
        actor: &str,
    ) -> GatewayResult<CanonicalPatient> {
        for (field, value) in [
            ("first_name", &details.first_name),
            ("last_name", &details.last_name),
            ("date_of_birth", &details.date_of_birth),
            ("mrn", &details.mrn),
        ] {
            if value.trim().is_empty() {
                return Err(GatewayError::InvalidInput(format!("{field} is required")));
            }
        }

        let record = self.gateway.create(details, actor).await?;
        let response = record
            .response_body
            .as_ref()
            .ok_or_else(|| GatewayError::Fhir("create returned no body".into()))?;
        let patient = self
            .extractor
            .created_patient(response)
            .map_err(|e| GatewayError::Fhir(e.to_string()))?;

        tracing::info!(uuid = %record.uuid, external_id = %patient.external_id, "patient created");
        Ok(patient)
    }

    /// Remove all local and remote data. Development only.
    ///
    /// The ledger is cleared first; a failure there is logged and the expunge still runs.
    pub async fn drop_data(&self) -> GatewayResult<DropReport> {
        let started = Instant::now();

        let ledger_records_removed = match self.gateway.ledger().clear().await {
            Ok(removed) => Some(removed),
            Err(e) => {
                tracing::error!("failed to clear request ledger: {e}");
                None
            }
        };

        self.gateway.expunge().await?;

        let time_taken = started.elapsed();
        tracing::info!(elapsed_ms = time_taken.as_millis() as u64, "data dropped");
        Ok(DropReport {
            time_taken,
            ledger_records_removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthMethod, GatewayConfig};
    use crate::ledger::{Exchange, RequestLedger};
    use crate::test_support::patient_bundle;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    fn service(base_url: &str) -> PatientService {
        let config = GatewayConfig::new(base_url, "MRN", AuthMethod::None).expect("config");
        let gateway = FhirGateway::new(&config, RequestLedger::in_memory()).expect("gateway");
        PatientService::new(Arc::new(gateway))
    }

    fn record(response: Option<Value>) -> ExchangeRecord {
        let now = chrono::Utc::now();
        ExchangeRecord {
            uuid: uuid::Uuid::new_v4(),
            created: now,
            created_by: "system".into(),
            modified: now,
            modified_by: "system".into(),
            request_url: "http://fhir.local/Patient".into(),
            request_body: None,
            response_body: response,
        }
    }

    #[test]
    fn validation_only_applies_with_search() {
        let extractor = PatientExtractor::new("MRN");
        let rec = record(Some(patient_bundle("p1", "111")));
        let search = PatientSearch { mrn: "222".into() };

        assert!(extract_patients(&extractor, &rec, true, Some(&search)).is_empty());
        assert_eq!(
            extract_patients(&extractor, &rec, false, Some(&search)).len(),
            1
        );
        assert_eq!(extract_patients(&extractor, &rec, true, None).len(), 1);
    }

    #[test]
    fn record_without_body_yields_nothing() {
        let extractor = PatientExtractor::new("MRN");
        assert!(extract_patients(&extractor, &record(None), false, None).is_empty());
    }

    #[tokio::test]
    async fn search_returns_matching_patients() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Patient"))
            .and(query_param("identifier", "MRN|123456"))
            .respond_with(ResponseTemplate::new(200).set_body_json(patient_bundle("p1", "123456")))
            .mount(&server)
            .await;

        let patients = service(&server.uri())
            .search("123456", "clinician-1")
            .await
            .expect("search");
        assert_eq!(
            patients,
            vec![CanonicalPatient {
                external_id: "p1".into(),
                first_name: "Jim".into(),
                last_name: "Chalmers".into(),
                date_of_birth: "1970-01-01".into(),
                mrn: Some("123456".into()),
            }]
        );
    }

    #[tokio::test]
    async fn blank_mrn_is_rejected() {
        let err = service("http://fhir.local")
            .search("  ", "clinician-1")
            .await
            .expect_err("blank");
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn create_summarises_server_echo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Patient"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "resourceType": "Patient",
                "id": "new-1",
                "identifier": [{"system": "MRN", "value": "999"}],
                "name": [{"use": "official", "family": "Chalmers", "given": ["Jim"]}],
                "birthDate": "1970-01-01"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service(&server.uri());
        let patient = service
            .create(
                &NewPatient {
                    first_name: "Jim".into(),
                    last_name: "Chalmers".into(),
                    date_of_birth: "1970-01-01".into(),
                    mrn: "999".into(),
                },
                "system",
            )
            .await
            .expect("created");

        assert_eq!(patient.external_id, "new-1");
        assert_eq!(patient.mrn.as_deref(), Some("999"));
        assert_eq!(service.gateway().ledger().count().await.expect("count"), 1);
    }

    /// Fake FHIR store for one Patient: `POST` keeps the posted body with an id added,
    /// `GET` returns whatever was stored as a searchset Bundle.
    #[derive(Clone, Default)]
    struct SinglePatientStore(Arc<std::sync::Mutex<Option<Value>>>);

    impl Respond for SinglePatientStore {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let mut stored = self.0.lock().expect("store lock");
            if request.method.as_str() == "POST" {
                let mut resource: Value =
                    serde_json::from_slice(&request.body).expect("posted JSON");
                resource["id"] = json!("round-trip-1");
                *stored = Some(resource.clone());
                return ResponseTemplate::new(201).set_body_json(resource);
            }

            let entries: Vec<Value> = stored
                .iter()
                .map(|resource| json!({"resource": resource}))
                .collect();
            ResponseTemplate::new(200).set_body_json(json!({
                "resourceType": "Bundle",
                "type": "searchset",
                "total": entries.len(),
                "entry": entries
            }))
        }
    }

    #[tokio::test]
    async fn created_patient_is_found_by_search() {
        let server = MockServer::start().await;
        let store = SinglePatientStore::default();
        Mock::given(method("POST"))
            .and(path("/Patient"))
            .respond_with(store.clone())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Patient"))
            .and(query_param("identifier", "MRN|246810"))
            .respond_with(store)
            .expect(1)
            .mount(&server)
            .await;

        let details = NewPatient {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            date_of_birth: "1815-12-10".into(),
            mrn: "246810".into(),
        };
        let service = service(&server.uri());
        let created = service.create(&details, "system").await.expect("created");

        let found = service.search(&details.mrn, "clinician-1").await.expect("search");
        assert_eq!(found, vec![created]);
        let patient = &found[0];
        assert_eq!(patient.external_id, "round-trip-1");
        assert_eq!(patient.first_name, details.first_name);
        assert_eq!(patient.last_name, details.last_name);
        assert_eq!(patient.date_of_birth, details.date_of_birth);
        assert_eq!(patient.mrn.as_deref(), Some(details.mrn.as_str()));
    }

    #[tokio::test]
    async fn create_rejects_blank_names() {
        let err = service("http://fhir.local")
            .create(
                &NewPatient {
                    first_name: "".into(),
                    last_name: "Chalmers".into(),
                    date_of_birth: "1970-01-01".into(),
                    mrn: "999".into(),
                },
                "system",
            )
            .await
            .expect_err("blank first name");
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn drop_data_clears_ledger_and_expunges() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/$expunge"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resourceType": "Parameters"})))
            .expect(1)
            .mount(&server)
            .await;

        let service = service(&server.uri());
        let ledger = service.gateway().ledger();
        ledger
            .record(
                Exchange {
                    request_url: "http://fhir.local/Patient".into(),
                    request_body: None,
                    response_body: None,
                },
                "system",
            )
            .await
            .expect("recorded");

        let report = service.drop_data().await.expect("dropped");
        assert_eq!(report.ledger_records_removed, Some(1));
        assert_eq!(ledger.count().await.expect("count"), 0);
    }
}
