//! HTTP client for the external FHIR server.
//!
//! Every successful call is recorded in the [`RequestLedger`] before its
//! [`ExchangeRecord`] is returned. Calls that never get a response are not recorded.

use crate::auth::{Authenticator, CredentialExchange};
use crate::config::GatewayConfig;
use crate::constants::FHIR_JSON;
use crate::ledger::{Exchange, ExchangeRecord, RequestLedger};
use crate::{GatewayError, GatewayResult};
use fhir::{NewPatient, Patient};
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde_json::{json, Value};

const PATIENT_ENDPOINT: &str = "Patient";
const EXPUNGE_ENDPOINT: &str = "$expunge";

/// Outbound gateway to the FHIR server.
#[derive(Debug)]
pub struct FhirGateway {
    client: reqwest::Client,
    base_url: String,
    mrn_system: String,
    auth: Authenticator,
    ledger: RequestLedger,
}

impl FhirGateway {
    /// Build a gateway from startup configuration.
    ///
    /// FHIR calls and token exchanges use separate HTTP clients so each can carry its own
    /// timeout.
    pub fn new(config: &GatewayConfig, ledger: RequestLedger) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build FHIR HTTP client: {e}")))?;
        let exchange = CredentialExchange::new(config.auth_timeout())?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            mrn_system: config.mrn_system().to_string(),
            auth: Authenticator::new(config.auth_method().clone(), exchange),
            ledger,
        })
    }

    pub fn mrn_system(&self) -> &str {
        &self.mrn_system
    }

    pub fn ledger(&self) -> &RequestLedger {
        &self.ledger
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    /// Search Patients, by MRN when `mrn` is given.
    ///
    /// Sends `GET {base}/Patient?identifier={mrn_system}|{mrn}`, or `GET {base}/Patient` with
    /// no query when `mrn` is `None`.
    pub async fn search(&self, mrn: Option<&str>, actor: &str) -> GatewayResult<ExchangeRecord> {
        let query = mrn.map(|mrn| vec![("identifier", format!("{}|{}", self.mrn_system, mrn))]);
        let (url, response) = self
            .send(Method::GET, PATIENT_ENDPOINT, query.as_deref(), None)
            .await?;

        self.record(url, None, response, actor).await
    }

    /// Create a Patient from `details`.
    ///
    /// The date of birth is validated before anything is sent.
    pub async fn create(
        &self,
        details: &NewPatient,
        actor: &str,
    ) -> GatewayResult<ExchangeRecord> {
        let body = Patient::create_body(details, &self.mrn_system)?;
        let (url, response) = self
            .send(Method::POST, PATIENT_ENDPOINT, None, Some(&body))
            .await?;

        self.record(url, Some(body), response, actor).await
    }

    /// Expunge everything on the FHIR server. Development only; not recorded.
    pub async fn expunge(&self) -> GatewayResult<Value> {
        let body = json!({
            "resourceType": "Parameters",
            "parameter": [
                {"name": "expungeEverything", "valueBoolean": true}
            ]
        });
        let (_, response) = self
            .send(Method::POST, EXPUNGE_ENDPOINT, None, Some(&body))
            .await?;
        Ok(response)
    }

    async fn record(
        &self,
        request_url: String,
        request_body: Option<Value>,
        response_body: Value,
        actor: &str,
    ) -> GatewayResult<ExchangeRecord> {
        let exchange = Exchange {
            request_url,
            request_body,
            response_body: Some(response_body),
        };
        Ok(self.ledger.record(exchange, actor).await?)
    }

    /// Issue one call and return the URL actually requested with the JSON response body.
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&Value>,
    ) -> GatewayResult<(String, Value)> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(ACCEPT, FHIR_JSON);
        if let Some(query) = query {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let request = self.auth.authorise(request).await?;

        let response = request.send().await.map_err(|e| {
            tracing::error!(%method, url = %url, "FHIR request failed: {e}");
            GatewayError::ServerUnavailable("could not connect to the FHIR server".into())
        })?;

        let sent_url = response.url().to_string();
        let status = response.status();
        let text = response.text().await.map_err(|e| {
            tracing::error!(%method, url = %sent_url, "failed to read FHIR response: {e}");
            GatewayError::ServerUnavailable("could not connect to the FHIR server".into())
        })?;

        if status.is_client_error() || status.is_server_error() {
            tracing::error!(
                %method,
                url = %sent_url,
                status = status.as_u16(),
                body = %text,
                "FHIR server returned an error"
            );
            return Err(GatewayError::Fhir(format!(
                "FHIR server returned {status}: {text}"
            )));
        }

        let json = serde_json::from_str::<Value>(&text).map_err(|e| {
            tracing::error!(%method, url = %sent_url, body = %text, "FHIR response is not JSON");
            GatewayError::Fhir(format!("FHIR response is not JSON: {e}"))
        })?;

        tracing::debug!(%method, url = %sent_url, status = status.as_u16(), "FHIR call completed");
        Ok((sent_url, json))
    }
}
