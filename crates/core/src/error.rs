/// Errors raised by the gateway when talking to the FHIR server or its auth endpoint.
///
/// Variants map onto HTTP statuses at the API edge: [`GatewayError::ServerUnavailable`] is a
/// 503, [`GatewayError::InvalidInput`] a 400, everything else a 500.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Token exchange misconfigured or rejected by the auth server.
    #[error("auth error: {0}")]
    Auth(String),
    /// Auth server or FHIR server unreachable or timed out.
    #[error("server unavailable: {0}")]
    ServerUnavailable(String),
    /// FHIR server answered with an error or an unreadable body.
    #[error("FHIR error: {0}")]
    Fhir(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("persistence error: {0}")]
    Persistence(#[from] LedgerError),
}

impl From<fhir::FhirError> for GatewayError {
    fn from(err: fhir::FhirError) -> Self {
        match err {
            fhir::FhirError::InvalidInput(msg) => GatewayError::InvalidInput(msg),
            fhir::FhirError::Translation(msg) => GatewayError::Fhir(msg),
        }
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Errors raised by ledger stores.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize exchange record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize exchange record {path}: {source}", path = path.display())]
    Deserialization {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
