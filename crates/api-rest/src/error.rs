use api_shared::{AccessError, ErrorRes};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_core::GatewayError;

/// Error returned by REST handlers.
#[derive(Debug)]
pub enum ApiError {
    Access(AccessError),
    Gateway(GatewayError),
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Access(AccessError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            ApiError::Access(AccessError::Forbidden(_)) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Gateway(GatewayError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Gateway(GatewayError::ServerUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Gateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Access(e) => e.to_string(),
            ApiError::Gateway(GatewayError::InvalidInput(msg)) => msg.clone(),
            ApiError::Gateway(GatewayError::ServerUnavailable(msg)) => msg.clone(),
            ApiError::Gateway(e) => e.to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        ApiError::Access(e)
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        ApiError::Gateway(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "request failed: {message}");
        } else {
            tracing::warn!(status = status.as_u16(), "request rejected: {message}");
        }

        (
            status,
            Json(ErrorRes {
                code: status.as_u16(),
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::LedgerError;

    #[test]
    fn maps_errors_to_statuses() {
        let cases = [
            (
                ApiError::Access(AccessError::Unauthenticated),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::Access(AccessError::Forbidden("nope".into())),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::Gateway(GatewayError::InvalidInput("mrn is required".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Gateway(GatewayError::ServerUnavailable("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::Gateway(GatewayError::Auth("denied".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Gateway(GatewayError::Fhir("500".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Gateway(GatewayError::Persistence(LedgerError::Io(
                    std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                ))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err:?}");
        }
    }
}
