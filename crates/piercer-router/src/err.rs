//! Translating internal failures into HTTP responses.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use piercer_error::ErrorKind;
use piercer_rpc::TransportClosed;
use serde_json::json;

/// A failure surfaced to an HTTP client as a structured JSON body.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Build an error from an internal [`ErrorKind`], using its documented
    /// status mapping.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let status = StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ApiError { status, message: message.into() }
    }

    /// The requested public model name has no mapping.
    ///
    /// Not an [`ErrorKind`] on its own: `http_status()` has no 404 case
    /// because "unknown resource" isn't a failure mode of the RPC/transport
    /// layers that enum classifies, only of this HTTP surface.
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError { status: StatusCode::NOT_FOUND, message: message.into() }
    }

    /// The request body did not match the shape a handler expected.
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    /// The bearer API key was missing or did not match.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError { status: StatusCode::UNAUTHORIZED, message: message.into() }
    }
}

impl From<TransportClosed> for ApiError {
    fn from(_: TransportClosed) -> Self {
        ApiError::from_kind(ErrorKind::TransportClosed, "agent connection closed")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "code": self.status.as_u16(),
            }
        }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn routing_unavailable_maps_to_503() {
        let err = ApiError::from_kind(ErrorKind::RoutingUnavailable, "no agent");
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn unknown_model_is_404_not_a_kind_mapping() {
        let err = ApiError::not_found("no mapping for ghost");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
