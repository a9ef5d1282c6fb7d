use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tt_core::ServiceError;

use crate::dto::MessageRes;

/// Error returned by every handler: a status code plus a `{"message"}` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

/// Status code for each service error.
pub fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::MissingFields(_)
        | ServiceError::DuplicateFieldNames
        | ServiceError::ReservedFieldNames
        | ServiceError::InvalidDateOrder
        | ServiceError::InvalidId(_) => StatusCode::BAD_REQUEST,
        ServiceError::UserNotFound
        | ServiceError::DoctorNotFound
        | ServiceError::TemplateNotFound => StatusCode::NOT_FOUND,
        ServiceError::InvalidFieldType(_) => StatusCode::METHOD_NOT_ALLOWED,
        ServiceError::ResourceAlreadyExists => StatusCode::NOT_ACCEPTABLE,
        ServiceError::DatabaseOperationFailed(_)
        | ServiceError::CompensationFailed { .. }
        | ServiceError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(error = ?err, "request failed");
        } else {
            tracing::warn!(error = %err, detail = err.detail(), "request rejected");
        }
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(error = %rejection.body_text(), "malformed request body");
        ServiceError::MissingFields(rejection.body_text()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(MessageRes { message: self.message })).into_response()
    }
}
