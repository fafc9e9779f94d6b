use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, PartialEq, Eq)]
pub enum WebhookResponseCode {
    Ok = 1,
}

#[derive(Debug, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: WebhookResponseCode,
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        // The provider only looks at the status code, the body stays empty
        match self.status {
            WebhookResponseCode::Ok => StatusCode::OK.into_response(),
        }
    }
}

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("could not locate multipart boundary")]
    BoundaryNotFound,
    #[error("failed to decode request body: {0}")]
    RequestDecodingError(String),

    #[error("failed to parse form data: {0}")]
    RequestParsingError(String),
    #[error("form part with no file or field identity")]
    AnonymousFormPart,
    #[error("payload submitted without an event name")]
    MissingEventName,
    #[error("unknown event {0}")]
    UnknownEvent(String),

    #[error("cannot build signer from key: {0}")]
    InvalidSigningKey(String),
    #[error("signature mismatch: expected {expected}, received {received}")]
    SignatureMismatch { expected: String, received: String },

    #[error("handler rejected event: {0}")]
    HandlerFailed(String),
}

impl WebhookError {
    pub fn to_metric_tag(&self) -> &'static str {
        match self {
            WebhookError::BoundaryNotFound => "boundary_not_found",
            WebhookError::RequestDecodingError(_) => "decoding_failed",
            WebhookError::RequestParsingError(_) => "parsing_failed",
            WebhookError::AnonymousFormPart => "anonymous_part",
            WebhookError::MissingEventName => "missing_event",
            WebhookError::UnknownEvent(_) => "unknown_event",
            WebhookError::InvalidSigningKey(_) => "invalid_key",
            WebhookError::SignatureMismatch { .. } => "signature_mismatch",
            WebhookError::HandlerFailed(_) => "handler_failed",
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        // Every rejection answers 429 with the error text, so the provider's
        // own delivery-retry behavior decides what happens next.
        (StatusCode::TOO_MANY_REQUESTS, self.to_string()).into_response()
    }
}
