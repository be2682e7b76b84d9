//! Error-to-HTTP response conversion.
//!
//! Wraps [`gifify_core::Error`] so handlers can return
//! `Result<Response, AppError>` and get the taxonomy's status code with a
//! plain-text diagnostic body.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: gifify_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: gifify_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.inner.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<gifify_core::Error> for AppError {
    fn from(e: gifify_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                request_id = ?self.request_id,
                error = %self.inner,
                "Conversion request failed"
            );
        } else {
            tracing::debug!(
                status = %status,
                request_id = ?self.request_id,
                error = %self.inner,
                "Conversion request rejected"
            );
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.inner.to_string(),
        )
            .into_response()
    }
}
