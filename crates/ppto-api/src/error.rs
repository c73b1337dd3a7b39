//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler. Every variant renders as
/// `{"success": false, "error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  Validation(String),

  #[error("{0}")]
  Parse(String),

  #[error("{0}")]
  Auth(String),

  #[error("{0}")]
  Forbidden(String),

  #[error("{0}")]
  NotFound(String),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Wrap a backend error, logging it at `error` level.
  pub fn storage<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    tracing::error!(error = %e, "storage failure");
    ApiError::Storage(Box::new(e))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Validation(_) | ApiError::Parse(_) => StatusCode::BAD_REQUEST,
      ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<ppto_core::Error> for ApiError {
  fn from(e: ppto_core::Error) -> Self {
    match e {
      ppto_core::Error::PasswordHash(_) => ApiError::storage(e),
      other => ApiError::Validation(other.to_string()),
    }
  }
}

impl From<ppto_sheet::Error> for ApiError {
  fn from(e: ppto_sheet::Error) -> Self {
    use ppto_sheet::Error as E;
    match e {
      E::UnknownDataset(_) => ApiError::NotFound(e.to_string()),
      E::UnknownFormat(_) => ApiError::Validation(e.to_string()),
      E::XlsxWrite(_) | E::Io(_) => ApiError::storage(e),
      other => ApiError::Parse(other.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn statuses() {
    assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::Auth("x".into()).status(), StatusCode::UNAUTHORIZED);
    assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);

    let sheet: ApiError = ppto_sheet::Error::UnknownDataset("centros".into()).into();
    assert_eq!(sheet.status(), StatusCode::NOT_FOUND);
    let parse: ApiError = ppto_sheet::Error::Parse { row: 4, message: "bad".into() }.into();
    assert_eq!(parse.status(), StatusCode::BAD_REQUEST);
    assert_eq!(parse.to_string(), "row 4: bad");
    let io = std::io::Error::other("disk full");
    let write: ApiError = ppto_sheet::Error::Io(io).into();
    assert_eq!(write.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let scope: ApiError = ppto_core::Error::OutOfScope("op".into()).into();
    assert_eq!(scope.status(), StatusCode::BAD_REQUEST);
  }
}
