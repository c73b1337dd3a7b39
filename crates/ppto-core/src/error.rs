//! Error types for `ppto-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid save payload: {0}")]
  InvalidPayload(#[from] serde_json::Error),

  #[error("record outside the requested scope: {0}")]
  OutOfScope(String),

  #[error("unknown save type: {0:?}")]
  UnknownBatchKind(String),

  #[error("password hashing failed: {0}")]
  PasswordHash(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
