//! `POST /save`: whole-scope replacement of operations or budget lines.
//!
//! Body: `{"type":"operaciones"|"partidas","data":[…],"scope":{…}?}`. The
//! rows matching the batch's predicate are deleted and the batch inserted in
//! one transaction; the response reports both counts.

use axum::{Json, extract::State, response::IntoResponse};
use bytes::Bytes;
use ppto_core::{batch::SaveBatch, store::BudgetStore};
use serde_json::json;

use crate::{AppState, auth::CurrentUser, error::ApiError};

/// `POST /save`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  CurrentUser { identity, .. }: CurrentUser,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  S: BudgetStore + Send + Sync + 'static,
{
  let batch = SaveBatch::parse(&body)?;
  let kind = batch.kind();

  let outcome = match batch {
    SaveBatch::Operaciones { data, predicate } => {
      state.store.replace_operations(data, predicate).await
    }
    SaveBatch::Partidas { data, predicate } => {
      state.store.replace_budget_lines(data, predicate).await
    }
  }
  .map_err(ApiError::storage)?;

  tracing::info!(
    kind,
    deleted = outcome.deleted,
    inserted = outcome.inserted,
    username = %identity.username,
    "saved batch"
  );
  Ok(Json(json!({
    "success": true,
    "deleted": outcome.deleted,
    "inserted": outcome.inserted,
  })))
}
