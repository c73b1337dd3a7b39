//! Handlers for `/centros`: the management-center catalog.
//!
//! | Method   | Path            | Notes |
//! |----------|-----------------|-------|
//! | `GET`    | `/centros`      | Ordered by `codigo` |
//! | `POST`   | `/centros`      | Admin only. Body: `{"codigo":"…","nombre":"…"}` |
//! | `DELETE` | `/centros/{id}` | Admin only. 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use bytes::Bytes;
use ppto_core::{
  catalog::{ManagementCenter, NewManagementCenter},
  store::BudgetStore,
};
use serde_json::json;

use crate::{
  AppState,
  auth::{AdminOnly, CurrentUser},
  error::ApiError,
  parse_json,
};

/// `GET /centros`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
) -> Result<Json<Vec<ManagementCenter>>, ApiError>
where
  S: BudgetStore + Send + Sync + 'static,
{
  let centers = state.store.list_centers().await.map_err(ApiError::storage)?;
  Ok(Json(centers))
}

/// `POST /centros`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  _admin: AdminOnly,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  S: BudgetStore + Send + Sync + 'static,
{
  let body: NewManagementCenter = parse_json(&body)?;
  let center = NewManagementCenter {
    codigo: body.codigo.trim().to_owned(),
    nombre: body.nombre.trim().to_owned(),
  };
  if center.codigo.is_empty() || center.nombre.is_empty() {
    return Err(ApiError::Validation("codigo and nombre are required".into()));
  }

  let center = state.store.add_center(center).await.map_err(ApiError::storage)?;
  tracing::info!(codigo = %center.codigo, "management center added");
  Ok((StatusCode::CREATED, Json(center)))
}

/// `DELETE /centros/{id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  _admin: AdminOnly,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: BudgetStore + Send + Sync + 'static,
{
  let removed = state
    .store
    .delete_center(id.clone())
    .await
    .map_err(ApiError::storage)?;
  if !removed {
    return Err(ApiError::NotFound(format!("management center {id} not found")));
  }
  Ok(Json(json!({ "success": true })))
}
