//! Handlers for `/auth/users`: the authorized directory users. Admin only.
//!
//! | Method   | Path                    | Notes |
//! |----------|-------------------------|-------|
//! | `GET`    | `/auth/users`           | `{"users":[…]}` ordered by username |
//! | `POST`   | `/auth/users`           | Body: `{"username":"…","displayName":"…"}`; insert-or-replace |
//! | `DELETE` | `/auth/users?username=` | |

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
  response::IntoResponse,
};
use bytes::Bytes;
use ppto_core::store::BudgetStore;
use serde::Deserialize;
use serde_json::json;

use crate::{AppState, auth::AdminOnly, error::ApiError, parse_json, query_params};

/// `GET /auth/users`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _admin: AdminOnly,
) -> Result<impl IntoResponse, ApiError>
where
  S: BudgetStore + Send + Sync + 'static,
{
  let users = state
    .store
    .list_authorized_users()
    .await
    .map_err(ApiError::storage)?;
  Ok(Json(json!({ "users": users })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBody {
  #[serde(default)]
  pub username:     Option<String>,
  #[serde(default)]
  pub display_name: Option<String>,
}

/// `POST /auth/users`
pub async fn add<S>(
  State(state): State<AppState<S>>,
  AdminOnly(admin): AdminOnly,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  S: BudgetStore + Send + Sync + 'static,
{
  let body: AddBody = parse_json(&body)?;
  let present = |v: Option<String>| v.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty());
  let (Some(username), Some(display_name)) = (present(body.username), present(body.display_name))
  else {
    return Err(ApiError::Validation("username and displayName are required".into()));
  };

  let user = state
    .store
    .add_authorized_user(username, display_name)
    .await
    .map_err(ApiError::storage)?;

  tracing::info!(username = %user.username, by = %admin.username, "authorized user added");
  Ok(Json(json!({ "success": true, "user": user })))
}

#[derive(Debug, Deserialize)]
pub struct RemoveParams {
  pub username: Option<String>,
}

/// `DELETE /auth/users?username=<username>`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  AdminOnly(admin): AdminOnly,
  params: Result<Query<RemoveParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: BudgetStore + Send + Sync + 'static,
{
  let username = query_params(params)?
    .username
    .filter(|u| !u.trim().is_empty())
    .ok_or_else(|| ApiError::Validation("username is required".into()))?;

  let removed = state
    .store
    .remove_authorized_user(username.clone())
    .await
    .map_err(ApiError::storage)?;

  tracing::info!(username, removed, by = %admin.username, "authorized user removed");
  Ok(Json(json!({ "success": true, "removed": removed })))
}
