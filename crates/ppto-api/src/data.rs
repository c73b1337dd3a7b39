//! `GET /data`: the full snapshot the client works from.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use ppto_core::{
  aggregate::{Domains, domains},
  catalog::{BudgetLine, ManagementCenter},
  operation::Operation,
  store::BudgetStore,
};
use serde::Serialize;

use crate::{AppState, auth::CurrentUser, error::ApiError};

/// Every operation and catalog entry plus the filter domains of the
/// operations.
#[derive(Debug, Serialize)]
pub struct Snapshot {
  pub source_file:      &'static str,
  pub sheet:            &'static str,
  pub generated_at:     DateTime<Utc>,
  pub records:          Vec<Operation>,
  pub domains:          Domains,
  pub partidas:         Vec<BudgetLine>,
  pub centros_gestores: Vec<ManagementCenter>,
}

/// `GET /data`
pub async fn snapshot<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
) -> Result<Json<Snapshot>, ApiError>
where
  S: BudgetStore + Send + Sync + 'static,
{
  let records = state.store.list_operations().await.map_err(ApiError::storage)?;
  let partidas = state.store.list_budget_lines().await.map_err(ApiError::storage)?;
  let centros_gestores = state.store.list_centers().await.map_err(ApiError::storage)?;

  Ok(Json(Snapshot {
    source_file: "SQLite Database",
    sheet: "contabilidad.db",
    generated_at: Utc::now(),
    domains: domains(&records),
    records,
    partidas,
    centros_gestores,
  }))
}
