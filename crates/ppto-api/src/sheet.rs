//! Spreadsheet export and import for one scope.
//!
//! | Method | Path                | Notes |
//! |--------|---------------------|-------|
//! | `GET`  | `/export/{dataset}` | `?ejercicio&centro_gestor[&format=csv\|xlsx]`; responds with an attachment |
//! | `POST` | `/import/{dataset}` | Raw CSV/XLSX body; `?ejercicio&centro_gestor[&tipo_operacion][&format=csv\|xlsx]` |
//!
//! `dataset` is one of `presupuesto`, `ejecutado`, `prevision`,
//! `operaciones` or `partidas`. Imports append; they never replace a scope.

use axum::{
  Json,
  extract::{Path, Query, State, rejection::QueryRejection},
  http::header,
  response::IntoResponse,
};
use bytes::Bytes;
use ppto_core::store::BudgetStore;
use ppto_sheet::{
  Dataset, Format, ImportContext, Table, import_budget_lines, import_operations,
};
use serde::Deserialize;
use serde_json::json;

use crate::{AppState, ScopeParams, auth::CurrentUser, error::ApiError, query_params};

// ─── Export ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExportParams {
  pub ejercicio:     Option<i32>,
  pub centro_gestor: Option<String>,
  /// `csv` (default) or `xlsx`.
  pub format:        Option<String>,
}

/// `GET /export/{dataset}`
pub async fn export<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
  Path(dataset): Path<String>,
  params: Result<Query<ExportParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: BudgetStore + Send + Sync + 'static,
{
  let dataset: Dataset = dataset.parse()?;
  let params = query_params(params)?;
  let format = match params.format.as_deref() {
    Some(f) => f.parse::<Format>()?,
    None => Format::Csv,
  };
  let scope = ScopeParams {
    ejercicio:     params.ejercicio,
    centro_gestor: params.centro_gestor,
  }
  .scope()?;

  let (ops, lines) = if dataset.is_budget_lines() {
    let lines = state
      .store
      .list_budget_lines_in_scope(scope.clone())
      .await
      .map_err(ApiError::storage)?;
    (Vec::new(), lines)
  } else {
    let ops = state
      .store
      .list_operations_in_scope(scope.clone())
      .await
      .map_err(ApiError::storage)?;
    (ops, Vec::new())
  };

  let body = ppto_sheet::export(
    dataset,
    format,
    &scope,
    &ops,
    &lines,
    &state.config.classifier,
  )?;
  let disposition = format!(
    "attachment; filename=\"{}\"",
    dataset.file_name(scope.ejercicio, &scope.centro_gestor, format)
  );

  Ok((
    [
      (header::CONTENT_TYPE, format.content_type().to_owned()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    body,
  ))
}

// ─── Import ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ImportParams {
  pub ejercicio:      Option<i32>,
  pub centro_gestor:  Option<String>,
  /// Overrides the type implied by the dataset; required for `operaciones`.
  pub tipo_operacion: Option<String>,
  /// `csv` or `xlsx`; sniffed from the body when absent.
  pub format:         Option<String>,
}

/// `POST /import/{dataset}`
pub async fn import<S>(
  State(state): State<AppState<S>>,
  CurrentUser { identity, .. }: CurrentUser,
  Path(dataset): Path<String>,
  params: Result<Query<ImportParams>, QueryRejection>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  S: BudgetStore + Send + Sync + 'static,
{
  let dataset: Dataset = dataset.parse()?;
  let params = query_params(params)?;
  let scope = ScopeParams {
    ejercicio:     params.ejercicio,
    centro_gestor: params.centro_gestor,
  }
  .scope()?;

  if body.is_empty() {
    return Err(ApiError::Validation("empty upload".into()));
  }
  let format = match params.format.as_deref() {
    Some(f) => f.parse::<Format>()?,
    None => Format::detect(&body),
  };
  let table = Table::read(&body, format)?;

  let imported = if dataset.is_budget_lines() {
    let lines = import_budget_lines(&table, scope.ejercicio, &scope.centro_gestor)?;
    state
      .store
      .insert_budget_lines(lines)
      .await
      .map_err(ApiError::storage)?
  } else {
    let tipo = params
      .tipo_operacion
      .filter(|t| !t.trim().is_empty())
      .or_else(|| {
        let class = dataset.class()?;
        state.config.classifier.primary_tag(class).map(str::to_owned)
      })
      .ok_or_else(|| {
        ApiError::Validation(format!("tipo_operacion is required for {dataset}"))
      })?;

    let ctx = ImportContext::new(scope.ejercicio, scope.centro_gestor.clone(), tipo);
    let ops = import_operations(&table, &ctx)?;
    state
      .store
      .insert_operations(ops)
      .await
      .map_err(ApiError::storage)?
  };

  tracing::info!(
    %dataset,
    imported,
    ejercicio = scope.ejercicio,
    centro_gestor = %scope.centro_gestor,
    username = %identity.username,
    "imported spreadsheet"
  );
  Ok(Json(json!({ "success": true, "imported": imported })))
}
