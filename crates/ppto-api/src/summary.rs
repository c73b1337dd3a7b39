//! `GET /summary?ejercicio=&centro_gestor=[&incluir_prevision=]`: scope
//! totals and the per-line breakdown.

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
};
use ppto_core::{
  aggregate::{
    Breakdown, GroupField, GroupStat, LineBalance, Scope, Summary, group_stats, summarize,
  },
  store::BudgetStore,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, ScopeParams, auth::CurrentUser, error::ApiError, query_params};

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
  pub ejercicio:         Option<i32>,
  pub centro_gestor:     Option<String>,
  #[serde(default)]
  pub incluir_prevision: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
  pub scope:             Scope,
  pub incluir_prevision: bool,
  pub summary:           Summary,
  /// Ordered by `saldo` descending.
  pub lineas:            Vec<LineBalance>,
  pub total_saldo:       f64,
  /// Count and raw total per `tipo_operacion` within the scope, inert tags
  /// included.
  pub por_tipo:          Vec<GroupStat>,
}

/// `GET /summary`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
  params: Result<Query<SummaryParams>, QueryRejection>,
) -> Result<Json<SummaryResponse>, ApiError>
where
  S: BudgetStore + Send + Sync + 'static,
{
  let params = query_params(params)?;
  let scope = ScopeParams {
    ejercicio:     params.ejercicio,
    centro_gestor: params.centro_gestor,
  }
  .scope()?;

  let ops = state
    .store
    .list_operations_in_scope(scope.clone())
    .await
    .map_err(ApiError::storage)?;
  let catalog = state
    .store
    .list_budget_lines_in_scope(scope.clone())
    .await
    .map_err(ApiError::storage)?;

  let classifier = &state.config.classifier;
  let summary = summarize(&ops, &scope, classifier);
  let breakdown =
    Breakdown::new(&ops, &scope, classifier, params.incluir_prevision).with_catalog(&catalog);

  Ok(Json(SummaryResponse {
    incluir_prevision: params.incluir_prevision,
    summary,
    lineas: breakdown.iter().collect(),
    total_saldo: breakdown.total_saldo(),
    por_tipo: group_stats(scope.select(&ops), GroupField::TipoOperacion),
    scope,
  }))
}
