//! JSON HTTP API for the budget-execution tracker.
//!
//! Exposes an axum [`Router`] backed by any [`ppto_core::store::BudgetStore`].
//! Sessions are cookie-based and held in process; TLS and static assets are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", ppto_api::api_router(AppState::new(store, ApiConfig::default())))
//! ```

pub mod auth;
pub mod centros;
pub mod data;
pub mod error;
pub mod save;
pub mod session;
pub mod sheet;
pub mod summary;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  extract::{DefaultBodyLimit, Query, rejection::QueryRejection},
  routing::{delete, get, post},
};
use chrono::TimeDelta;
use ppto_core::{aggregate::Scope, operation::Classifier, store::BudgetStore};
use serde::{Deserialize, de::DeserializeOwned};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
use session::SessionStore;

/// Upper bound on request bodies, spreadsheet uploads included.
const BODY_LIMIT: usize = 8 * 1024 * 1024;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Behavior knobs the HTTP layer needs from the server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub session_ttl:           TimeDelta,
  /// Let authorized directory users sign in without a password check.
  pub trust_directory_users: bool,
  /// Add `Secure` to the session cookie.
  pub secure_cookies:        bool,
  pub classifier:            Classifier,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      session_ttl:           TimeDelta::hours(24),
      trust_directory_users: true,
      secure_cookies:        false,
      classifier:            Classifier::default(),
    }
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: BudgetStore> {
  pub store:    Arc<S>,
  pub sessions: Arc<SessionStore>,
  pub config:   Arc<ApiConfig>,
}

impl<S: BudgetStore> AppState<S> {
  pub fn new(store: S, config: ApiConfig) -> Self {
    Self {
      store:    Arc::new(store),
      sessions: Arc::new(SessionStore::new(config.session_ttl)),
      config:   Arc::new(config),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: BudgetStore + Clone + Send + Sync + 'static,
{
  Router::new()
    // Session and accounts
    .route(
      "/auth",
      get(auth::status::<S>).post(auth::login::<S>).delete(auth::logout::<S>),
    )
    .route(
      "/auth/users",
      get(users::list::<S>).post(users::add::<S>).delete(users::remove::<S>),
    )
    .route("/auth/change-password", post(auth::change_password::<S>))
    // Data
    .route("/data", get(data::snapshot::<S>))
    .route("/save", post(save::handler::<S>))
    .route("/summary", get(summary::handler::<S>))
    .route("/centros", get(centros::list::<S>).post(centros::create::<S>))
    .route("/centros/{id}", delete(centros::remove::<S>))
    // Spreadsheets
    .route("/export/{dataset}", get(sheet::export::<S>))
    .route("/import/{dataset}", post(sheet::import::<S>))
    .layer(DefaultBodyLimit::max(BODY_LIMIT))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Shared extract helpers ──────────────────────────────────────────────────

/// Decode a JSON body, reporting malformed input as a validation error.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
  serde_json::from_slice(body)
    .map_err(|e| ApiError::Validation(format!("invalid JSON body: {e}")))
}

/// Unwrap a query extractor, reporting malformed parameters as a validation
/// error.
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
  query
    .map(|Query(params)| params)
    .map_err(|e| ApiError::Validation(e.body_text()))
}

/// `?ejercicio=&centro_gestor=` query parameters shared by scope-bound
/// routes.
#[derive(Debug, Default, Deserialize)]
pub struct ScopeParams {
  pub ejercicio:     Option<i32>,
  pub centro_gestor: Option<String>,
}

impl ScopeParams {
  pub fn scope(&self) -> Result<Scope, ApiError> {
    let ejercicio = self
      .ejercicio
      .ok_or_else(|| ApiError::Validation("ejercicio is required".into()))?;
    let centro = self
      .centro_gestor
      .as_deref()
      .map(str::trim)
      .filter(|c| !c.is_empty())
      .ok_or_else(|| ApiError::Validation("centro_gestor is required".into()))?;
    Ok(Scope::new(ejercicio, centro))
  }
}

#[cfg(test)]
mod tests;
