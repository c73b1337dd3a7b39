//! Sign-in, session cookies and the extractors that gate every data route.
//!
//! | Method   | Path                    | Notes |
//! |----------|-------------------------|-------|
//! | `POST`   | `/auth`                 | Body: `{"username":"…","password":"…"}`; sets the session cookie |
//! | `GET`    | `/auth`                 | `{"authenticated":false}` without a live session |
//! | `DELETE` | `/auth`                 | Ends the session and clears the cookie |
//! | `POST`   | `/auth/change-password` | Admin only |

use axum::{
  Json,
  extract::{FromRequestParts, State},
  http::{HeaderMap, header, request::Parts},
  response::IntoResponse,
};
use bytes::Bytes;
use ppto_core::{
  credential::{hash_password, verify_password},
  store::BudgetStore,
  user::{Identity, Role},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
  ApiConfig, AppState, error::ApiError, parse_json, session::SESSION_COOKIE,
};

// ─── Credential check ────────────────────────────────────────────────────────

/// Resolve `username` / `password` to an identity.
///
/// Administrators are checked against their argon2 hash. Failing that, an
/// authorized directory user is admitted without a password check when
/// `trust_directory_users` is on.
pub async fn authenticate<S>(
  store: &S,
  config: &ApiConfig,
  username: &str,
  password: &str,
) -> Result<Identity, ApiError>
where
  S: BudgetStore,
{
  let username = username.trim();
  if username.is_empty() {
    return Err(ApiError::Validation("username is required".into()));
  }

  let admin = store
    .get_admin(username.to_owned())
    .await
    .map_err(ApiError::storage)?;
  if let Some(admin) = admin
    && verify_password(password, &admin.password_hash)
  {
    return Ok(Identity {
      username:     admin.username,
      display_name: admin.display_name,
      role:         Role::Admin,
    });
  }

  if config.trust_directory_users {
    let user = store
      .get_authorized_user(username.to_owned())
      .await
      .map_err(ApiError::storage)?;
    if let Some(user) = user {
      let display_name = if user.display_name.trim().is_empty() {
        user.username.clone()
      } else {
        user.display_name
      };
      return Ok(Identity { username: user.username, display_name, role: Role::User });
    }
  }

  tracing::warn!(username, "rejected sign-in");
  Err(ApiError::Auth("invalid credentials".into()))
}

// ─── Cookies ─────────────────────────────────────────────────────────────────

/// The session token from the request's `Cookie` headers, if any.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(name, _)| *name == SESSION_COOKIE)
    .map(|(_, value)| value.to_owned())
    .filter(|value| !value.is_empty())
}

fn session_cookie(token: &str, max_age: i64, secure: bool) -> String {
  let mut cookie =
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
  if secure {
    cookie.push_str("; Secure");
  }
  cookie
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// The identity behind a live session. Rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct CurrentUser {
  pub identity: Identity,
  pub token:    String,
}

impl<S> FromRequestParts<AppState<S>> for CurrentUser
where
  S: BudgetStore + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = session_token(&parts.headers)
      .ok_or_else(|| ApiError::Auth("not authenticated".into()))?;
    let identity = state.sessions.get(&token).ok_or_else(|| {
      tracing::warn!("unknown or expired session");
      ApiError::Auth("session expired".into())
    })?;
    Ok(CurrentUser { identity, token })
  }
}

/// Like [`CurrentUser`], but additionally requires the admin role (403).
#[derive(Debug, Clone)]
pub struct AdminOnly(pub Identity);

impl<S> FromRequestParts<AppState<S>> for AdminOnly
where
  S: BudgetStore + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let CurrentUser { identity, .. } = CurrentUser::from_request_parts(parts, state).await?;
    if !identity.is_admin() {
      tracing::warn!(username = %identity.username, "admin route refused");
      return Err(ApiError::Forbidden("administrator role required".into()));
    }
    Ok(AdminOnly(identity))
  }
}

// ─── Login ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  #[serde(default)]
  pub username: String,
  #[serde(default)]
  pub password: String,
}

/// `POST /auth`
pub async fn login<S>(
  State(state): State<AppState<S>>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  S: BudgetStore + Send + Sync + 'static,
{
  let body: LoginBody = parse_json(&body)?;
  let identity =
    authenticate(state.store.as_ref(), &state.config, &body.username, &body.password).await?;

  state.sessions.purge_expired();
  let token = state.sessions.issue(identity.clone());
  let cookie = session_cookie(
    &token,
    state.sessions.ttl().num_seconds(),
    state.config.secure_cookies,
  );

  tracing::info!(username = %identity.username, role = ?identity.role, "signed in");
  Ok((
    [(header::SET_COOKIE, cookie)],
    Json(json!({ "success": true, "user": identity })),
  ))
}

// ─── Status / logout ─────────────────────────────────────────────────────────

/// `GET /auth`
pub async fn status<S>(State(state): State<AppState<S>>, headers: HeaderMap) -> impl IntoResponse
where
  S: BudgetStore + Send + Sync + 'static,
{
  match session_token(&headers).and_then(|t| state.sessions.get(&t)) {
    Some(identity) => Json(json!({ "authenticated": true, "user": identity })),
    None => Json(json!({ "authenticated": false })),
  }
}

/// `DELETE /auth`
pub async fn logout<S>(State(state): State<AppState<S>>, headers: HeaderMap) -> impl IntoResponse
where
  S: BudgetStore + Send + Sync + 'static,
{
  if let Some(token) = session_token(&headers) {
    state.sessions.revoke(&token);
  }
  (
    [(header::SET_COOKIE, session_cookie("", 0, state.config.secure_cookies))],
    Json(json!({ "success": true })),
  )
}

// ─── Change password ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordBody {
  /// Defaults to the signed-in administrator.
  #[serde(default)]
  pub username:         Option<String>,
  #[serde(default)]
  pub current_password: String,
  #[serde(default)]
  pub new_password:     String,
}

/// `POST /auth/change-password`, body:
/// `{"username":"admin","currentPassword":"…","newPassword":"…"}`
pub async fn change_password<S>(
  State(state): State<AppState<S>>,
  AdminOnly(caller): AdminOnly,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  S: BudgetStore + Send + Sync + 'static,
{
  let body: ChangePasswordBody = parse_json(&body)?;
  let username = body
    .username
    .filter(|u| !u.trim().is_empty())
    .unwrap_or(caller.username);

  let admin = state
    .store
    .get_admin(username.clone())
    .await
    .map_err(ApiError::storage)?
    .ok_or_else(|| ApiError::NotFound(format!("unknown administrator {username:?}")))?;

  if !verify_password(&body.current_password, &admin.password_hash) {
    tracing::warn!(username, "password change with wrong current password");
    return Err(ApiError::Auth("current password is incorrect".into()));
  }
  if body.new_password.is_empty() {
    return Err(ApiError::Validation("newPassword is required".into()));
  }

  let hash = hash_password(&body.new_password)?;
  state
    .store
    .set_admin_password(username.clone(), hash)
    .await
    .map_err(ApiError::storage)?;

  tracing::info!(username, "administrator password changed");
  Ok(Json(json!({ "success": true })))
}
