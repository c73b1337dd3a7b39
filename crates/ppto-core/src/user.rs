//! User records and the authenticated identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directory user allowed to sign in without a local password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedUser {
  pub username:     String,
  pub display_name: String,
  pub added_at:     DateTime<Utc>,
}

/// A locally authenticated administrator.
#[derive(Debug, Clone)]
pub struct AdminUser {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub display_name:  String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  User,
}

/// Who a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
  pub username:     String,
  pub display_name: String,
  pub role:         Role,
}

impl Identity {
  pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";
pub const DEFAULT_ADMIN_DISPLAY_NAME: &str = "Administrador";
