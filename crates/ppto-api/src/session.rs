//! In-process session store: opaque random tokens mapped to identities with
//! an expiry.

use std::{
  collections::HashMap,
  sync::{Mutex, PoisonError},
};

use chrono::{DateTime, TimeDelta, Utc};
use ppto_core::user::Identity;
use rand_core::{OsRng, RngCore};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "ppto_session";

#[derive(Debug, Clone)]
pub struct Session {
  pub identity:   Identity,
  pub expires_at: DateTime<Utc>,
}

/// Token → [`Session`] map. Expired sessions are evicted when looked up and
/// by [`SessionStore::purge_expired`].
#[derive(Debug)]
pub struct SessionStore {
  ttl:      TimeDelta,
  sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
  pub fn new(ttl: TimeDelta) -> Self {
    Self { ttl, sessions: Mutex::new(HashMap::new()) }
  }

  pub fn ttl(&self) -> TimeDelta { self.ttl }

  /// Start a session for `identity` and return its token.
  pub fn issue(&self, identity: Identity) -> String {
    let token = new_token();
    let session = Session { identity, expires_at: Utc::now() + self.ttl };
    self.lock().insert(token.clone(), session);
    token
  }

  /// The identity behind `token`, if the session exists and has not expired.
  pub fn get(&self, token: &str) -> Option<Identity> { self.get_at(token, Utc::now()) }

  fn get_at(&self, token: &str, now: DateTime<Utc>) -> Option<Identity> {
    let mut sessions = self.lock();
    match sessions.get(token) {
      Some(s) if s.expires_at > now => Some(s.identity.clone()),
      Some(_) => {
        sessions.remove(token);
        None
      }
      None => None,
    }
  }

  /// End a session. Returns `false` if the token was unknown.
  pub fn revoke(&self, token: &str) -> bool { self.lock().remove(token).is_some() }

  /// Drop every expired session, returning how many were removed.
  pub fn purge_expired(&self) -> usize { self.purge_at(Utc::now()) }

  fn purge_at(&self, now: DateTime<Utc>) -> usize {
    let mut sessions = self.lock();
    let before = sessions.len();
    sessions.retain(|_, s| s.expires_at > now);
    before - sessions.len()
  }

  pub fn len(&self) -> usize { self.lock().len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Session>> {
    self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// 32 random bytes, hex-encoded.
fn new_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

#[cfg(test)]
mod tests {
  use ppto_core::user::Role;

  use super::*;

  fn alice() -> Identity {
    Identity {
      username:     "alice".into(),
      display_name: "Alice".into(),
      role:         Role::User,
    }
  }

  #[test]
  fn tokens_are_random_hex() {
    let store = SessionStore::new(TimeDelta::hours(1));
    let a = store.issue(alice());
    let b = store.issue(alice());
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(a, b);
    assert_eq!(store.len(), 2);
  }

  #[test]
  fn lookup_and_revoke() {
    let store = SessionStore::new(TimeDelta::hours(1));
    let token = store.issue(alice());
    assert_eq!(store.get(&token), Some(alice()));
    assert!(store.get("nope").is_none());
    assert!(store.revoke(&token));
    assert!(!store.revoke(&token));
    assert!(store.get(&token).is_none());
  }

  #[test]
  fn expired_sessions_are_evicted() {
    let store = SessionStore::new(TimeDelta::minutes(30));
    let token = store.issue(alice());
    let later = Utc::now() + TimeDelta::hours(1);

    assert!(store.get_at(&token, later).is_none());
    assert!(store.is_empty());

    store.issue(alice());
    store.issue(alice());
    assert_eq!(store.purge_at(later), 2);
    assert_eq!(store.purge_expired(), 0);
  }
}
