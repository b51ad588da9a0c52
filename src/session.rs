//! The signed-in identity and its persisted copy.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use crate::api::types::Profile;
use crate::db::{keys, load_json, save_json, PersistentStore};
use crate::error::{SyncError, SyncResult};

/// Bearer token plus the profile it belongs to. Persisted as one document, so the two
/// can never be stored apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub token: String,
  pub profile: Profile,
}

impl Session {
  fn is_valid(&self) -> bool {
    !self.token.trim().is_empty() && !self.profile.email.trim().is_empty()
  }
}

/// Holds the active session and mirrors it to durable storage.
///
/// `clear` only forgets the session and its persisted state. Invalidating caches and
/// pending operations is the owning sync layer's job; it always calls `clear` from its
/// own logout path.
pub struct SessionStore {
  storage: Arc<dyn PersistentStore>,
  active: Mutex<Option<Session>>,
}

impl SessionStore {
  pub fn new(storage: Arc<dyn PersistentStore>) -> Self {
    Self {
      storage,
      active: Mutex::new(None),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Option<Session>> {
    self.active.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Load the persisted session, if any, and make it active.
  ///
  /// Anything unreadable or incomplete is deleted and treated as "no session".
  pub fn restore(&self) -> Option<Session> {
    let restored = match load_json::<Session>(self.storage.as_ref(), keys::SESSION) {
      Ok(Some(session)) if session.is_valid() => Some(session),
      Ok(Some(_)) => {
        warn!("Discarding incomplete persisted session");
        self.discard_persisted();
        None
      }
      Ok(None) => None,
      Err(e) => {
        warn!(error = %e, "Discarding unreadable persisted session");
        self.discard_persisted();
        None
      }
    };

    if let Some(session) = &restored {
      info!(user = %session.profile.email, "Restored session");
    }
    *self.lock() = restored.clone();
    restored
  }

  fn discard_persisted(&self) {
    if let Err(e) = self.storage.remove_all(&[keys::SESSION]) {
      warn!(error = %e, "Failed to remove persisted session");
    }
  }

  /// Persist and activate `session`.
  ///
  /// Nothing becomes active if persisting fails.
  pub fn establish(&self, session: Session) -> SyncResult<()> {
    if !session.is_valid() {
      return Err(SyncError::Decode(
        "auth response is missing a token or email".to_string(),
      ));
    }
    save_json(self.storage.as_ref(), keys::SESSION, &session)?;
    info!(user = %session.profile.email, "Session established");
    *self.lock() = Some(session);
    Ok(())
  }

  /// Forget the active session and wipe every user-scoped key in one step.
  pub fn clear(&self) -> SyncResult<()> {
    *self.lock() = None;
    self.storage.remove_all(&keys::ALL)?;
    Ok(())
  }

  pub fn current(&self) -> Option<Session> {
    self.lock().clone()
  }

  pub fn is_active(&self) -> bool {
    self.lock().is_some()
  }

  /// The bearer token, or `AuthRequired` when nobody is signed in.
  pub fn token(&self) -> SyncResult<String> {
    self
      .lock()
      .as_ref()
      .map(|s| s.token.clone())
      .ok_or(SyncError::AuthRequired)
  }
}
