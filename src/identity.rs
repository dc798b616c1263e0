//! Identity snapshotting and identity-driven invalidation.
//!
//! The identity provider is an external collaborator (session storage, token
//! refresh and friends live elsewhere); this module memoizes its answers
//! into an [`IdentitySnapshot`] with a short TTL, and treats the snapshot as
//! a dependency edge: when a re-derivation observes a different user id, all
//! downstream caches are invalidated synchronously rather than each waiting
//! out its own TTL.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::{CacheStore, StateEvent};
use crate::error::StateError;
use crate::types::UserId;

/// Answers "who is signed in right now". Implemented by the embedding
/// application over its session mechanics.
pub trait IdentityProvider: Send + Sync {
  fn is_authenticated(&self) -> bool;
  fn current_user(&self) -> Option<UserId>;
}

/// Memoized read of local session state. Not a cache cell: there is no
/// remote fetch behind it, only a cheap provider call.
#[derive(Debug, Clone)]
pub struct IdentitySnapshot {
  pub user_id: Option<UserId>,
  pub authenticated: bool,
  pub checked_at: Instant,
}

/// Facade over the provider + snapshot slot, shared by every subsystem.
#[derive(Clone)]
pub struct Identity {
  provider: Arc<dyn IdentityProvider>,
  store: Arc<CacheStore>,
  ttl: Duration,
}

impl Identity {
  pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<CacheStore>, ttl: Duration) -> Self {
    Self {
      provider,
      store,
      ttl,
    }
  }

  /// Current identity snapshot, re-derived from the provider when the
  /// memoized one is older than the identity TTL.
  pub fn snapshot(&self) -> IdentitySnapshot {
    {
      let slot = self.store.identity_slot().lock();
      if let Some(snap) = slot.as_ref() {
        if snap.checked_at.elapsed() < self.ttl {
          return snap.clone();
        }
      }
    }
    self.rederive()
  }

  /// Drop the memoized snapshot and re-derive immediately. Used after
  /// login/logout transitions.
  pub fn refresh(&self) -> IdentitySnapshot {
    self.rederive()
  }

  fn rederive(&self) -> IdentitySnapshot {
    let fresh = IdentitySnapshot {
      user_id: self.provider.current_user(),
      authenticated: self.provider.is_authenticated(),
      checked_at: Instant::now(),
    };

    let changed = {
      let mut slot = self.store.identity_slot().lock();
      let changed = match slot.as_ref() {
        Some(prev) => prev.user_id != fresh.user_id,
        None => false,
      };
      *slot = Some(fresh.clone());
      changed
    };

    if changed {
      // A different user is signed in; nothing cached for the previous one
      // may survive.
      info!(user_id = ?fresh.user_id, "identity changed, invalidating downstream caches");
      self.store.invalidate_downstream();
      self.store.publish(StateEvent::IdentityChanged {
        user_id: fresh.user_id,
      });
    }

    fresh
  }

  /// Called by subsystems when a remote call failed because the server no
  /// longer accepts the session. Everything cached under that session is
  /// cleared at once.
  pub(crate) fn handle_remote_error(&self, err: &StateError) {
    if err.is_session_expired() {
      debug!("server rejected session, clearing caches");
      self.store.clear_all();
    }
  }
}

/// In-memory identity provider backed by shared mutable session state.
///
/// Useful for embedding hosts that manage sessions themselves, and for
/// tests.
#[derive(Debug, Default)]
pub struct StaticIdentity {
  user: parking_lot::Mutex<Option<UserId>>,
}

impl StaticIdentity {
  pub fn new(user: Option<UserId>) -> Self {
    Self {
      user: parking_lot::Mutex::new(user),
    }
  }

  pub fn sign_in(&self, user_id: UserId) {
    *self.user.lock() = Some(user_id);
  }

  pub fn sign_out(&self) {
    *self.user.lock() = None;
  }
}

impl IdentityProvider for StaticIdentity {
  fn is_authenticated(&self) -> bool {
    self.user.lock().is_some()
  }

  fn current_user(&self) -> Option<UserId> {
    *self.user.lock()
  }
}
