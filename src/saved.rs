//! User-scoped status subsystem: ownership and the saved-mod set.
//!
//! List surfaces mount many mod cards at once and each asks "is this mine /
//! is this saved"; this facade answers both from one identity snapshot and
//! one saved-set cache entry. Ownership is a pure derivation and is never
//! cached. The saved set uses incremental membership mutation on toggle
//! (unlike the favorites list, which is blanket-invalidated): it is toggled
//! frequently from many surfaces, and replacing one membership bit does not
//! warrant refetching the whole set.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheStore, StateEvent};
use crate::error::StateError;
use crate::identity::Identity;
use crate::remote::SavedModsApi;
use crate::types::{Authored, ModId, UserId};

pub struct UserStatus<C> {
  client: Arc<C>,
  store: Arc<CacheStore>,
  identity: Identity,
}

impl<C: SavedModsApi + 'static> UserStatus<C> {
  pub fn new(client: Arc<C>, store: Arc<CacheStore>, identity: Identity) -> Self {
    Self {
      client,
      store,
      identity,
    }
  }

  /// Whether the current user created `entity`. Pure and uncached: O(1) and
  /// must never go stale relative to identity changes.
  pub fn is_owner<E: Authored>(&self, entity: &E) -> bool {
    let snap = self.identity.snapshot();
    match (entity.creator_id(), snap.user_id) {
      (Some(creator), Some(user)) if snap.authenticated => creator == user,
      _ => false,
    }
  }

  /// Whether `mod_id` is in the current user's saved set.
  ///
  /// Unauthenticated users always get `false` without a network call.
  pub async fn is_saved(&self, mod_id: ModId) -> Result<bool, StateError> {
    let snap = self.identity.snapshot();
    let user_id = match snap.user_id {
      Some(id) if snap.authenticated => id,
      _ => return Ok(false),
    };

    let set = self.load_saved(user_id).await?;
    Ok(set.contains(&mod_id))
  }

  /// Toggle whether `mod_id` is saved, returning the new membership.
  ///
  /// On success the resident set is mutated in place; when no set is
  /// resident the cell is invalidated so the next read refetches. On failure
  /// the set is left unchanged, so the previous membership remains current.
  pub async fn toggle_saved(&self, mod_id: ModId) -> Result<bool, StateError> {
    let snap = self.identity.snapshot();
    let user_id = match snap.user_id {
      Some(id) if snap.authenticated => id,
      _ => return Err(StateError::Unauthenticated),
    };

    let current = match self.store.saved_mods().peek(&user_id) {
      Some(set) => set.contains(&mod_id),
      None => self.is_saved(mod_id).await?,
    };
    let next = !current;

    let result = if next {
      self.client.save_mod(mod_id).await
    } else {
      self.client.unsave_mod(mod_id).await
    };
    if let Err(err) = result {
      self.identity.handle_remote_error(&err);
      return Err(err);
    }

    debug!(mod_id, saved = next, "saved-mod set updated");
    let mutated = self.store.saved_mods().mutate(&user_id, |set| {
      if next {
        set.insert(mod_id);
      } else {
        set.remove(&mod_id);
      }
    });
    if !mutated {
      self.store.saved_mods().invalidate(&user_id);
    }
    self.store.publish(StateEvent::SavedChanged {
      mod_id,
      saved: next,
    });

    Ok(next)
  }

  /// Batch ownership derivation over `entities`, keyed by entity id.
  /// A pure projection; never fetches.
  pub fn ownership_map<E: Authored>(&self, entities: &[E]) -> HashMap<ModId, bool> {
    let snap = self.identity.snapshot();
    let user = if snap.authenticated { snap.user_id } else { None };

    entities
      .iter()
      .map(|entity| {
        let owned = match (entity.creator_id(), user) {
          (Some(creator), Some(user)) => creator == user,
          _ => false,
        };
        (entity.entity_id(), owned)
      })
      .collect()
  }

  /// Batch saved-membership lookup over `mod_ids`, from resident cache state
  /// only. Never fetches; a non-resident set answers `false` for every id.
  pub fn saved_map(&self, mod_ids: &[ModId]) -> HashMap<ModId, bool> {
    let snap = self.identity.snapshot();
    let resident = match snap.user_id {
      Some(id) if snap.authenticated => self.store.saved_mods().peek(&id),
      _ => None,
    };

    mod_ids
      .iter()
      .map(|id| {
        let saved = resident.as_ref().is_some_and(|set| set.contains(id));
        (*id, saved)
      })
      .collect()
  }

  /// Force the identity snapshot and the saved set to be re-derived now.
  /// Used after login/logout transitions.
  pub async fn refresh(&self) -> Result<(), StateError> {
    let snap = self.identity.refresh();
    if let Some(user_id) = snap.user_id {
      if snap.authenticated {
        self.store.saved_mods().invalidate(&user_id);
        self.load_saved(user_id).await?;
      }
    }
    Ok(())
  }

  async fn load_saved(&self, user_id: UserId) -> Result<HashSet<ModId>, StateError> {
    let client = Arc::clone(&self.client);
    self
      .store
      .saved_mods()
      .read(user_id, move || async move { client.saved_mods().await })
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use parking_lot::Mutex;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use crate::config::CacheConfig;
  use crate::identity::StaticIdentity;
  use crate::types::ModSummary;

  #[derive(Default)]
  struct MockPortal {
    saved: Mutex<HashSet<ModId>>,
    list_calls: AtomicUsize,
    write_calls: AtomicUsize,
    fail_writes: Mutex<Option<StateError>>,
  }

  #[async_trait]
  impl SavedModsApi for MockPortal {
    async fn saved_mods(&self) -> Result<HashSet<ModId>, StateError> {
      self.list_calls.fetch_add(1, Ordering::SeqCst);
      Ok(self.saved.lock().clone())
    }

    async fn save_mod(&self, mod_id: ModId) -> Result<(), StateError> {
      self.write_calls.fetch_add(1, Ordering::SeqCst);
      if let Some(err) = self.fail_writes.lock().clone() {
        return Err(err);
      }
      self.saved.lock().insert(mod_id);
      Ok(())
    }

    async fn unsave_mod(&self, mod_id: ModId) -> Result<(), StateError> {
      self.write_calls.fetch_add(1, Ordering::SeqCst);
      if let Some(err) = self.fail_writes.lock().clone() {
        return Err(err);
      }
      self.saved.lock().remove(&mod_id);
      Ok(())
    }
  }

  fn subsystem(
    user: Option<u64>,
  ) -> (UserStatus<MockPortal>, Arc<MockPortal>, Arc<StaticIdentity>) {
    let client = Arc::new(MockPortal::default());
    let store = Arc::new(CacheStore::new(&CacheConfig::default()));
    let provider = Arc::new(StaticIdentity::new(user));
    let identity = Identity::new(
      provider.clone(),
      store.clone(),
      CacheConfig::default().identity_ttl(),
    );
    (
      UserStatus::new(client.clone(), store, identity),
      client,
      provider,
    )
  }

  fn mod_by(id: ModId, creator: Option<UserId>) -> ModSummary {
    ModSummary {
      id,
      name: format!("Mod {}", id),
      creator_id: creator,
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_ownership_is_pure_comparison() {
    let (status, _, provider) = subsystem(Some(7));
    assert!(status.is_owner(&mod_by(1, Some(7))));
    assert!(!status.is_owner(&mod_by(2, Some(8))));
    assert!(!status.is_owner(&mod_by(3, None)));

    provider.sign_out();
    let snap = status.identity.refresh();
    assert!(!snap.authenticated);
    assert!(!status.is_owner(&mod_by(1, Some(7))));
  }

  #[tokio::test(start_paused = true)]
  async fn test_unauthenticated_saved_defaults() {
    let (status, client, _) = subsystem(None);
    assert!(!status.is_saved(9).await.unwrap());
    assert_eq!(
      status.toggle_saved(9).await,
      Err(StateError::Unauthenticated)
    );
    assert_eq!(client.list_calls.load(Ordering::SeqCst), 0);
    assert_eq!(client.write_calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_toggle_mutates_set_without_refetch() {
    let (status, client, _) = subsystem(Some(1));
    client.saved.lock().insert(7);

    assert!(status.is_saved(7).await.unwrap());
    assert_eq!(client.list_calls.load(Ordering::SeqCst), 1);

    // Save 9, unsave 7; the resident set is edited in place
    assert!(status.toggle_saved(9).await.unwrap());
    assert!(!status.toggle_saved(7).await.unwrap());
    assert!(status.is_saved(9).await.unwrap());
    assert!(!status.is_saved(7).await.unwrap());
    assert_eq!(client.list_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_toggle_with_cold_cache_reads_through_once() {
    let (status, client, _) = subsystem(Some(1));
    assert!(status.toggle_saved(9).await.unwrap());
    assert_eq!(client.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.write_calls.load(Ordering::SeqCst), 1);
    assert!(status.is_saved(9).await.unwrap());
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_toggle_keeps_previous_membership() {
    let (status, client, _) = subsystem(Some(1));
    client.saved.lock().insert(7);
    assert!(status.is_saved(7).await.unwrap());

    *client.fail_writes.lock() = Some(StateError::Transient("portal down".into()));
    assert!(status.toggle_saved(7).await.is_err());
    assert!(status.is_saved(7).await.unwrap());
  }

  #[tokio::test(start_paused = true)]
  async fn test_saved_map_projects_resident_set_only() {
    let (status, client, _) = subsystem(Some(1));
    client.saved.lock().extend([7, 9]);

    // Nothing resident yet: all false, and no fetch was triggered
    let map = status.saved_map(&[7, 8, 9]);
    assert_eq!(client.list_calls.load(Ordering::SeqCst), 0);
    assert!(map.values().all(|saved| !saved));

    status.is_saved(7).await.unwrap();
    let map = status.saved_map(&[7, 8, 9]);
    assert_eq!(map[&7], true);
    assert_eq!(map[&8], false);
    assert_eq!(map[&9], true);
    assert_eq!(client.list_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_ownership_map_batches_without_fetch() {
    let (status, client, _) = subsystem(Some(7));
    let entities = vec![mod_by(1, Some(7)), mod_by(2, Some(8)), mod_by(3, None)];
    let map = status.ownership_map(&entities);
    assert_eq!(map[&1], true);
    assert_eq!(map[&2], false);
    assert_eq!(map[&3], false);
    assert_eq!(client.list_calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_refresh_refetches_set() {
    let (status, client, _) = subsystem(Some(1));
    status.is_saved(7).await.unwrap();

    client.saved.lock().insert(7);
    status.refresh().await.unwrap();
    assert!(status.is_saved(7).await.unwrap());
    assert_eq!(client.list_calls.load(Ordering::SeqCst), 2);
  }
}
