//! The process-wide cache store and its invalidation events.

use parking_lot::Mutex;
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::debug;

use super::cell::CacheCell;
use crate::config::CacheConfig;
use crate::identity::IdentitySnapshot;
use crate::types::{Game, GameId, ModId, RatingRecord, UserId};

/// Pushed to subscribers whenever shared state changes, so that UI surfaces
/// converge without waiting for their next unrelated re-render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
  FavoriteChanged { game_id: GameId, favorited: bool },
  FavoriteListInvalidated,
  RatingChanged { mod_id: ModId, score: Option<u8> },
  SavedChanged { mod_id: ModId, saved: bool },
  IdentityChanged { user_id: Option<UserId> },
  CachesCleared,
}

/// Owns every cache cell in the process, plus the memoized identity snapshot.
///
/// Constructed once per session by the embedder and injected into the
/// subsystems; consumers only hold keys and event receivers, never entries.
pub struct CacheStore {
  favorite_status: CacheCell<GameId, bool>,
  favorite_list: CacheCell<UserId, Vec<Game>>,
  ratings: CacheCell<ModId, RatingRecord>,
  saved_mods: CacheCell<UserId, HashSet<ModId>>,
  identity: Mutex<Option<IdentitySnapshot>>,
  events: broadcast::Sender<StateEvent>,
}

impl CacheStore {
  pub fn new(config: &CacheConfig) -> Self {
    let (events, _) = broadcast::channel(config.event_capacity);
    Self {
      favorite_status: CacheCell::new("favorite_status", config.favorite_ttl()),
      favorite_list: CacheCell::new("favorite_list", config.favorite_ttl()),
      ratings: CacheCell::new("ratings", config.rating_ttl()),
      saved_mods: CacheCell::new("saved_mods", config.saved_ttl()),
      identity: Mutex::new(None),
      events,
    }
  }

  pub fn favorite_status(&self) -> &CacheCell<GameId, bool> {
    &self.favorite_status
  }

  pub fn favorite_list(&self) -> &CacheCell<UserId, Vec<Game>> {
    &self.favorite_list
  }

  pub fn ratings(&self) -> &CacheCell<ModId, RatingRecord> {
    &self.ratings
  }

  pub fn saved_mods(&self) -> &CacheCell<UserId, HashSet<ModId>> {
    &self.saved_mods
  }

  pub(crate) fn identity_slot(&self) -> &Mutex<Option<IdentitySnapshot>> {
    &self.identity
  }

  /// Subscribe to state-change events.
  pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
    self.events.subscribe()
  }

  /// Publish an event to all current subscribers. Dropped silently when
  /// nobody is listening.
  pub(crate) fn publish(&self, event: StateEvent) {
    let _ = self.events.send(event);
  }

  /// Invalidate the three remote-backed caches, leaving the identity
  /// snapshot alone. Used when the snapshot itself just changed.
  pub(crate) fn invalidate_downstream(&self) {
    self.favorite_status.invalidate_all();
    self.favorite_list.invalidate_all();
    self.ratings.invalidate_all();
    self.saved_mods.invalidate_all();
  }

  /// Clear everything, synchronously: every cell and the identity snapshot.
  /// The logout hook of the identity provider must call this.
  pub fn clear_all(&self) {
    debug!("clearing all state caches");
    self.invalidate_downstream();
    *self.identity.lock() = None;
    self.publish(StateEvent::CachesCleared);
  }
}
