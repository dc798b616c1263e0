//! Shared client-side state synchronization for the mod portal UI.
//!
//! Many independently-rendered surfaces (cards, lists, modals) need to agree
//! on the same server-owned per-user state: "is game G a favorite", "what
//! did I rate mod M", "is mod M saved", "do I own mod M". This crate keeps
//! them in agreement without each surface refetching on every render:
//!
//! - TTL-bounded caches with request coalescing (one network call per key
//!   per staleness window, no matter how many surfaces mount at once)
//! - write-through mutations that make the local cache authoritative only
//!   after the server accepts the write
//! - broadcast invalidation events so a toggle in one surface is visible to
//!   every other surface without waiting for a re-render
//! - identity as a dependency edge: a user change or logout invalidates
//!   every downstream cache synchronously
//!
//! The rendering layer, routing, session mechanics, and the endpoint
//! implementations live elsewhere; they meet this crate at the
//! [`remote`] API traits and the [`identity::IdentityProvider`] trait.

pub mod cache;
pub mod config;
pub mod error;
pub mod favorites;
pub mod identity;
pub mod ratings;
pub mod remote;
pub mod saved;
pub mod types;

use std::sync::Arc;
use tokio::sync::broadcast;

pub use cache::{CacheStore, StateEvent};
pub use config::{CacheConfig, Config};
pub use error::StateError;
pub use favorites::Favorites;
pub use identity::{Identity, IdentityProvider, IdentitySnapshot, StaticIdentity};
pub use ratings::Ratings;
pub use saved::UserStatus;
pub use types::{Authored, Game, GameId, ModId, ModSummary, RatingRecord, UserId};

use remote::{FavoritesApi, RatingsApi, SavedModsApi};

/// The consumer-facing entry point: one shared store wired into the three
/// subsystems over a single remote client.
///
/// Constructed once per process/session; clones of the subsystem handles all
/// observe the same cache state.
pub struct StateSync<C> {
  store: Arc<CacheStore>,
  identity: Identity,
  favorites: Favorites<C>,
  ratings: Ratings<C>,
  status: UserStatus<C>,
}

impl<C> StateSync<C>
where
  C: FavoritesApi + RatingsApi + SavedModsApi + 'static,
{
  pub fn new(
    client: Arc<C>,
    provider: Arc<dyn IdentityProvider>,
    config: &CacheConfig,
  ) -> Self {
    let store = Arc::new(CacheStore::new(config));
    let identity = Identity::new(provider, Arc::clone(&store), config.identity_ttl());

    Self {
      favorites: Favorites::new(Arc::clone(&client), Arc::clone(&store), identity.clone()),
      ratings: Ratings::new(Arc::clone(&client), Arc::clone(&store), identity.clone()),
      status: UserStatus::new(client, Arc::clone(&store), identity.clone()),
      identity,
      store,
    }
  }

  pub fn favorites(&self) -> &Favorites<C> {
    &self.favorites
  }

  pub fn ratings(&self) -> &Ratings<C> {
    &self.ratings
  }

  pub fn status(&self) -> &UserStatus<C> {
    &self.status
  }

  pub fn identity(&self) -> &Identity {
    &self.identity
  }

  pub fn store(&self) -> &CacheStore {
    &self.store
  }

  /// Subscribe to state-change events for push invalidation.
  pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
    self.store.subscribe()
  }

  /// Logout hook: synchronously clear every cache and the identity snapshot.
  pub fn clear_all_caches(&self) {
    self.store.clear_all();
  }
}
