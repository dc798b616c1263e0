//! Favorite games subsystem.
//!
//! Two sub-caches kept consistent with each other: a per-game boolean status
//! cell and a single-key (per user) favorites list cell. A successful toggle
//! writes the new status for that game and blanket-invalidates the list, so
//! the next list read refetches instead of diverging. The list is small and
//! rarely mutated; blanket invalidation is the chosen policy for it (the
//! saved-mod set in [`crate::saved`] deliberately uses incremental mutation
//! instead).

use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheStore, StateEvent};
use crate::error::StateError;
use crate::identity::Identity;
use crate::remote::FavoritesApi;
use crate::types::{Game, GameId};

pub struct Favorites<C> {
  client: Arc<C>,
  store: Arc<CacheStore>,
  identity: Identity,
}

impl<C: FavoritesApi + 'static> Favorites<C> {
  pub fn new(client: Arc<C>, store: Arc<CacheStore>, identity: Identity) -> Self {
    Self {
      client,
      store,
      identity,
    }
  }

  /// Whether the current user has favorited `game_id`.
  ///
  /// Unauthenticated users always get `false` without a network call.
  pub async fn is_favorite(&self, game_id: GameId) -> Result<bool, StateError> {
    if !self.identity.snapshot().authenticated {
      return Ok(false);
    }

    let client = Arc::clone(&self.client);
    self
      .store
      .favorite_status()
      .read(game_id, move || async move {
        client.favorite_status(game_id).await
      })
      .await
  }

  /// Toggle the favorite status of `game_id`, returning the new status.
  ///
  /// Exactly one write call is made, in the direction chosen by the current
  /// cached status (read through once when nothing is resident). The local
  /// cache is only touched after the server accepts the write.
  pub async fn toggle_favorite(&self, game_id: GameId) -> Result<bool, StateError> {
    if !self.identity.snapshot().authenticated {
      return Err(StateError::Unauthenticated);
    }

    let current = match self.store.favorite_status().peek(&game_id) {
      Some(status) => status,
      None => self.is_favorite(game_id).await?,
    };
    let next = !current;

    let result = if next {
      self.client.add_favorite(game_id).await
    } else {
      self.client.remove_favorite(game_id).await
    };
    if let Err(err) = result {
      self.identity.handle_remote_error(&err);
      return Err(err);
    }

    debug!(game_id, favorited = next, "favorite toggled");
    self.store.favorite_status().write(game_id, next);
    self.store.favorite_list().invalidate_all();
    self.store.publish(StateEvent::FavoriteChanged {
      game_id,
      favorited: next,
    });
    self.store.publish(StateEvent::FavoriteListInvalidated);

    Ok(next)
  }

  /// The current user's favorited games, in server order.
  pub async fn list_favorites(&self) -> Result<Vec<Game>, StateError> {
    let snap = self.identity.snapshot();
    let user_id = match snap.user_id {
      Some(id) if snap.authenticated => id,
      _ => return Ok(Vec::new()),
    };

    let client = Arc::clone(&self.client);
    self
      .store
      .favorite_list()
      .read(user_id, move || async move { client.favorite_list().await })
      .await
  }

  /// Invalidate and re-read the favorites list. Used by a surface after it
  /// performs a mutation of its own.
  pub async fn refresh(&self) -> Result<Vec<Game>, StateError> {
    if let Some(user_id) = self.identity.snapshot().user_id {
      self.store.favorite_list().invalidate(&user_id);
    }
    self.list_favorites().await
  }

  /// Case-insensitive substring search over the current favorites list.
  /// Recomputed per call, never separately cached.
  pub async fn search_favorites(&self, term: &str) -> Result<Vec<Game>, StateError> {
    let games = self.list_favorites().await?;
    Ok(filter_games(&games, term))
  }
}

fn filter_games(games: &[Game], term: &str) -> Vec<Game> {
  let needle = term.trim().to_lowercase();
  if needle.is_empty() {
    return games.to_vec();
  }
  games
    .iter()
    .filter(|game| game.name.to_lowercase().contains(&needle))
    .cloned()
    .collect()
}
