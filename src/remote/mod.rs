//! Remote resource client: the network side of the state layer.
//!
//! The subsystems consume these traits; the portal's REST API is one
//! implementation ([`http::PortalClient`]), test doubles are another. Every
//! method distinguishes a rejected session ([`StateError::SessionExpired`])
//! from a generic failure ([`StateError::Transient`]) so callers can branch
//! on it.

pub mod api_types;
pub mod http;

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::StateError;
use crate::types::{Game, GameId, ModId, RatingRecord};

/// Reads and writes of the current user's favorite games.
#[async_trait]
pub trait FavoritesApi: Send + Sync {
  async fn favorite_status(&self, game_id: GameId) -> Result<bool, StateError>;
  async fn favorite_list(&self) -> Result<Vec<Game>, StateError>;
  async fn add_favorite(&self, game_id: GameId) -> Result<(), StateError>;
  async fn remove_favorite(&self, game_id: GameId) -> Result<(), StateError>;
}

/// Reads and writes of the current user's per-mod ratings.
#[async_trait]
pub trait RatingsApi: Send + Sync {
  async fn rating(&self, mod_id: ModId) -> Result<RatingRecord, StateError>;
  async fn set_rating(&self, mod_id: ModId, score: u8) -> Result<(), StateError>;
  async fn delete_rating(&self, mod_id: ModId) -> Result<(), StateError>;
}

/// Reads and writes of the current user's saved-mod set.
#[async_trait]
pub trait SavedModsApi: Send + Sync {
  async fn saved_mods(&self) -> Result<HashSet<ModId>, StateError>;
  async fn save_mod(&self, mod_id: ModId) -> Result<(), StateError>;
  async fn unsave_mod(&self, mod_id: ModId) -> Result<(), StateError>;
}
