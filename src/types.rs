//! Domain types shared across the state layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a game on the portal.
pub type GameId = u64;
/// Identifier of a mod on the portal.
pub type ModId = u64;
/// Identifier of a portal user account.
pub type UserId = u64;

/// A game as shown in the favorites list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
  pub id: GameId,
  pub name: String,
  /// Cover image, if the game has one uploaded
  pub image_url: Option<String>,
  pub mod_count: u32,
  /// Aggregate community rating, 0.0 when unrated
  pub rating: f32,
}

/// Summary of a mod for list views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModSummary {
  pub id: ModId,
  pub name: String,
  pub creator_id: Option<UserId>,
}

/// The current user's rating of a single mod.
///
/// `score` absent means the user has not rated the mod; when present it is
/// always in `1..=5`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
  pub score: Option<u8>,
  pub rated_at: Option<DateTime<Utc>>,
}

impl RatingRecord {
  /// Record for a mod the user has not rated.
  pub fn unrated() -> Self {
    Self::default()
  }
}

/// Entities that carry a creator and can be tested for ownership.
pub trait Authored {
  /// Unique identifier of this entity
  fn entity_id(&self) -> ModId;

  /// Account that created the entity, if known
  fn creator_id(&self) -> Option<UserId>;
}

impl Authored for ModSummary {
  fn entity_id(&self) -> ModId {
    self.id
  }

  fn creator_id(&self) -> Option<UserId> {
    self.creator_id
  }
}
