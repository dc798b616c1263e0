//! Serde-deserializable types matching portal API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Game, RatingRecord};

#[derive(Debug, Deserialize)]
pub struct ApiFavoriteStatus {
  pub favorited: bool,
}

#[derive(Debug, Deserialize)]
pub struct ApiGame {
  pub id: u64,
  pub name: String,
  #[serde(rename = "imageUrl")]
  pub image_url: Option<String>,
  #[serde(rename = "modCount", default)]
  pub mod_count: u32,
  #[serde(default)]
  pub rating: f32,
}

impl From<ApiGame> for Game {
  fn from(api: ApiGame) -> Self {
    Game {
      id: api.id,
      name: api.name,
      image_url: api.image_url,
      mod_count: api.mod_count,
      rating: api.rating,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiRating {
  pub score: Option<u8>,
  #[serde(rename = "ratedAt")]
  pub rated_at: Option<DateTime<Utc>>,
}

impl From<ApiRating> for RatingRecord {
  fn from(api: ApiRating) -> Self {
    RatingRecord {
      score: api.score,
      rated_at: api.rated_at,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct ApiSetRating {
  pub score: u8,
}

#[derive(Debug, Deserialize)]
pub struct ApiSavedMod {
  pub id: u64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_game_deserializes_with_missing_optionals() {
    let game: ApiGame = serde_json::from_str(r#"{"id": 3, "name": "Skyrim"}"#).unwrap();
    let game: Game = game.into();
    assert_eq!(game.id, 3);
    assert_eq!(game.image_url, None);
    assert_eq!(game.mod_count, 0);
  }

  #[test]
  fn test_unrated_record_has_absent_score() {
    let rating: ApiRating = serde_json::from_str(r#"{"score": null, "ratedAt": null}"#).unwrap();
    let record: RatingRecord = rating.into();
    assert_eq!(record, RatingRecord::unrated());
  }

  #[test]
  fn test_rating_round_trips_timestamp() {
    let rating: ApiRating =
      serde_json::from_str(r#"{"score": 4, "ratedAt": "2026-08-01T12:00:00Z"}"#).unwrap();
    let record: RatingRecord = rating.into();
    assert_eq!(record.score, Some(4));
    assert!(record.rated_at.is_some());
  }
}
