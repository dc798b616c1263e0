//! Portal REST API client.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use super::api_types::{ApiFavoriteStatus, ApiGame, ApiRating, ApiSavedMod, ApiSetRating};
use super::{FavoritesApi, RatingsApi, SavedModsApi};
use crate::config::ApiConfig;
use crate::error::StateError;
use crate::types::{Game, GameId, ModId, RatingRecord};

/// HTTP implementation of the remote resource client.
#[derive(Clone)]
pub struct PortalClient {
  client: reqwest::Client,
  base: Url,
  token: String,
}

impl PortalClient {
  pub fn new(config: &ApiConfig, token: String) -> Result<Self, StateError> {
    let base = Url::parse(&config.url)
      .map_err(|e| StateError::Config(format!("invalid API url {}: {}", config.url, e)))?;

    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| StateError::Config(format!("failed to build HTTP client: {}", e)))?;

    Ok(Self {
      client,
      base,
      token,
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url, StateError> {
    self
      .base
      .join(path)
      .map_err(|e| StateError::Transient(format!("invalid endpoint {}: {}", path, e)))
  }

  async fn send(
    &self,
    request: reqwest::RequestBuilder,
    context: &str,
  ) -> Result<reqwest::Response, StateError> {
    let response = request
      .bearer_auth(&self.token)
      .send()
      .await
      .map_err(|e| StateError::Transient(format!("{}: {}", context, e)))?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
      debug!(context, %status, "portal rejected session");
      return Err(StateError::SessionExpired);
    }
    if !status.is_success() {
      return Err(StateError::Transient(format!(
        "{}: server returned {}",
        context, status
      )));
    }

    Ok(response)
  }
}

#[async_trait]
impl FavoritesApi for PortalClient {
  async fn favorite_status(&self, game_id: GameId) -> Result<bool, StateError> {
    let url = self.endpoint(&format!("games/{}/favorite", game_id))?;
    let response = self
      .send(self.client.get(url), "get favorite status")
      .await?;

    let status: ApiFavoriteStatus = response
      .json()
      .await
      .map_err(|e| StateError::Transient(format!("failed to parse favorite status: {}", e)))?;
    Ok(status.favorited)
  }

  async fn favorite_list(&self) -> Result<Vec<Game>, StateError> {
    let url = self.endpoint("user/favorites")?;
    let response = self.send(self.client.get(url), "list favorites").await?;

    let games: Vec<ApiGame> = response
      .json()
      .await
      .map_err(|e| StateError::Transient(format!("failed to parse favorite list: {}", e)))?;
    Ok(games.into_iter().map(Game::from).collect())
  }

  async fn add_favorite(&self, game_id: GameId) -> Result<(), StateError> {
    let url = self.endpoint(&format!("games/{}/favorite", game_id))?;
    self.send(self.client.put(url), "add favorite").await?;
    Ok(())
  }

  async fn remove_favorite(&self, game_id: GameId) -> Result<(), StateError> {
    let url = self.endpoint(&format!("games/{}/favorite", game_id))?;
    self.send(self.client.delete(url), "remove favorite").await?;
    Ok(())
  }
}

#[async_trait]
impl RatingsApi for PortalClient {
  async fn rating(&self, mod_id: ModId) -> Result<RatingRecord, StateError> {
    let url = self.endpoint(&format!("mods/{}/rating", mod_id))?;
    let response = self
      .client
      .get(url)
      .bearer_auth(&self.token)
      .send()
      .await
      .map_err(|e| StateError::Transient(format!("get rating: {}", e)))?;

    match response.status() {
      // The portal answers 404 for mods the user has not rated
      StatusCode::NOT_FOUND => Ok(RatingRecord::unrated()),
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StateError::SessionExpired),
      status if status.is_success() => {
        let rating: ApiRating = response
          .json()
          .await
          .map_err(|e| StateError::Transient(format!("failed to parse rating: {}", e)))?;
        Ok(rating.into())
      }
      status => Err(StateError::Transient(format!(
        "get rating: server returned {}",
        status
      ))),
    }
  }

  async fn set_rating(&self, mod_id: ModId, score: u8) -> Result<(), StateError> {
    let url = self.endpoint(&format!("mods/{}/rating", mod_id))?;
    self
      .send(
        self.client.put(url).json(&ApiSetRating { score }),
        "set rating",
      )
      .await?;
    Ok(())
  }

  async fn delete_rating(&self, mod_id: ModId) -> Result<(), StateError> {
    let url = self.endpoint(&format!("mods/{}/rating", mod_id))?;
    self.send(self.client.delete(url), "delete rating").await?;
    Ok(())
  }
}

#[async_trait]
impl SavedModsApi for PortalClient {
  async fn saved_mods(&self) -> Result<HashSet<ModId>, StateError> {
    let url = self.endpoint("user/saved-mods")?;
    let response = self.send(self.client.get(url), "list saved mods").await?;

    let mods: Vec<ApiSavedMod> = response
      .json()
      .await
      .map_err(|e| StateError::Transient(format!("failed to parse saved mods: {}", e)))?;
    Ok(mods.into_iter().map(|m| m.id).collect())
  }

  async fn save_mod(&self, mod_id: ModId) -> Result<(), StateError> {
    let url = self.endpoint(&format!("mods/{}/save", mod_id))?;
    self.send(self.client.put(url), "save mod").await?;
    Ok(())
  }

  async fn unsave_mod(&self, mod_id: ModId) -> Result<(), StateError> {
    let url = self.endpoint(&format!("mods/{}/save", mod_id))?;
    self.send(self.client.delete(url), "unsave mod").await?;
    Ok(())
  }
}
