//! Per-mod rating subsystem.
//!
//! The cache holds one `RatingRecord` per mod. Writes go to the server
//! first; the cache is updated only after the call succeeds, so a failed
//! write can never leave a speculative score behind.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheStore, StateEvent};
use crate::error::StateError;
use crate::identity::Identity;
use crate::remote::RatingsApi;
use crate::types::{ModId, RatingRecord};

pub struct Ratings<C> {
  client: Arc<C>,
  store: Arc<CacheStore>,
  identity: Identity,
}

impl<C: RatingsApi + 'static> Ratings<C> {
  pub fn new(client: Arc<C>, store: Arc<CacheStore>, identity: Identity) -> Self {
    Self {
      client,
      store,
      identity,
    }
  }

  /// The current user's rating of `mod_id`; an absent score means unrated.
  ///
  /// Unauthenticated users get the unrated record without a network call.
  pub async fn get_user_rating(&self, mod_id: ModId) -> Result<RatingRecord, StateError> {
    if !self.identity.snapshot().authenticated {
      return Ok(RatingRecord::unrated());
    }

    let client = Arc::clone(&self.client);
    self
      .store
      .ratings()
      .read(mod_id, move || async move { client.rating(mod_id).await })
      .await
  }

  /// Rate `mod_id` with `score` (1..=5).
  ///
  /// The score is validated locally before any network access.
  pub async fn rate(&self, mod_id: ModId, score: u8) -> Result<(), StateError> {
    if !(1..=5).contains(&score) {
      return Err(StateError::InvalidScore(score));
    }
    if !self.identity.snapshot().authenticated {
      return Err(StateError::Unauthenticated);
    }

    if let Err(err) = self.client.set_rating(mod_id, score).await {
      self.identity.handle_remote_error(&err);
      return Err(err);
    }

    debug!(mod_id, score, "rating stored");
    self.store.ratings().write(
      mod_id,
      RatingRecord {
        score: Some(score),
        rated_at: Some(Utc::now()),
      },
    );
    self.store.publish(StateEvent::RatingChanged {
      mod_id,
      score: Some(score),
    });

    Ok(())
  }

  /// Delete the current user's rating of `mod_id`.
  ///
  /// Returns `Ok(false)` with no delete call when the record says the user
  /// has not rated the mod. That check trusts the cached record, which can
  /// be up to one TTL behind another session's write.
  pub async fn delete_rating(&self, mod_id: ModId) -> Result<bool, StateError> {
    if !self.identity.snapshot().authenticated {
      return Err(StateError::Unauthenticated);
    }

    let current = self.get_user_rating(mod_id).await?;
    if current.score.is_none() {
      return Ok(false);
    }

    if let Err(err) = self.client.delete_rating(mod_id).await {
      self.identity.handle_remote_error(&err);
      return Err(err);
    }

    debug!(mod_id, "rating deleted");
    self.store.ratings().write(mod_id, RatingRecord::unrated());
    self.store.publish(StateEvent::RatingChanged {
      mod_id,
      score: None,
    });

    Ok(true)
  }
}
