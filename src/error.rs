//! Error taxonomy for state-layer operations.
//!
//! Domain operations never let transport failures escape unmapped: every
//! error a UI surface can observe is one of these variants, each carrying a
//! user-presentable message via `Display`. The type is `Clone` so that
//! callers coalesced onto a single in-flight fetch can all receive the same
//! failure.

use thiserror::Error;

/// Errors surfaced by the state-synchronization layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
  /// The operation requires a session and none exists. No network call was
  /// attempted.
  #[error("sign in to do that")]
  Unauthenticated,

  /// A network call was attempted and the server rejected the session.
  #[error("your session has expired, please sign in again")]
  SessionExpired,

  /// Network or server failure unrelated to authentication; safe to retry.
  #[error("something went wrong, please try again: {0}")]
  Transient(String),

  /// Rating score outside `1..=5`, rejected before any network call.
  #[error("invalid rating score {0}, must be between 1 and 5")]
  InvalidScore(u8),

  /// Configuration could not be loaded or parsed.
  #[error("configuration error: {0}")]
  Config(String),
}

impl StateError {
  /// Whether this failure came from a rejected session, as opposed to a
  /// generic transport problem.
  pub fn is_session_expired(&self) -> bool {
    matches!(self, StateError::SessionExpired)
  }
}
