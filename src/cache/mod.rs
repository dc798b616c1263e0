//! Shared caching layer for per-user relational state.
//!
//! This module provides the domain-agnostic caching machinery:
//! - `CacheCell`: a keyed, TTL-bounded value store with request coalescing
//! - `CacheStore`: the one-per-session owner of every cell, with a broadcast
//!   channel pushing invalidation events to subscribed UI surfaces
//!
//! Freshness is bounded by a per-cell TTL; stale values are still served as
//! a best-effort fallback when a refresh fails, never silently dropped.

mod cell;
mod store;

pub use cell::CacheCell;
pub use store::{CacheStore, StateEvent};
