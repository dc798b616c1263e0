//! The generic TTL-bounded cache cell.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::StateError;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, StateError>>>;

struct Entry<V> {
  value: V,
  fetched_at: Instant,
}

struct CellInner<K, V> {
  entries: HashMap<K, Entry<V>>,
  /// At most one pending fetch per key; joined by every concurrent reader
  in_flight: HashMap<K, SharedFetch<V>>,
  /// Bumped by local writes and invalidations so that a fetch which settles
  /// afterwards discards its now-outdated result instead of storing it
  generations: HashMap<K, u64>,
}

/// A keyed, time-stamped value store shared by every consumer in the process.
///
/// `read` is a read-through with request coalescing: N simultaneous readers
/// of the same key produce exactly one remote call and all receive its
/// result. A failed fetch is never cached; if a previous (possibly stale)
/// entry exists it is served as a best-effort value instead.
pub struct CacheCell<K, V> {
  name: &'static str,
  ttl: Duration,
  inner: Arc<Mutex<CellInner<K, V>>>,
}

impl<K, V> CacheCell<K, V>
where
  K: Clone + Eq + Hash + Send + 'static,
  V: Clone + Send + Sync + 'static,
{
  pub fn new(name: &'static str, ttl: Duration) -> Self {
    Self {
      name,
      ttl,
      inner: Arc::new(Mutex::new(CellInner {
        entries: HashMap::new(),
        in_flight: HashMap::new(),
        generations: HashMap::new(),
      })),
    }
  }

  /// Read the value for `key`, fetching through `fetch` when the entry is
  /// missing or older than the cell's TTL.
  ///
  /// If a fetch for `key` is already pending, the caller joins it rather
  /// than starting a second one.
  pub async fn read<F, Fut>(&self, key: K, fetch: F) -> Result<V, StateError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, StateError>> + Send + 'static,
  {
    let pending = {
      let mut inner = self.inner.lock();

      if let Some(entry) = inner.entries.get(&key) {
        if entry.fetched_at.elapsed() < self.ttl {
          trace!(cell = self.name, "serving fresh entry");
          return Ok(entry.value.clone());
        }
      }

      if let Some(pending) = inner.in_flight.get(&key) {
        trace!(cell = self.name, "joining in-flight fetch");
        pending.clone()
      } else {
        let generation = *inner.generations.entry(key.clone()).or_insert(0);
        let state = Arc::clone(&self.inner);
        let name = self.name;
        let fut_key = key.clone();
        let fut = fetch();

        let pending: SharedFetch<V> = async move {
          let result = fut.await;
          let mut inner = state.lock();
          inner.in_flight.remove(&fut_key);
          if let Ok(value) = &result {
            let current = inner.generations.get(&fut_key).copied().unwrap_or(0);
            if current == generation {
              inner.entries.insert(
                fut_key.clone(),
                Entry {
                  value: value.clone(),
                  fetched_at: Instant::now(),
                },
              );
            } else {
              // A write or invalidation landed while the fetch was airborne;
              // the local value is newer, so the fetch result loses.
              debug!(cell = name, "discarding fetch result superseded by a local write");
            }
          }
          // No entry and no fetch left for this key: nothing to guard
          if !inner.entries.contains_key(&fut_key) {
            inner.generations.remove(&fut_key);
          }
          result
        }
        .boxed()
        .shared();

        inner.in_flight.insert(key.clone(), pending.clone());
        pending
      }
    };

    match pending.await {
      Ok(value) => Ok(value),
      Err(err) => {
        let inner = self.inner.lock();
        match inner.entries.get(&key) {
          Some(entry) => {
            warn!(cell = self.name, error = %err, "fetch failed, serving last known value");
            Ok(entry.value.clone())
          }
          None => Err(err),
        }
      }
    }
  }

  /// Unconditionally overwrite the entry for `key` with a fresh timestamp.
  ///
  /// Used after a successful mutation to make the local cache authoritative
  /// without waiting for the next TTL-driven read.
  pub fn write(&self, key: K, value: V) {
    let mut inner = self.inner.lock();
    *inner.generations.entry(key.clone()).or_insert(0) += 1;
    inner.entries.insert(
      key,
      Entry {
        value,
        fetched_at: Instant::now(),
      },
    );
  }

  /// Edit a resident entry in place.
  ///
  /// The entry's timestamp is preserved: an incremental membership change is
  /// authoritative for that member only and must not extend the freshness of
  /// the rest of the value. Returns false when nothing is resident for `key`.
  pub fn mutate<F>(&self, key: &K, apply: F) -> bool
  where
    F: FnOnce(&mut V),
  {
    let mut inner = self.inner.lock();
    let CellInner {
      entries,
      generations,
      ..
    } = &mut *inner;
    match entries.get_mut(key) {
      Some(entry) => {
        *generations.entry(key.clone()).or_insert(0) += 1;
        apply(&mut entry.value);
        true
      }
      None => false,
    }
  }

  /// Non-fetching read of whatever is resident for `key`, fresh or stale.
  pub fn peek(&self, key: &K) -> Option<V> {
    let inner = self.inner.lock();
    inner.entries.get(key).map(|entry| entry.value.clone())
  }

  /// Drop the entry for `key`, forcing the next read to refetch.
  pub fn invalidate(&self, key: &K) {
    let mut inner = self.inner.lock();
    inner.entries.remove(key);
    // The generation only needs to outlive the fetch it has to outvote
    if inner.in_flight.contains_key(key) {
      *inner.generations.entry(key.clone()).or_insert(0) += 1;
    } else {
      inner.generations.remove(key);
    }
  }

  /// Drop every entry. In-flight fetches are allowed to settle but their
  /// results are discarded.
  pub fn invalidate_all(&self) {
    let mut inner = self.inner.lock();
    let CellInner {
      entries,
      in_flight,
      generations,
    } = &mut *inner;
    entries.clear();
    generations.retain(|key, generation| {
      if in_flight.contains_key(key) {
        *generation += 1;
        true
      } else {
        false
      }
    });
  }

  #[cfg(test)]
  fn tracked_generations(&self) -> usize {
    self.inner.lock().generations.len()
  }
}

impl<K, V> Clone for CacheCell<K, V> {
  fn clone(&self) -> Self {
    Self {
      name: self.name,
      ttl: self.ttl,
      inner: Arc::clone(&self.inner),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tokio::sync::Notify;

  fn cell(ttl_secs: u64) -> CacheCell<u64, String> {
    CacheCell::new("test", Duration::from_secs(ttl_secs))
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_reads_coalesce_to_one_fetch() {
    let cell = cell(60);
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());

    let fetcher = |calls: Arc<AtomicUsize>, gate: Arc<Notify>| async move {
      calls.fetch_add(1, Ordering::SeqCst);
      gate.notified().await;
      Ok("value".to_string())
    };

    let a = cell.read(1, || fetcher(calls.clone(), gate.clone()));
    let b = cell.read(1, || fetcher(calls.clone(), gate.clone()));
    let c = cell.read(1, || fetcher(calls.clone(), gate.clone()));

    let release = async {
      tokio::task::yield_now().await;
      gate.notify_waiters();
    };

    let (a, b, c, ()) = tokio::join!(a, b, c, release);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap(), "value");
    assert_eq!(b.unwrap(), "value");
    assert_eq!(c.unwrap(), "value");
  }

  async fn read_counted(cell: &CacheCell<u64, String>, calls: &Arc<AtomicUsize>) -> String {
    let calls = Arc::clone(calls);
    cell
      .read(1, move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok("value".to_string())
      })
      .await
      .unwrap()
  }

  #[tokio::test(start_paused = true)]
  async fn test_fresh_entry_skips_fetch_until_ttl() {
    let cell = cell(60);
    let calls = Arc::new(AtomicUsize::new(0));

    read_counted(&cell, &calls).await;
    tokio::time::advance(Duration::from_secs(59)).await;
    read_counted(&cell, &calls).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    read_counted(&cell, &calls).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_write_wins_over_in_flight_fetch() {
    let cell = cell(60);
    let gate = Arc::new(Notify::new());

    let read_gate = gate.clone();
    let read = cell.read(1, move || async move {
      read_gate.notified().await;
      Ok("from-fetch".to_string())
    });

    let cell2 = cell.clone();
    let write_then_release = async {
      tokio::task::yield_now().await;
      cell2.write(1, "from-write".to_string());
      gate.notify_waiters();
      Ok::<_, StateError>(())
    };

    let (read, _) = tokio::join!(read, write_then_release);
    // The joined reader still gets the fetch result...
    assert_eq!(read.unwrap(), "from-fetch");
    // ...but the cache keeps the newer local write.
    assert_eq!(cell.peek(&1), Some("from-write".to_string()));
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_fetch_serves_stale_entry() {
    let cell = cell(60);

    cell
      .read(1, || async { Ok("good".to_string()) })
      .await
      .unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;

    let result = cell
      .read(1, || async { Err(StateError::Transient("boom".into())) })
      .await;
    assert_eq!(result.unwrap(), "good");
    // The stale entry stays resident for later reads
    assert_eq!(cell.peek(&1), Some("good".to_string()));
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_fetch_with_no_entry_surfaces_error() {
    let cell = cell(60);
    let result = cell
      .read(1, || async { Err(StateError::Transient("boom".into())) })
      .await;
    assert_eq!(result, Err(StateError::Transient("boom".into())));
    assert_eq!(cell.peek(&1), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidate_forces_refetch() {
    let cell = cell(60);
    let calls = Arc::new(AtomicUsize::new(0));

    read_counted(&cell, &calls).await;
    cell.invalidate(&1);
    read_counted(&cell, &calls).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidation_releases_per_key_bookkeeping() {
    let cell = cell(60);
    for key in 0..8 {
      cell.write(key, "value".to_string());
    }
    for key in 0..4 {
      cell.invalidate(&key);
    }
    assert_eq!(cell.tracked_generations(), 4);
    cell.invalidate_all();
    assert_eq!(cell.tracked_generations(), 0);

    // A failed fetch on an empty key leaves nothing behind either
    let _ = cell
      .read(1, || async { Err(StateError::Transient("boom".into())) })
      .await;
    assert_eq!(cell.tracked_generations(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidate_all_discards_in_flight_fetch() {
    let cell = cell(60);
    let gate = Arc::new(Notify::new());

    let read_gate = gate.clone();
    let read = cell.read(1, move || async move {
      read_gate.notified().await;
      Ok("from-fetch".to_string())
    });

    let cell2 = cell.clone();
    let clear_then_release = async {
      tokio::task::yield_now().await;
      cell2.invalidate_all();
      gate.notify_waiters();
    };

    let (read, ()) = tokio::join!(read, clear_then_release);
    assert_eq!(read.unwrap(), "from-fetch");
    // The settled fetch must not repopulate the cleared cell
    assert_eq!(cell.peek(&1), None);
    assert_eq!(cell.tracked_generations(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_mutate_preserves_timestamp() {
    let cell: CacheCell<u64, Vec<u64>> = CacheCell::new("test", Duration::from_secs(60));
    cell.read(1, || async { Ok(vec![7]) }).await.unwrap();

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(cell.mutate(&1, |set| set.push(9)));
    assert_eq!(cell.peek(&1), Some(vec![7, 9]));

    // The mutation must not have refreshed the original fetch timestamp
    let calls = Arc::new(AtomicUsize::new(0));
    tokio::time::advance(Duration::from_secs(31)).await;
    let calls2 = calls.clone();
    cell
      .read(1, move || async move {
        calls2.fetch_add(1, Ordering::SeqCst);
        Ok(vec![1, 2])
      })
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_mutate_missing_entry_reports_not_resident() {
    let cell: CacheCell<u64, Vec<u64>> = CacheCell::new("test", Duration::from_secs(60));
    assert!(!cell.mutate(&1, |set| set.push(9)));
  }
}
