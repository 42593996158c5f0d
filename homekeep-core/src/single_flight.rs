//! In-flight operation registry.
//!
//! Deduplicates concurrent identical async operations: the first caller for
//! a key starts the work, later callers for the same key attach to the
//! pending result instead of starting their own. The entry is removed as
//! soon as the work finishes, so the next call after completion starts a
//! fresh operation.
//!
//! The work runs on its own task. Callers that stop waiting (for example
//! after a timeout) do not cancel it.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};

/// Errors surfaced to callers waiting on a flight.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InFlightError {
    /// The task running the operation panicked or was aborted.
    #[error("In-flight operation ended without a result: {0}")]
    Aborted(String),
}

type SharedResult<V> = Shared<BoxFuture<'static, Result<V, InFlightError>>>;

struct Flight<V> {
    id: u64,
    result: SharedResult<V>,
}

type Flights<K, V> = Arc<Mutex<HashMap<K, Flight<V>>>>;

fn lock<K, V>(flights: &Flights<K, V>) -> MutexGuard<'_, HashMap<K, Flight<V>>> {
    flights.lock().unwrap_or_else(|e| e.into_inner())
}

/// Registry of operations currently in flight, keyed by `K`.
pub struct SingleFlight<K, V> {
    flights: Flights<K, V>,
    next_id: AtomicU64,
}

/// A caller's attachment to a flight.
pub struct FlightHandle<V> {
    leader: bool,
    result: SharedResult<V>,
}

impl<V> Clone for FlightHandle<V> {
    fn clone(&self) -> Self {
        Self {
            leader: self.leader,
            result: self.result.clone(),
        }
    }
}

impl<V: Clone> FlightHandle<V> {
    /// True if this caller started the operation.
    pub fn is_leader(&self) -> bool {
        self.leader
    }

    /// Wait for the shared result.
    pub async fn wait(self) -> Result<V, InFlightError> {
        self.result.await
    }
}

/// Removes the registry entry when the operation ends, including on panic.
struct Landing<K: Eq + Hash, V> {
    flights: Flights<K, V>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, V> Drop for Landing<K, V> {
    fn drop(&mut self) {
        let mut flights = lock(&self.flights);
        // A newer flight may already own the key
        if flights.get(&self.key).is_some_and(|f| f.id == self.id) {
            flights.remove(&self.key);
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Attach to the flight for `key`, starting it with `start` if none is pending.
    ///
    /// `start` is only called when this caller becomes the leader.
    /// Must be called from within a Tokio runtime.
    pub fn join_or_start<F, Fut>(&self, key: K, start: F) -> FlightHandle<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut flights = lock(&self.flights);

        if let Some(flight) = flights.get(&key) {
            return FlightHandle {
                leader: false,
                result: flight.result.clone(),
            };
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let landing = Landing {
            flights: Arc::clone(&self.flights),
            key: key.clone(),
            id,
        };
        let work = start();

        // The landing guard needs the lock we are holding; it runs only
        // after this function has inserted the entry and released it.
        let task = tokio::spawn(async move {
            let _landing = landing;
            work.await
        });

        let result = async move {
            task.await
                .map_err(|e| InFlightError::Aborted(e.to_string()))
        }
        .boxed()
        .shared();

        flights.insert(
            key,
            Flight {
                id,
                result: result.clone(),
            },
        );

        FlightHandle {
            leader: true,
            result,
        }
    }

    /// True if an operation for `key` is pending.
    pub fn is_in_flight(&self, key: &K) -> bool {
        lock(&self.flights).contains_key(key)
    }

    /// Number of pending operations.
    pub fn len(&self) -> usize {
        lock(&self.flights).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for SingleFlight<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &lock(&self.flights).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_run() {
        let flights: SingleFlight<&'static str, u32> = SingleFlight::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let runs = runs.clone();
            handles.push(flights.join_or_start("probe", move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                42
            }));
        }

        assert!(handles[0].is_leader());
        assert!(handles[1..].iter().all(|h| !h.is_leader()));

        for handle in handles {
            assert_eq!(handle.wait().await, Ok(42));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_removed_after_completion() {
        let flights: SingleFlight<u8, u8> = SingleFlight::new();

        let handle = flights.join_or_start(1, || async { 7 });
        assert!(flights.is_in_flight(&1));

        assert_eq!(handle.wait().await, Ok(7));
        tokio::task::yield_now().await;
        assert!(flights.is_empty());

        // A later call starts a new flight
        let handle = flights.join_or_start(1, || async { 8 });
        assert!(handle.is_leader());
        assert_eq!(handle.wait().await, Ok(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_run_independently() {
        let flights: SingleFlight<u8, u8> = SingleFlight::new();

        let a = flights.join_or_start(1, || async { 1 });
        let b = flights.join_or_start(2, || async { 2 });

        assert!(a.is_leader());
        assert!(b.is_leader());
        assert_eq!(flights.len(), 2);
        assert_eq!(a.wait().await, Ok(1));
        assert_eq!(b.wait().await, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_continues_when_callers_stop_waiting() {
        let flights: SingleFlight<u8, ()> = SingleFlight::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let done = finished.clone();
        let handle = flights.join_or_start(1, move || async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            done.fetch_add(1, Ordering::SeqCst);
        });

        let waited = tokio::time::timeout(Duration::from_secs(1), handle.wait()).await;
        assert!(waited.is_err());
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(flights.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_work_reports_aborted() {
        let flights: SingleFlight<u8, u8> = SingleFlight::new();

        let handle = flights.join_or_start(1, || async { None::<u8>.expect("boom") });

        assert!(matches!(handle.wait().await, Err(InFlightError::Aborted(_))));
        assert!(flights.is_empty());
    }
}
