//! In-flight de-duplication of identical concurrent calls.
//!
//! A map from request key to the in-progress future. The first caller
//! for a key becomes the leader and does the work; late joiners attach
//! to the same shared future instead of duplicating it. The entry is
//! removed once the leader's future resolves.

use std::collections::HashMap;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};

pub struct SingleFlight<T: Clone> {
    inflight: Mutex<HashMap<String, Shared<BoxFuture<'static, T>>>>,
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `make()` for this key, or join an identical call already in
    /// flight. Every caller receives a clone of the same result.
    pub async fn run<F>(&self, key: &str, make: F) -> T
    where
        F: FnOnce() -> BoxFuture<'static, T>,
    {
        let (future, leader) = {
            let mut map = match self.inflight.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match map.get(key) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let shared = make().shared();
                    map.insert(key.to_string(), shared.clone());
                    (shared, true)
                }
            }
        };

        let result = future.await;

        if leader {
            let mut map = match self.inflight.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            map.remove(key);
        }

        result
    }

    /// Number of keys currently in flight.
    pub fn len(&self) -> usize {
        match self.inflight.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_execution() {
        let flight = Arc::new(SingleFlight::<usize>::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = Arc::clone(&flight);
            let executions = Arc::clone(&executions);
            handles.push(tokio::spawn(async move {
                flight
                    .run("same-key", move || {
                        async move {
                            executions.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            42
                        }
                        .boxed()
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert!(flight.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_run_separately() {
        let flight = SingleFlight::<String>::new();

        let a = flight.run("a", || async { "alpha".to_string() }.boxed()).await;
        let b = flight.run("b", || async { "beta".to_string() }.boxed()).await;

        assert_eq!(a, "alpha");
        assert_eq!(b, "beta");
    }

    #[tokio::test]
    async fn test_key_reusable_after_completion() {
        let flight = SingleFlight::<usize>::new();
        let first = flight.run("k", || async { 1 }.boxed()).await;
        let second = flight.run("k", || async { 2 }.boxed()).await;
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }
}
