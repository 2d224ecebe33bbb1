//! In-flight computation registry for cache misses

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

type SharedComputation = Shared<BoxFuture<'static, Result<serde_json::Value, String>>>;

/// Coalesces concurrent computations for the same key.
///
/// The first caller for a key starts the computation on its own task and
/// registers it; callers arriving while it runs await the same result. The
/// entry is removed once the computation finishes, so the next miss after
/// that computes again. Dropping a waiting caller never cancels the task.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    pending: Arc<Mutex<HashMap<String, SharedComputation>>>,
}

/// Who produced the value returned by [`InFlight::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightRole {
    /// This caller started the computation
    Leader,
    /// This caller joined a computation already running
    Follower,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of computations currently running
    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `compute` for `key` unless a computation for it is already running
    pub async fn run<F>(&self, key: &str, compute: F) -> (Result<serde_json::Value, String>, FlightRole)
    where
        F: Future<Output = Result<serde_json::Value, String>> + Send + 'static,
    {
        let (flight, role) = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

            match pending.get(key) {
                Some(existing) => (existing.clone(), FlightRole::Follower),
                None => {
                    let registry = Arc::clone(&self.pending);
                    let owned_key = key.to_string();

                    let flight = async move {
                        let result = compute.await;
                        registry
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(&owned_key);
                        result
                    }
                    .boxed()
                    .shared();

                    pending.insert(key.to_string(), flight.clone());
                    tokio::spawn(flight.clone());

                    (flight, FlightRole::Leader)
                }
            }
        };

        (flight.await, role)
    }
}
