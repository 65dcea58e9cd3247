//! One-shot, cancellable, named delayed callbacks.
//!
//! Each scheduled callback runs on its own tokio task racing a sleep against
//! a `CancellationToken`. The returned `TimeoutHandle` owns a clone of that
//! token, so the session that scheduled a timeout can cancel exactly its own
//! timer without going through the name registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

struct Pending {
    id: u64,
    token: CancellationToken,
}

type Registry = Arc<Mutex<HashMap<String, Pending>>>;

/// Cancellation handle for one scheduled callback.
#[derive(Debug, Clone)]
pub struct TimeoutHandle {
    token: CancellationToken,
}

impl TimeoutHandle {
    /// Cancel the callback. A no-op once it has fired or was cancelled.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Default)]
pub struct TimeoutScheduler {
    pending: Registry,
    next_id: AtomicU64,
}

impl TimeoutScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` after `delay` unless cancelled first. Scheduling under a
    /// name that is already pending cancels the earlier callback.
    pub fn schedule<F>(&self, delay: Duration, name: impl Into<String>, callback: F) -> TimeoutHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let token = CancellationToken::new();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut pending = lock(&self.pending);
            if let Some(previous) = pending.insert(
                name.clone(),
                Pending {
                    id,
                    token: token.clone(),
                },
            ) {
                debug!(name = %name, "replacing pending timeout");
                previous.token.cancel();
            }
        }

        let registry = Arc::clone(&self.pending);
        let task_token = token.clone();
        let task_name = name;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    unregister(&registry, &task_name, id);
                    trace!(name = %task_name, "timeout cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    // Losing the registry entry here means cancel() won the race.
                    if unregister(&registry, &task_name, id) {
                        debug!(name = %task_name, "timeout fired");
                        callback.await;
                    }
                }
            }
        });

        TimeoutHandle { token }
    }

    /// Cancel whatever is pending under `name`. Returns false if nothing was.
    pub fn cancel(&self, name: &str) -> bool {
        match lock(&self.pending).remove(name) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, name: &str) -> bool {
        lock(&self.pending).contains_key(name)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

fn lock(registry: &Registry) -> std::sync::MutexGuard<'_, HashMap<String, Pending>> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

/// Remove `name` only if it still refers to callback `id`.
fn unregister(registry: &Registry, name: &str, id: u64) -> bool {
    let mut pending = lock(registry);
    match pending.get(name) {
        Some(entry) if entry.id == id => {
            pending.remove(name);
            true
        }
        _ => false,
    }
}
