//! Per-agent ordered task queue.
//!
//! Each agent has at most one tail future. A submitted task is chained after
//! the current tail and becomes the new tail, so tasks for one agent run one
//! at a time in submission order. A task that fails or panics settles its
//! slot like any other; the next task still runs. Entries are removed when
//! the last task of an agent settles.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use tracing::{debug, error};

/// Completion handle of a submitted task. Resolves when the task has settled.
pub type ChainHandle = Shared<BoxFuture<'static, ()>>;

struct ChainEntry {
    generation: u64,
    tail: ChainHandle,
}

type ChainMap = Arc<Mutex<HashMap<String, ChainEntry>>>;

fn lock(map: &ChainMap) -> MutexGuard<'_, HashMap<String, ChainEntry>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Default)]
pub struct SyncChain {
    chains: ChainMap,
    generation: Arc<AtomicU64>,
}

impl SyncChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `task` behind every task already submitted for `agent_id`.
    ///
    /// The task is spawned on the current tokio runtime; awaiting the returned
    /// handle is optional.
    pub fn submit<F>(&self, agent_id: &str, task: F) -> ChainHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let key = agent_id.to_string();
        let chains = self.chains.clone();

        let mut guard = lock(&self.chains);
        let previous = guard.get(agent_id).map(|entry| entry.tail.clone());

        let run_key = key.clone();
        let run = async move {
            if let Some(previous) = previous {
                previous.await;
            }
            if AssertUnwindSafe(task).catch_unwind().await.is_err() {
                error!(agent_id = %run_key, "Sync task panicked");
            }
            let mut guard = lock(&chains);
            if guard.get(&run_key).map(|entry| entry.generation) == Some(generation) {
                guard.remove(&run_key);
                debug!(agent_id = %run_key, "Sync chain drained");
            }
        }
        .boxed()
        .shared();

        guard.insert(
            key,
            ChainEntry {
                generation,
                tail: run.clone(),
            },
        );
        drop(guard);

        tokio::spawn(run.clone());
        run
    }

    /// Number of agents with outstanding tasks.
    pub fn pending_agents(&self) -> usize {
        lock(&self.chains).len()
    }

    /// Waits until every chain, including ones extended while waiting, is empty.
    pub async fn drain(&self) {
        loop {
            let tails: Vec<ChainHandle> = lock(&self.chains)
                .values()
                .map(|entry| entry.tail.clone())
                .collect();
            if tails.is_empty() {
                return;
            }
            join_all(tails).await;
        }
    }
}
