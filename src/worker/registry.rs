// src/worker/registry.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::dag::{ContextBundle, RoleId, TaskGraph};
use crate::errors::{ExecutionError, RoleNotFound};
use crate::worker::Worker;

/// A registered worker plus the slot that keeps its role single-flight.
///
/// Cheap to clone; clones share the same slot, so mutual exclusion holds no
/// matter how many handles are in flight.
#[derive(Clone)]
pub struct WorkerHandle {
    role: RoleId,
    worker: Arc<dyn Worker>,
    slot: Arc<Mutex<()>>,
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("role", &self.role)
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}

impl WorkerHandle {
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Whether an invocation for this role currently holds the slot.
    pub fn is_busy(&self) -> bool {
        self.slot.try_lock().is_err()
    }

    /// Invoke the worker, waiting for the role to be idle first.
    ///
    /// `timeout` bounds the invocation itself, not the wait for the slot. On
    /// expiry the worker future is dropped and `ExecutionError::Timeout` is
    /// returned.
    pub async fn invoke(
        &self,
        description: &str,
        context: &ContextBundle,
        timeout: Duration,
    ) -> Result<String, ExecutionError> {
        let _guard = self.slot.lock().await;
        let started = Instant::now();

        match tokio::time::timeout(timeout, self.worker.invoke(description, context)).await {
            Ok(Ok(text)) => {
                debug!(
                    role = %self.role,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    bytes = text.len(),
                    "worker invocation finished"
                );
                Ok(text)
            }
            Ok(Err(err)) => Err(ExecutionError::Failure {
                role: self.role.clone(),
                message: format!("{err:#}"),
            }),
            Err(_elapsed) => {
                warn!(role = %self.role, ?timeout, "worker invocation timed out");
                Err(ExecutionError::Timeout {
                    role: self.role.clone(),
                    after: timeout,
                })
            }
        }
    }
}

/// Maps each role to exactly one worker.
#[derive(Debug, Clone)]
pub struct WorkerRegistry {
    workers: HashMap<RoleId, WorkerHandle>,
    timeout: Duration,
}

impl WorkerRegistry {
    /// Create an empty registry whose invocations expire after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            workers: HashMap::new(),
            timeout,
        }
    }

    /// Register `worker` for `role`, replacing any previous worker.
    pub fn register(&mut self, role: impl Into<RoleId>, worker: Arc<dyn Worker>) {
        let role = role.into();
        let handle = WorkerHandle {
            role: role.clone(),
            worker,
            slot: Arc::new(Mutex::new(())),
        };
        if self.workers.insert(role.clone(), handle).is_some() {
            warn!(role = %role, "replacing previously registered worker");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_worker(mut self, role: impl Into<RoleId>, worker: Arc<dyn Worker>) -> Self {
        self.register(role, worker);
        self
    }

    /// Per-invocation deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.workers.keys().map(|s| s.as_str())
    }

    pub fn resolve(&self, role: &str) -> Result<&WorkerHandle, RoleNotFound> {
        self.workers
            .get(role)
            .ok_or_else(|| RoleNotFound(role.to_string()))
    }

    /// Resolve every role used by `graph` once, before anything runs.
    pub fn check_roles(&self, graph: &TaskGraph) -> Result<(), RoleNotFound> {
        for role in graph.roles() {
            self.resolve(role)?;
        }
        Ok(())
    }
}
