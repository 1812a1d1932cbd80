//! Worker pool capability and the in-process implementation
//!
//! The engine only needs `submit(unit) -> future(PartialResult)`. Where a unit
//! runs (thread, process, remote node) is the pool's business.

use super::partial::PartialResult;
use super::work_unit::WorkUnit;
use crate::error::{EngineError, ErrorCode, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use uuid::Uuid;

/// Where a unit should run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Any worker; the pool balances load
    Any,
    /// A specific worker by index, taken modulo the pool size
    Node(usize),
}

/// Failure of a single unit on a worker
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker {worker} failed: {message}")]
    Failed { worker: String, message: String },

    #[error("work unit panicked on worker {worker}")]
    Panicked { worker: String },

    #[error("worker pool has no workers")]
    NoWorkers,
}

impl WorkerError {
    /// Registry code used when this failure aborts a round
    pub fn code(&self) -> u16 {
        match self {
            WorkerError::Failed { .. } => ErrorCode::DISPATCH_WORKER_FAILED,
            WorkerError::Panicked { .. } => ErrorCode::DISPATCH_UNIT_PANICKED,
            WorkerError::NoWorkers => ErrorCode::DISPATCH_NO_WORKERS,
        }
    }
}

/// Descriptive snapshot of one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerInfo {
    pub id: Uuid,
    pub name: String,
    pub host: String,
    pub slots: usize,
    pub local: bool,
}

/// Executes work units and hands back their partial results
#[async_trait]
pub trait WorkerPool: Send + Sync {
    fn nodes(&self) -> Vec<WorkerInfo>;

    fn size(&self) -> usize {
        self.nodes().len()
    }

    /// Run `unit` and resolve once it finishes
    async fn submit(
        &self,
        unit: WorkUnit,
        placement: Placement,
    ) -> std::result::Result<PartialResult, WorkerError>;
}

#[derive(Debug)]
struct WorkerNode {
    info: WorkerInfo,
    slots: Arc<Semaphore>,
    in_flight: AtomicUsize,
    completed: AtomicU64,
}

/// Decrements the node's in-flight count however the unit ends
struct InFlight<'a>(&'a WorkerNode);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Worker nodes backed by the tokio blocking pool
#[derive(Debug)]
pub struct LocalWorkerPool {
    nodes: Vec<WorkerNode>,
}

impl LocalWorkerPool {
    /// `workers` nodes, each running at most `slots_per_worker` units at once
    pub fn new(workers: usize, slots_per_worker: usize) -> Result<Self> {
        if workers == 0 {
            return Err(EngineError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "worker pool needs at least one worker",
                Some("engine.workers".to_string()),
            ));
        }
        if slots_per_worker == 0 {
            return Err(EngineError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "each worker needs at least one slot",
                Some("engine.slots_per_worker".to_string()),
            ));
        }

        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());

        let nodes = (0..workers)
            .map(|i| WorkerNode {
                info: WorkerInfo {
                    id: Uuid::new_v4(),
                    name: format!("worker-{}", i),
                    host: host.clone(),
                    slots: slots_per_worker,
                    local: true,
                },
                slots: Arc::new(Semaphore::new(slots_per_worker)),
                in_flight: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
            })
            .collect();

        Ok(Self { nodes })
    }

    /// Units completed per worker, in node order
    pub fn completed(&self) -> Vec<u64> {
        self.nodes
            .iter()
            .map(|n| n.completed.load(Ordering::SeqCst))
            .collect()
    }

    fn pick(&self, placement: Placement) -> Option<&WorkerNode> {
        match placement {
            Placement::Node(i) if !self.nodes.is_empty() => self.nodes.get(i % self.nodes.len()),
            Placement::Node(_) => None,
            Placement::Any => self
                .nodes
                .iter()
                .min_by_key(|n| n.in_flight.load(Ordering::SeqCst)),
        }
    }
}

#[async_trait]
impl WorkerPool for LocalWorkerPool {
    fn nodes(&self) -> Vec<WorkerInfo> {
        self.nodes.iter().map(|n| n.info.clone()).collect()
    }

    fn size(&self) -> usize {
        self.nodes.len()
    }

    async fn submit(
        &self,
        unit: WorkUnit,
        placement: Placement,
    ) -> std::result::Result<PartialResult, WorkerError> {
        let node = self.pick(placement).ok_or(WorkerError::NoWorkers)?;
        node.in_flight.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight(node);

        let permit = node
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| WorkerError::Failed {
                worker: node.info.name.clone(),
                message: e.to_string(),
            })?;

        debug!(
            "{} running {:?} unit of round {} ({} records)",
            node.info.name,
            unit.granularity(),
            unit.round(),
            unit.len()
        );

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            unit.execute()
        });

        match handle.await {
            Ok(partial) => {
                node.completed.fetch_add(1, Ordering::SeqCst);
                Ok(partial)
            }
            Err(e) if e.is_panic() => {
                warn!("Work unit panicked on {}", node.info.name);
                Err(WorkerError::Panicked {
                    worker: node.info.name.clone(),
                })
            }
            Err(e) => Err(WorkerError::Failed {
                worker: node.info.name.clone(),
                message: e.to_string(),
            }),
        }
    }
}
