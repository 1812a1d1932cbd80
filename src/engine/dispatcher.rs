//! Submitting one round of work units and awaiting all of their results

use super::partial::PartialResult;
use super::work_unit::WorkUnit;
use super::worker_pool::{Placement, WorkerPool};
use crate::error::{EngineError, ErrorCode, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How units of a round are spread over the pool
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Delivery {
    /// Unit `i` runs on worker `i % size`
    Broadcast,
    /// Each unit goes to the least busy worker
    #[default]
    Scatter,
}

/// Sends rounds of units to a worker pool
pub struct Dispatcher {
    pool: Arc<dyn WorkerPool>,
    delivery: Delivery,
    round_timeout: Option<Duration>,
    pre_combine: bool,
}

impl Dispatcher {
    pub fn new(pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            pool,
            delivery: Delivery::default(),
            round_timeout: None,
            pre_combine: false,
        }
    }

    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Fail the round if it has not completed within `timeout`
    pub fn with_round_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.round_timeout = timeout;
        self
    }

    /// Merge a round's partials into one before returning them
    pub fn with_pre_combine(mut self, pre_combine: bool) -> Self {
        self.pre_combine = pre_combine;
        self
    }

    pub fn pool(&self) -> &Arc<dyn WorkerPool> {
        &self.pool
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    /// Run every unit and return all partials, in completion order.
    ///
    /// Waits for every submitted unit to settle; if any failed the whole round
    /// fails and none of its partials are returned.
    pub async fn dispatch(&self, round: u64, units: Vec<WorkUnit>) -> Result<Vec<PartialResult>> {
        let size = self.pool.size();
        if size == 0 {
            return Err(EngineError::dispatch(
                ErrorCode::DISPATCH_NO_WORKERS,
                "worker pool has no workers",
                round,
            ));
        }

        let total = units.len();
        debug!(
            "Dispatching round {} ({} units, {:?} over {} workers)",
            round, total, self.delivery, size
        );

        let mut pending: FuturesUnordered<_> = units
            .into_iter()
            .enumerate()
            .map(|(i, unit)| {
                let placement = match self.delivery {
                    Delivery::Broadcast => Placement::Node(i % size),
                    Delivery::Scatter => Placement::Any,
                };
                self.pool.submit(unit, placement)
            })
            .collect();

        let await_all = async move {
            let mut partials = Vec::with_capacity(total);
            let mut failure = None;
            while let Some(result) = pending.next().await {
                match result {
                    Ok(partial) => partials.push(partial),
                    Err(e) => {
                        warn!("Work unit in round {} failed: {}", round, e);
                        failure.get_or_insert(e);
                    }
                }
            }
            (partials, failure)
        };

        let (partials, failure) = match self.round_timeout {
            Some(limit) => tokio::time::timeout(limit, await_all).await.map_err(|_| {
                EngineError::dispatch(
                    ErrorCode::DISPATCH_TIMEOUT,
                    format!("round did not complete within {:?}", limit),
                    round,
                )
            })?,
            None => await_all.await,
        };

        if let Some(e) = failure {
            return Err(EngineError::dispatch(e.code(), e.to_string(), round).with_source(e));
        }

        if self.pre_combine {
            return pre_combine(partials);
        }

        Ok(partials)
    }
}

/// Merge a round's partials pairwise into a single partial
fn pre_combine(partials: Vec<PartialResult>) -> Result<Vec<PartialResult>> {
    let mut iter = partials.into_iter();
    let Some(first) = iter.next() else {
        return Ok(Vec::new());
    };
    let merged = iter.try_fold(first, PartialResult::merge)?;
    Ok(vec![merged])
}
