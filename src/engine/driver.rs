//! The batch loop: read, dispatch, reduce, repeat

use super::aggregate::Aggregate;
use super::dispatcher::Dispatcher;
use super::reducer::Reducer;
use super::report::Report;
use super::work_unit::{Granularity, WorkUnit};
use super::worker_pool::LocalWorkerPool;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::extract::QueryPlan;
use crate::source::{BatchReader, Record, RecordSource};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What the driver does when a round fails to dispatch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the run and return the failure with the aggregate reached so far
    #[default]
    Abort,
    /// Drop the failed batch's contribution and keep reading
    SkipBatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Init,
    Reading,
    Dispatching,
    Reducing,
    Done,
    Aborted,
}

/// Runs `RecordSource -> BatchReader -> Dispatcher -> Reducer` until the source is exhausted.
///
/// Batches are strictly serialized: batch N+1 is read only after batch N has
/// been reduced, and the aggregate is touched only by this driver.
pub struct AggregationDriver {
    plan: Arc<QueryPlan>,
    dispatcher: Dispatcher,
    reducer: Reducer,
    batch_size: usize,
    granularity: Granularity,
    failure_policy: FailurePolicy,
    subject: Option<String>,
    state: DriverState,
}

impl AggregationDriver {
    pub fn new(plan: QueryPlan, dispatcher: Dispatcher) -> Self {
        Self {
            plan: Arc::new(plan),
            dispatcher,
            reducer: Reducer::new(),
            batch_size: EngineConfig::DEFAULT_BATCH_SIZE,
            granularity: Granularity::default(),
            failure_policy: FailurePolicy::default(),
            subject: None,
            state: DriverState::Init,
        }
    }

    /// Build a driver over a local worker pool sized by `config`
    pub fn from_config(plan: QueryPlan, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let pool = LocalWorkerPool::new(config.workers, config.slots_per_worker)?;
        let dispatcher = Dispatcher::new(Arc::new(pool))
            .with_delivery(config.delivery)
            .with_round_timeout(config.round_timeout)
            .with_pre_combine(config.pre_combine);

        Ok(Self::new(plan, dispatcher)
            .with_batch_size(config.batch_size)
            .with_granularity(config.granularity)
            .with_failure_policy(config.failure_policy))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Override the noun phrase used in the final report
    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Open `path` and aggregate every record in it
    pub async fn run(&mut self, path: impl AsRef<Path>) -> Result<Report> {
        self.transition(DriverState::Init);
        for node in self.dispatcher.pool().nodes() {
            info!(
                "Worker {} [{}] on {} (slots: {}, local: {})",
                node.name, node.id, node.host, node.slots, node.local
            );
        }

        let source = match RecordSource::open(path) {
            Ok(source) => source,
            Err(e) => {
                self.transition(DriverState::Aborted);
                return Err(e);
            }
        };
        self.run_source(source).await
    }

    /// Aggregate an already open record stream
    pub async fn run_source<I>(&mut self, source: I) -> Result<Report>
    where
        I: Iterator<Item = Result<Record>>,
    {
        self.run_observed(source, |_, _| {}).await
    }

    /// Like [`run_source`](Self::run_source), calling `observer` after every reduced round
    pub async fn run_observed<I, F>(&mut self, mut source: I, mut observer: F) -> Result<Report>
    where
        I: Iterator<Item = Result<Record>>,
        F: FnMut(u64, &Aggregate),
    {
        let mut reader = BatchReader::new(self.batch_size);
        let mut aggregate = Aggregate::new(self.plan.mode());
        let mut failed_rounds = 0u64;

        info!(
            "Aggregating {} (batch size: {}, granularity: {:?}, delivery: {:?}, on failure: {:?})",
            self.plan.predicate.describe(),
            self.batch_size,
            self.granularity,
            self.dispatcher.delivery(),
            self.failure_policy
        );

        loop {
            self.transition(DriverState::Reading);
            let batch = match reader.read_batch(&mut source) {
                Ok(batch) => batch,
                Err(e) => {
                    self.transition(DriverState::Aborted);
                    return Err(e);
                }
            };
            if batch.is_empty() {
                break;
            }

            let round = batch.index;
            let records = batch.len();
            self.transition(DriverState::Dispatching);
            let units = WorkUnit::build(self.granularity, batch, &self.plan);

            let partials = match self.dispatcher.dispatch(round, units).await {
                Ok(partials) => partials,
                Err(e) if e.is_dispatch_failure() => match self.failure_policy {
                    FailurePolicy::Abort => {
                        error!("Aborting after round {} failed: {}", round, e);
                        self.transition(DriverState::Aborted);
                        return Err(e.with_partial(aggregate));
                    }
                    FailurePolicy::SkipBatch => {
                        warn!(
                            "Skipping round {} ({} records) after dispatch failure: {}",
                            round, records, e
                        );
                        failed_rounds += 1;
                        continue;
                    }
                },
                Err(e) => {
                    self.transition(DriverState::Aborted);
                    return Err(e);
                }
            };

            self.transition(DriverState::Reducing);
            if let Err(e) = self.reducer.combine(&mut aggregate, partials) {
                self.transition(DriverState::Aborted);
                return Err(e);
            }
            observer(round, &aggregate);
        }

        self.transition(DriverState::Done);
        info!(
            "Finished after {} rounds ({} records, {} matched, {} skipped, {} failed rounds)",
            aggregate.rounds,
            aggregate.records,
            aggregate.total(),
            aggregate.skipped,
            failed_rounds
        );

        Ok(Report::new(
            &self.plan,
            self.subject.clone(),
            aggregate,
            failed_rounds,
        ))
    }

    fn transition(&mut self, next: DriverState) {
        if self.state != next {
            debug!("Driver {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
