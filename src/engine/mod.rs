//! Batch-distribute-reduce execution engine
//!
//! One driver task reads the record stream in bounded batches, turns each
//! batch into [`WorkUnit`]s, fans them out through a [`Dispatcher`] to a
//! [`WorkerPool`], and folds the returned [`PartialResult`]s into a single
//! [`Aggregate`] with the [`Reducer`].
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`WorkUnit`] | Coarse (whole batch) or fine (one record) unit of work |
//! | [`WorkerPool`] | `submit(unit) -> future(PartialResult)` capability |
//! | [`Dispatcher`] | Submits a round and awaits every result |
//! | [`Reducer`] | Associative, commutative combine into the aggregate |
//! | [`AggregationDriver`] | The read/dispatch/reduce loop |

mod aggregate;
mod dispatcher;
mod driver;
mod partial;
mod reducer;
mod report;
mod work_unit;
mod worker_pool;

pub use aggregate::{Aggregate, AggregateValue, BucketCounts};
pub use dispatcher::{Delivery, Dispatcher};
pub use driver::{AggregationDriver, DriverState, FailurePolicy};
pub use partial::{PartialResult, Tally};
pub use reducer::Reducer;
pub use report::{Report, TopBucket};
pub use work_unit::{Granularity, WorkUnit};
pub use worker_pool::{LocalWorkerPool, Placement, WorkerError, WorkerInfo, WorkerPool};

use serde::{Deserialize, Serialize};

/// Discrete classification key; the month query uses 0-based month indexes
pub type BucketKey = u32;

/// Shape of an aggregate and of the partials that feed it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateMode {
    Scalar,
    Bucketed,
}
