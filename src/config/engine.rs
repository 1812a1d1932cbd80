use crate::engine::{Delivery, FailurePolicy, Granularity};
use crate::error::{EngineError, ErrorCode, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for one aggregation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum records per batch
    pub batch_size: usize,
    /// Number of worker nodes in the local pool
    pub workers: usize,
    /// Concurrent units each worker may run
    pub slots_per_worker: usize,
    pub granularity: Granularity,
    pub delivery: Delivery,
    pub failure_policy: FailurePolicy,
    /// Per-round deadline, e.g. `"30s"`
    #[serde(with = "humantime_serde")]
    pub round_timeout: Option<Duration>,
    /// Merge each round's partials before they reach the reducer
    pub pre_combine: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::DEFAULT_BATCH_SIZE,
            workers: Self::default_workers(),
            slots_per_worker: 1,
            granularity: Granularity::default(),
            delivery: Delivery::default(),
            failure_policy: FailurePolicy::default(),
            round_timeout: None,
            pre_combine: false,
        }
    }
}

impl EngineConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 10;

    pub fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("engine.batch_size", self.batch_size),
            ("engine.workers", self.workers),
            ("engine.slots_per_worker", self.slots_per_worker),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(EngineError::config_with_code(
                    ErrorCode::CONFIG_INVALID_VALUE,
                    format!("{} must be at least 1", field),
                    Some(field.to_string()),
                ));
            }
        }

        if self.round_timeout == Some(Duration::ZERO) {
            return Err(EngineError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "engine.round_timeout must be longer than zero",
                Some("engine.round_timeout".to_string()),
            ));
        }

        Ok(())
    }
}
