//! # Tallygrid
//!
//! Counts forum posts matching a query by streaming a post dump in bounded
//! batches, fanning each batch out to a pool of workers, and reducing their
//! partial counts into one aggregate.
//!
//! ## Usage
//!
//! ```bash
//! tallygrid run posts.xml --query storm-popular-month --batch-size 100
//! ```
//!
//! ## Modules
//!
//! - `config` - TOML/YAML run configuration and query presets
//! - `engine` - Work units, worker pool, dispatcher, reducer and the driver loop
//! - `error` - Error type with stable error codes
//! - `extract` - Row attribute extraction and record predicates
//! - `source` - Line-oriented record source and batch reader
//! - `testing` - Fixtures and scripted worker pools for tests
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod source;

pub mod testing;


pub use error::{EngineError, ErrorCode, Result};

use config::AnalyticsConfig;
use engine::{AggregationDriver, Report};
use source::STDIN_PATH;
use std::path::PathBuf;

/// Run the query described by `config` over its input, defaulting to stdin
pub async fn analyze(config: &AnalyticsConfig) -> Result<Report> {
    let query = config.query.compile()?;
    let input = config
        .input
        .clone()
        .unwrap_or_else(|| PathBuf::from(STDIN_PATH));

    let mut driver =
        AggregationDriver::from_config(query.plan, &config.engine)?.with_subject(query.subject);
    driver.run(input).await
}
