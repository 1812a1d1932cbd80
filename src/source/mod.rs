//! Record input: the lazy line source and the batcher that feeds dispatch rounds

mod batch_reader;
mod record_source;

pub use batch_reader::{Batch, BatchReader};
pub use record_source::{Record, RecordSource, STDIN_PATH};
