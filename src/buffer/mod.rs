pub mod batch;

pub use batch::{Batch, BatchConfig, CUTTING_THRESHOLD, MIN_SIGNAL_SIZE};
