pub mod reducer;
pub mod store;

pub use reducer::{DEFAULT_STORAGE_CAP, DROP_THRESHOLD, StorageCap, reduce_storage, total_size};
pub use store::{
    BATCH_FILE_EXTENSION, BatchStore, LoadedBatch, PendingBatchInfo, StoreError,
    parse_batch_file_name,
};
