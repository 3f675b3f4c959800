use super::store::{BatchStore, PendingBatchInfo};
use crate::codec::drop_marker;
use crate::domain::DropReason;
use uuid::Uuid;

pub const DEFAULT_STORAGE_CAP: u64 = 50 * 1024 * 1024;
/// Files at or below this size cannot shrink further.
pub const DROP_THRESHOLD: u64 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageCap {
    pub max_bytes: u64,
    pub drop_threshold: u64,
}

impl Default for StorageCap {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_STORAGE_CAP,
            drop_threshold: DROP_THRESHOLD,
        }
    }
}

pub fn total_size(pending: &[PendingBatchInfo]) -> u64 {
    pending.iter().map(|info| info.size).sum()
}

/// Degrades the oldest queued files to drop markers until the queue fits
/// under the cap. Files that cannot be read are deleted and unindexed.
/// Returns the queued byte total afterwards.
pub async fn reduce_storage(
    store: &BatchStore,
    pending: &mut Vec<PendingBatchInfo>,
    cap: &StorageCap,
) -> u64 {
    let mut total = total_size(pending);
    if total <= cap.max_bytes {
        return total;
    }

    tracing::info!(
        total_bytes = total,
        cap_bytes = cap.max_bytes,
        files = pending.len(),
        "Queue over storage cap, dropping oldest batches"
    );

    let marker = drop_marker(DropReason::TooManyUnsentEvents);
    let mut index = 0;
    while index < pending.len() && total > cap.max_bytes {
        let info = pending[index];
        if info.size <= cap.drop_threshold {
            index += 1;
            continue;
        }

        // The install id is not stored in the file and is not rewritten.
        let mut meta = match store.load_batch(&info, Uuid::nil()).await {
            Ok(loaded) => loaded.meta,
            Err(e) => {
                tracing::warn!(file = %info.file_name(), error = %e, "Removing unreadable batch file");
                if let Err(e) = store.delete_batch(&info).await {
                    tracing::warn!(file = %info.file_name(), error = %e, "Failed to delete batch file");
                }
                total -= info.size;
                pending.remove(index);
                continue;
            }
        };

        // Keep the file name even if the header disagrees with it.
        meta.end_time = info.end_time;
        meta.batch_num = info.batch_num;
        match store.save_batch(&meta, &marker).await {
            Ok(rewritten) => {
                total = total - info.size + rewritten.size;
                pending[index].size = rewritten.size;
            }
            Err(e) => {
                tracing::warn!(file = %info.file_name(), error = %e, "Failed to rewrite batch as drop marker");
            }
        }
        index += 1;
    }

    tracing::debug!(total_bytes = total, "Storage reduction finished");
    total
}
