use super::negotiation::{NegotiationError, SchemaNegotiator};
use crate::reliability::{BatchStore, PendingBatchInfo, StorageCap, reduce_storage};
use crate::sender::BatchTransmitter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The durable queue index plus everything needed to drain it.
///
/// Owned by exactly one task; nothing here is shared.
pub struct DeliveryQueue {
    store: BatchStore,
    transmitter: BatchTransmitter,
    negotiator: SchemaNegotiator,
    pending: Vec<PendingBatchInfo>,
    install_id: Uuid,
    max_files_per_cycle: usize,
    storage_cap: StorageCap,
    test_user: Option<String>,
}

enum Outcome {
    Delivered,
    Unreachable,
}

impl DeliveryQueue {
    pub fn new(
        store: BatchStore,
        transmitter: BatchTransmitter,
        install_id: Uuid,
        max_files_per_cycle: usize,
        storage_cap: StorageCap,
    ) -> Self {
        Self {
            store,
            transmitter,
            negotiator: SchemaNegotiator::new(),
            pending: Vec::new(),
            install_id,
            max_files_per_cycle,
            storage_cap,
            test_user: None,
        }
    }

    pub fn store(&self) -> &BatchStore {
        &self.store
    }

    pub fn pending(&self) -> &[PendingBatchInfo] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn storage_cap(&self) -> &StorageCap {
        &self.storage_cap
    }

    pub fn set_test_user(&mut self, name: String) {
        self.test_user = Some(name);
    }

    /// Replaces the index with a fresh directory scan.
    pub async fn load(&mut self) {
        match self.store.scan().await {
            Ok(pending) => {
                info!(files = pending.len(), "Loaded queued batch files");
                self.pending = pending;
            }
            Err(e) => {
                warn!(error = %e, "Failed to scan work directory");
                self.pending.clear();
            }
        }
    }

    /// First batch number that cannot collide with a queued file name.
    pub fn next_free_batch_num(&self) -> i32 {
        self.pending
            .iter()
            .map(|info| info.batch_num)
            .max()
            .map_or(0, |highest| highest.wrapping_add(1))
    }

    /// Returns the queued byte total after reduction.
    pub async fn enforce_cap(&mut self) -> u64 {
        reduce_storage(&self.store, &mut self.pending, &self.storage_cap).await
    }

    /// Adds a freshly written file, keeping delivery order.
    pub fn enqueue(&mut self, info: PendingBatchInfo) {
        match self.pending.binary_search_by_key(&info.key(), PendingBatchInfo::key) {
            Ok(existing) => self.pending[existing] = info,
            Err(position) => self.pending.insert(position, info),
        }
    }

    /// Sends up to one cycle's worth of files, oldest first, stopping at the
    /// first failure. Returns whether the collector looked reachable.
    pub async fn send_pending(&mut self, cancel: &CancellationToken) -> bool {
        let batch: Vec<PendingBatchInfo> = self
            .pending
            .iter()
            .take(self.max_files_per_cycle)
            .copied()
            .collect();

        let mut handled = 0;
        let mut reachable = true;
        for info in &batch {
            if cancel.is_cancelled() {
                reachable = false;
                break;
            }
            match self.send_one(info, cancel).await {
                Outcome::Delivered => handled += 1,
                Outcome::Unreachable => {
                    reachable = false;
                    break;
                }
            }
        }

        self.pending.drain(..handled);
        if handled > 0 {
            debug!(handled, remaining = self.pending.len(), "Delivery cycle finished");
        }
        reachable
    }

    async fn send_one(&mut self, info: &PendingBatchInfo, cancel: &CancellationToken) -> Outcome {
        let loaded = match self.store.load_batch(info, self.install_id).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(file = %info.file_name(), error = %e, "Deleting unreadable batch file");
                self.delete(info).await;
                return Outcome::Delivered;
            }
        };

        let meta = loaded.meta;
        match self
            .negotiator
            .ensure_registered(meta.custom_events_version, &self.store, &self.transmitter, cancel)
            .await
        {
            Ok(()) => {}
            Err(NegotiationError::MissingSchema { version, source }) => {
                warn!(
                    file = %info.file_name(),
                    version,
                    error = %source,
                    "Custom event schema unavailable, keeping batch queued"
                );
                return Outcome::Unreachable;
            }
            Err(NegotiationError::Transmission(e)) => {
                warn!(version = meta.custom_events_version, error = %e, "Schema negotiation failed");
                return Outcome::Unreachable;
            }
        }

        let test_user = self.test_user.as_deref();
        match self
            .transmitter
            .deliver_batch(&meta, loaded.payload, test_user, cancel)
            .await
        {
            Ok(result) if result.success => {
                self.delete(info).await;
                Outcome::Delivered
            }
            Ok(_) => Outcome::Unreachable,
            Err(e) => {
                warn!(file = %info.file_name(), error = %e, "Batch delivery failed");
                Outcome::Unreachable
            }
        }
    }

    async fn delete(&self, info: &PendingBatchInfo) {
        if let Err(e) = self.store.delete_batch(info).await {
            warn!(file = %info.file_name(), error = %e, "Failed to delete batch file");
        }
    }

    /// Alternates reduction and delivery until the queue is empty (`true`) or
    /// the collector stops answering (`false`).
    pub async fn drain(&mut self, cancel: &CancellationToken) -> bool {
        self.load().await;
        loop {
            self.enforce_cap().await;
            if self.pending.is_empty() {
                return true;
            }
            if !self.send_pending(cancel).await {
                return false;
            }
        }
    }
}
