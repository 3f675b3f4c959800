use super::DispatcherError;
use super::delivery::DeliveryQueue;
use super::sender_loop::SenderLoop;
use crate::app::DispatcherConfig;
use crate::buffer::{Batch, BatchConfig};
use crate::codec::CustomEventSet;
use crate::domain::{
    BatchMeta, CustomEventTable, EventKind, FIRST_CUSTOM_EVENT_ID, Payload, unix_time_now,
};
use crate::profile::{IdentityStore, MilestoneCounter, TestUserMarker};
use crate::reliability::BatchStore;
use crate::sender::{BatchTransmitter, HttpClient};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Producer-side state guarded by the swap lock.
pub(crate) struct ActiveSide {
    pub(crate) batch: Batch,
    /// Stamped onto every batch created by later swaps.
    pub(crate) user_id: Uuid,
    /// Handed to the sender at the next swap.
    pub(crate) test_user: Option<String>,
}

pub(crate) struct Shared {
    pub(crate) active: Mutex<ActiveSide>,
    pub(crate) ready: Notify,
    pub(crate) batch_config: BatchConfig,
}

/// Collects events into an in-memory batch and owns the background sender.
///
/// Report calls take one short lock and never touch disk or network, with
/// the exception of the onboarding-milestone and test-user calls which
/// update small files in the work directory.
pub struct EventDispatcher {
    pub(super) shared: Arc<Shared>,
    pub(super) custom_events: CustomEventTable,
    pub(super) milestones: Mutex<MilestoneCounter>,
    test_user_marker: TestUserMarker,
    identity: IdentityStore,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventDispatcher {
    /// Spawns the sender on the current tokio runtime.
    pub async fn start(config: DispatcherConfig) -> Result<Self, DispatcherError> {
        config.validate()?;
        let tuning = &config.tuning;

        let store = BatchStore::open(&config.work_dir).await;
        let client = HttpClient::new(config.client_config())?;
        let transmitter = BatchTransmitter::new(client);

        let custom_events = CustomEventTable::new(config.custom_events.clone());
        let schema = CustomEventSet::from_table(&custom_events)?;
        if !schema.is_empty()
            && let Err(e) = store.save_schema(&schema).await
        {
            warn!(version = schema.version, error = %e, "Failed to store custom event schema");
        }

        let mut meta = BatchMeta::new(config.install_id, config.user_id, config.data_session_id);
        meta.custom_events_version = schema.version;
        meta.start_time = unix_time_now();

        let test_user_marker = TestUserMarker::new(&config.work_dir);
        let shared = Arc::new(Shared {
            active: Mutex::new(ActiveSide {
                batch: Batch::new(meta),
                user_id: config.user_id,
                test_user: test_user_marker.read(),
            }),
            ready: Notify::new(),
            batch_config: tuning.batch_config(),
        });

        let queue = DeliveryQueue::new(
            store,
            transmitter,
            config.install_id,
            tuning.max_files_per_cycle,
            tuning.storage_cap(),
        );
        let cancel = CancellationToken::new();
        let sender = SenderLoop::new(
            Arc::clone(&shared),
            queue,
            Batch::new(meta),
            tuning.idle_wait,
            cancel.clone(),
        );
        let worker = tokio::spawn(sender.run());

        info!(
            work_dir = %config.work_dir.display(),
            endpoint = %config.endpoint,
            install_id = %config.install_id,
            schema_version = schema.version,
            "Event dispatcher started"
        );

        Ok(Self {
            shared,
            custom_events,
            milestones: Mutex::new(MilestoneCounter::load(&config.work_dir)),
            test_user_marker,
            identity: IdentityStore::new(&config.work_dir),
            cancel,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Cancels in-flight sends, persists what is buffered and waits for the
    /// sender to exit. Safe to call more than once.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.shared.ready.notify_one();

        let worker = self.worker.lock().take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            warn!(error = %e, "Sender task ended abnormally");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Appends under the swap lock; signals outside it.
    pub(super) fn record<F>(&self, append: F)
    where
        F: FnOnce(&mut ActiveSide, &BatchConfig) -> bool,
    {
        let signal = {
            let mut active = self.shared.active.lock();
            append(&mut active, &self.shared.batch_config)
        };
        if signal {
            self.shared.ready.notify_one();
        }
    }

    /// Appends one record. A payload whose shape does not match the code's
    /// declared shape is dropped, since it would make the whole file
    /// undecodable.
    pub fn add_event(&self, code: impl Into<u16>, payload: Payload) {
        let code = code.into();
        let expected = match EventKind::from_code(code) {
            Some(kind) => Some(kind.shape()),
            None if code >= FIRST_CUSTOM_EVENT_ID => self.custom_events.shape_of(code),
            None => None,
        };
        let Some(expected) = expected else {
            warn!(code, "Dropping event with unknown type code");
            return;
        };
        if expected != payload.shape() {
            warn!(code, ?expected, actual = ?payload.shape(), "Dropping event with mismatched payload");
            return;
        }

        self.record(|active, config| active.batch.append(code, &payload, config));
    }

    /// Requests an out-of-cycle swap and send.
    pub fn flush_now(&self) {
        self.shared.ready.notify_one();
    }

    pub fn set_user_id(&self, user_id: Uuid) {
        if let Err(e) = self.identity.save_user_id(user_id) {
            warn!(error = %e, "Failed to persist user id");
        }
        self.record(|active, config| {
            active.user_id = user_id;
            active.batch.meta_mut().user_id = user_id;
            active
                .batch
                .append(EventKind::UserIdAssigned.code(), &Payload::Empty, config)
        });
    }

    pub fn set_numeric_user_id(&self, user_id: u64) {
        self.set_user_id(crate::profile::numeric_user_id(user_id));
    }

    /// Marks this install as a tester from the next swap on.
    pub fn set_test_user(&self, name: &str) {
        if let Err(e) = self.test_user_marker.write(name) {
            warn!(error = %e, "Failed to persist test user marker");
        }
        self.shared.active.lock().test_user = Some(name.to_string());
    }

    pub fn custom_events(&self) -> &CustomEventTable {
        &self.custom_events
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.shared.ready.notify_one();
    }
}
