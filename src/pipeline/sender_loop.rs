use super::delivery::DeliveryQueue;
use super::dispatcher::Shared;
use crate::buffer::Batch;
use crate::codec::drop_marker;
use crate::domain::{BatchMeta, DropReason, unix_time_now};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Background worker: swaps the double buffer, persists the sending side and
/// drains the queue.
pub struct SenderLoop {
    shared: Arc<Shared>,
    queue: DeliveryQueue,
    sending: Batch,
    next_batch_num: i32,
    idle_wait: Duration,
    cancel: CancellationToken,
}

impl SenderLoop {
    pub(crate) fn new(
        shared: Arc<Shared>,
        queue: DeliveryQueue,
        sending: Batch,
        idle_wait: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared,
            queue,
            sending,
            next_batch_num: 0,
            idle_wait,
            cancel,
        }
    }

    pub async fn run(mut self) {
        self.queue.load().await;
        self.next_batch_num = self.queue.next_free_batch_num();
        self.queue.enforce_cap().await;

        loop {
            let reachable = self.queue.send_pending(&self.cancel).await;
            let wait = if reachable && !self.queue.is_empty() {
                Duration::ZERO
            } else {
                self.idle_wait
            };

            let signalled = tokio::select! {
                biased;
                () = self.shared.ready.notified() => true,
                () = self.cancel.cancelled() => false,
                () = tokio::time::sleep(wait) => false,
            };

            if self.cancel.is_cancelled() {
                // Whatever the producers appended last still reaches disk.
                self.swap();
                self.persist_sending().await;
                break;
            }
            if signalled {
                self.swap();
                self.persist_sending().await;
            }
        }

        info!(queued = self.queue.pending().len(), "Sender loop stopped");
    }

    fn swap(&mut self) {
        let now = unix_time_now();
        {
            let mut active = self.shared.active.lock();
            std::mem::swap(&mut active.batch, &mut self.sending);
            let user_id = active.user_id;
            active.batch.reset(user_id, now);
            if let Some(name) = active.test_user.take() {
                self.queue.set_test_user(name);
            }
        }
        self.sending.meta_mut().end_time = now;
    }

    /// Writes the sending buffer as one file per segment, or as a single drop
    /// marker when the queue is full even after reduction.
    async fn persist_sending(&mut self) {
        if self.sending.is_empty() {
            return;
        }

        let total = self.queue.enforce_cap().await;
        let base = *self.sending.meta();

        if total < self.queue.storage_cap().max_bytes {
            for segment in self.sending.segments() {
                let meta = BatchMeta {
                    batch_num: self.next_batch_num,
                    ..base
                };
                self.next_batch_num = self.next_batch_num.wrapping_add(1);
                match self.queue.store().save_batch(&meta, segment).await {
                    Ok(info) => self.queue.enqueue(info),
                    Err(e) => warn!(
                        batch_num = meta.batch_num,
                        bytes = segment.len(),
                        error = %e,
                        "Dropping batch that could not be written"
                    ),
                }
            }
        } else {
            let meta = BatchMeta {
                batch_num: self.next_batch_num,
                ..base
            };
            self.next_batch_num = self.next_batch_num.wrapping_add(1);
            warn!(
                queued_bytes = total,
                dropped_bytes = self.sending.len(),
                "Storage cap reached, persisting drop marker instead of batch"
            );
            match self
                .queue
                .store()
                .save_batch(&meta, &drop_marker(DropReason::TooManyUnsentEvents))
                .await
            {
                Ok(info) => self.queue.enqueue(info),
                Err(e) => warn!(error = %e, "Failed to write drop marker"),
            }
        }

        debug!(
            bytes = self.sending.len(),
            queued = self.queue.pending().len(),
            "Persisted sending batch"
        );
    }
}
