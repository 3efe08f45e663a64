use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::OwnedMutexGuard;
use tracing::warn;

use super::{Runtime, State};
use crate::types::{BatchState, Direction, Transfer};

impl State {
    fn batch_slot(&mut self, direction: Direction) -> &mut Option<BatchState> {
        match direction {
            Direction::Uploading => &mut self.batch_upload,
            Direction::Downloading => &mut self.batch_download,
        }
    }

    fn direction_has_live_transfer(&self, direction: Direction, excluding: &str) -> bool {
        self.transfers
            .values()
            .any(|t| t.direction == direction && t.id != excluding)
    }

    /// Shared batch-singleton bookkeeping for a transfer leaving the system,
    /// whether it finished normally or was torn down by a device revocation.
    /// Advances `active_files`/`completed_files` for `batch_id`'s direction
    /// and clears the singleton once `completed_files` reaches `total_files`.
    /// A no-op if `batch_id` is `None` or no longer matches the live batch.
    pub(crate) fn advance_batch_on_completion(&mut self, direction: Direction, batch_id: &Option<String>) {
        let Some(id) = batch_id else { return };
        let clear = {
            let slot = self.batch_slot(direction);
            if let Some(batch) = slot {
                if &batch.batch_id == id {
                    batch.active_files = batch.active_files.saturating_sub(1);
                    batch.completed_files += 1;
                    batch.completed_files >= batch.total_files
                } else {
                    false
                }
            } else {
                false
            }
        };
        if clear {
            *self.batch_slot(direction) = None;
        }
    }
}

impl Runtime {
    /// Allocates a `Transfer` for `device_id` and hands back a ticket once it
    /// is this device's turn. Queue and Admit happen under the global lock or
    /// the device's fair lock respectively; the caller's I/O never runs while
    /// either lock is held by this method.
    #[allow(clippy::too_many_arguments)]
    pub async fn begin_transfer(
        &self,
        device_id: &str,
        direction: Direction,
        total_bytes: u64,
        batch_id: Option<String>,
        batch_total_files: u32,
        batch_total_bytes: u64,
        _batch_completed_files: u32,
    ) -> Option<TransferTicket> {
        // --- Queue: allocate under the global lock ---
        let transfer_id = Runtime::new_uuid_v4();
        let generation = {
            let mut state = self.inner.state.lock().await;
            if !state.paired.contains_key(device_id) {
                return None;
            }
            let generation = state
                .device_runtime
                .get(device_id)
                .map(|rt| rt.cancel_generation)
                .unwrap_or(0);
            state.transfers.insert(
                transfer_id.clone(),
                Transfer {
                    id: transfer_id.clone(),
                    device_id: device_id.to_string(),
                    direction,
                    total_bytes,
                    transferred_bytes: 0,
                    active: false,
                    generation,
                    batch_id: batch_id.clone(),
                },
            );
            if let Some(rt) = state.device_runtime.get_mut(device_id) {
                rt.queued_transfers += 1;
            }
            generation
        };

        // --- Admit: block on this device's fair FIFO lock, outside the global lock ---
        let lock = self.device_lock(device_id);
        let guard = lock.lock_owned().await;

        // --- Run: re-validate, flip active, apply batch accounting ---
        let mut state = self.inner.state.lock().await;
        if !state.paired.contains_key(device_id)
            || state
                .device_runtime
                .get(device_id)
                .map(|rt| rt.cancel_generation != generation)
                .unwrap_or(true)
        {
            state.transfers.remove(&transfer_id);
            if let Some(rt) = state.device_runtime.get_mut(device_id) {
                rt.queued_transfers = rt.queued_transfers.saturating_sub(1);
            }
            return None;
        }

        if let Some(transfer) = state.transfers.get_mut(&transfer_id) {
            transfer.active = true;
        }
        if let Some(rt) = state.device_runtime.get_mut(device_id) {
            rt.queued_transfers = rt.queued_transfers.saturating_sub(1);
            rt.active_transfers += 1;
        }

        match &batch_id {
            Some(id) => {
                let slot = state.batch_slot(direction);
                match slot {
                    Some(existing) if &existing.batch_id == id => {
                        existing.total_files = existing.total_files.max(batch_total_files);
                        existing.total_bytes = existing.total_bytes.max(batch_total_bytes);
                        existing.active_files += 1;
                    }
                    _ => {
                        *slot = Some(BatchState {
                            batch_id: id.clone(),
                            total_files: batch_total_files,
                            completed_files: 0,
                            active_files: 1,
                            total_bytes: batch_total_bytes,
                        });
                    }
                }
            }
            None => {
                if !state.direction_has_live_transfer(direction, &transfer_id) {
                    *state.batch_slot(direction) = None;
                }
            }
        }
        drop(state);

        Some(TransferTicket {
            runtime: self.clone(),
            transfer_id,
            device_id: device_id.to_string(),
            generation,
            direction,
            batch_id,
            closed: AtomicBool::new(false),
            _device_guard: guard,
        })
    }

    async fn finish_transfer(&self, transfer_id: &str, device_id: &str, batch_id: &Option<String>, direction: Direction) {
        let mut state = self.inner.state.lock().await;
        state.transfers.remove(transfer_id);

        if let Some(rt) = state.device_runtime.get_mut(device_id) {
            rt.active_transfers = rt.active_transfers.saturating_sub(1);
        }

        state.advance_batch_on_completion(direction, batch_id);
    }

    /// Current aggregate progress for `direction`'s batch (or the sum of its
    /// live, non-batched transfers when no batch is known).
    pub async fn overall_progress(&self, direction: Direction) -> crate::types::OverallProgress {
        let state = self.inner.state.lock().await;
        if let Some(batch) = match direction {
            Direction::Uploading => &state.batch_upload,
            Direction::Downloading => &state.batch_download,
        } {
            let transferred: u64 = state
                .transfers
                .values()
                .filter(|t| t.direction == direction && t.batch_id.as_deref() == Some(batch.batch_id.as_str()))
                .map(|t| t.transferred_bytes)
                .sum();
            return crate::types::OverallProgress {
                transferred_bytes: transferred,
                total_bytes: batch.total_bytes,
            };
        }
        let mut total = 0u64;
        let mut transferred = 0u64;
        for t in state.transfers.values().filter(|t| t.direction == direction) {
            total += t.total_bytes;
            transferred += t.transferred_bytes;
        }
        crate::types::OverallProgress {
            transferred_bytes: transferred,
            total_bytes: total,
        }
    }
}

/// Handle the streaming I/O layer uses to report progress and observe
/// cancellation. Holds the device's fair transfer lock for its entire
/// lifetime, so a second transfer for the same device cannot start until this
/// one is closed.
pub struct TransferTicket {
    runtime: Runtime,
    transfer_id: String,
    device_id: String,
    generation: u64,
    direction: Direction,
    batch_id: Option<String>,
    closed: AtomicBool,
    _device_guard: OwnedMutexGuard<()>,
}

impl TransferTicket {
    pub fn id(&self) -> &str {
        &self.transfer_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Adds to both the Transfer and the direction's aggregate accounting.
    /// Monotonically non-decreasing; a zero delta is a no-op.
    pub async fn add_progress(&self, delta: u64) {
        if delta == 0 {
            return;
        }
        let mut state = self.runtime.inner.state.lock().await;
        if let Some(transfer) = state.transfers.get_mut(&self.transfer_id) {
            transfer.transferred_bytes += delta;
        }
    }

    /// True iff the device is no longer paired, or this transfer's snapshot
    /// generation no longer matches the device's current cancel generation
    /// (i.e. the device was revoked after this transfer started).
    pub async fn cancelled(&self) -> bool {
        let state = self.runtime.inner.state.lock().await;
        if !state.paired.contains_key(&self.device_id) {
            return true;
        }
        state
            .device_runtime
            .get(&self.device_id)
            .map(|rt| rt.cancel_generation != self.generation)
            .unwrap_or(true)
    }

    /// Idempotent. Restores device counters, advances batch bookkeeping, and
    /// clears the batch singleton when it was the last transfer of the batch.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.runtime
            .finish_transfer(&self.transfer_id, &self.device_id, &self.batch_id, self.direction)
            .await;
    }
}

impl Drop for TransferTicket {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            warn!(transfer_id = %self.transfer_id, "transfer ticket dropped without close(); counters may be stale until GC");
        }
    }
}
