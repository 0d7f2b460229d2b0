// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cancellable delayed tasks.
//!
//! A [`TaskSlot`] holds at most one pending task for a single purpose (lease
//! renewal, status polling). Scheduling into a slot cancels whatever was
//! pending there, so two renewals can never be in flight for one lease.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct SlotState {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

/// A slot holding at most one delayed task.
///
/// When the delay elapses the task first detaches itself from the slot and
/// only then runs its work. The work may therefore schedule the same slot
/// again without cancelling itself.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use homehub_lib::schedule::TaskSlot;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let slot = TaskSlot::new();
/// slot.schedule(Duration::from_secs(60), async { println!("never") });
/// slot.schedule(Duration::from_millis(1), async { println!("replaced") });
/// assert!(slot.is_pending());
/// slot.cancel();
/// assert!(!slot.is_pending());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct TaskSlot {
    state: Mutex<SlotState>,
}

impl TaskSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Runs `work` after `delay`, cancelling any task pending in this slot.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(self: &Arc<Self>, delay: Duration, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let slot: Weak<Self> = Arc::downgrade(self);
        let mut state = self.state.lock();
        if let Some(previous) = state.handle.take() {
            previous.abort();
        }
        state.generation += 1;
        let generation = state.generation;

        // The lock is held across the spawn so the handle is stored before
        // the task can try to release it.
        state.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let still_current = slot.upgrade().is_some_and(|slot| slot.release(generation));
            if still_current {
                work.await;
            }
        }));
    }

    fn release(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.handle = None;
        true
    }

    /// Cancels the pending task, if any.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        if let Some(handle) = state.handle.take() {
            handle.abort();
        }
    }

    /// Returns `true` while a task is waiting for its delay.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.lock().handle.is_some()
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().handle.take() {
            handle.abort();
        }
    }
}
