//! A priority-ordered wait queue shared by mutexes and semaphores.
//!
//! Both subsystems need the exact same queuing discipline, priority
//! ascending with FIFO among ties, so it lives here once rather than being
//! duplicated. The discipline is identical to the ready queue's; the only
//! difference is what a queue member *means* (blocked on a resource, not
//! runnable) and that popping here always means "wake the highest-priority
//! waiter", never "dispatch".
use arrayvec::ArrayVec;

use crate::error::{QueueKind, SchedulerError};
use crate::id::TaskId;
use crate::task::Priority;

/// A bounded, priority-ordered queue of blocked tasks.
#[derive(Debug, Clone)]
pub struct WaitQueue<const CAP: usize> {
    entries: ArrayVec<TaskId, CAP>,
}

impl<const CAP: usize> Default for WaitQueue<CAP> {
    fn default() -> Self {
        Self {
            entries: ArrayVec::new(),
        }
    }
}

impl<const CAP: usize> WaitQueue<CAP> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert `task`, currently at `priority`, preserving priority-ascending,
    /// FIFO-on-tie order.
    pub fn insert(
        &mut self,
        task: TaskId,
        priority: Priority,
        priority_of: impl Fn(TaskId) -> Priority,
        queue_kind: QueueKind,
    ) -> Result<(), SchedulerError> {
        let pos = self
            .entries
            .iter()
            .position(|&queued| priority_of(queued) > priority)
            .unwrap_or(self.entries.len());

        self.entries
            .try_insert(pos, task)
            .map_err(|_| SchedulerError::CapacityExceeded { queue: queue_kind })
    }

    pub fn remove(&mut self, task: TaskId) -> bool {
        if let Some(pos) = self.entries.iter().position(|&t| t == task) {
            self.entries.remove(pos);
            true
        } else {
            false
        }
    }

    /// Pop the front (highest-priority) waiter, if any.
    pub fn pop_front(&mut self) -> Option<TaskId> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.entries.iter().copied()
    }
}
