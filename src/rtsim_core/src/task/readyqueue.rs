//! The priority-sorted ready queue.
//!
//! A bounded, priority-sorted sequence: index `0` holds the task with the
//! numerically lowest (logically highest) priority. Insertion scans for
//! the first entry with a strictly greater priority number and places the
//! new task immediately before it; ties place the new task *after*
//! existing equal-priority entries, giving FIFO order among equal
//! priorities. Removal is by identity. Peek/pop operate on index 0.
//!
//! Insertion and removal are therefore O(n); peek/pop are O(1). This
//! mirrors the ordering contract of the kernel's own ready-queue
//! abstraction, just backed by a flat bounded vector of handles instead of
//! a segregated per-priority intrusive list. The task/priority count this
//! simulator targets never justifies the bitmap-indexed structure the
//! kernel uses at scale.
use arrayvec::ArrayVec;

use crate::error::{QueueKind, SchedulerError};
use crate::id::TaskId;
use crate::task::Priority;

/// A bounded, priority-sorted queue of [`TaskId`]s.
///
/// Overflow (an insertion beyond `CAP`) is a fatal configuration error: it
/// is reported via [`SchedulerError::CapacityExceeded`] and the insertion
/// is dropped rather than silently losing the task from the queue in a way
/// that would look like a successful insert.
#[derive(Debug, Clone)]
pub struct ReadyQueue<const CAP: usize> {
    entries: ArrayVec<TaskId, CAP>,
}

impl<const CAP: usize> Default for ReadyQueue<CAP> {
    fn default() -> Self {
        Self {
            entries: ArrayVec::new(),
        }
    }
}

impl<const CAP: usize> ReadyQueue<CAP> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.entries.contains(&task)
    }

    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.entries.iter().copied()
    }

    /// Insert `task`, whose effective priority is `priority`. `priority_of`
    /// resolves the effective priority of any task already queued, so the
    /// insertion point can be found without this queue needing to own
    /// priority data itself.
    pub fn insert(
        &mut self,
        task: TaskId,
        priority: Priority,
        priority_of: impl Fn(TaskId) -> Priority,
    ) -> Result<(), SchedulerError> {
        debug_assert!(!self.contains(task), "task already in ready queue");

        let pos = self
            .entries
            .iter()
            .position(|&queued| priority_of(queued) > priority)
            .unwrap_or(self.entries.len());

        self.entries.try_insert(pos, task).map_err(|_| {
            SchedulerError::CapacityExceeded {
                queue: QueueKind::ReadyQueue,
            }
        })
    }

    /// Remove `task` by identity. Returns whether it was present.
    pub fn remove(&mut self, task: TaskId) -> bool {
        if let Some(pos) = self.entries.iter().position(|&t| t == task) {
            self.entries.remove(pos);
            true
        } else {
            false
        }
    }

    /// The highest-priority (lowest-number) queued task, without removing it.
    pub fn peek(&self) -> Option<TaskId> {
        self.entries.first().copied()
    }

    /// Remove and return the highest-priority queued task.
    pub fn pop(&mut self) -> Option<TaskId> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }
}
