//! Counting semaphores (P/V), deliberately without priority inheritance.
//!
//! Unlike [`crate::mutex`], a semaphore's "owner", if any, is whichever
//! task happens to call `signal`, not necessarily the task that consumed
//! the last permit. There is no stable owner to boost, so PIP does not
//! apply here (spec §4.3's Non-goals); waiters still wake in priority
//! order, same as the ready queue and mutex wait queues.
use log::warn;

use crate::error::{QueueKind, SchedulerError};
use crate::event::VisualState;
use crate::id::{SemaphoreId, TaskId};
use crate::scheduler::{lookup, Scheduler};
use crate::task::{BlockedOn, TaskState};
use crate::wait::WaitQueue;
use crate::WAIT_QUEUE_CAPACITY;

/// A counting semaphore control block.
#[derive(Debug, Clone)]
pub struct Semaphore {
    pub(crate) id: SemaphoreId,
    pub name: String,
    pub(crate) count: u32,
    pub(crate) max: u32,
    pub(crate) wait_queue: WaitQueue<WAIT_QUEUE_CAPACITY>,
    pub(crate) destroyed: bool,
}

impl Semaphore {
    pub(crate) fn new(id: SemaphoreId, name: String, initial: u32, max: u32) -> Self {
        Self {
            id,
            name,
            count: initial.min(max),
            max,
            wait_queue: WaitQueue::new(),
            destroyed: false,
        }
    }

    pub fn id(&self) -> SemaphoreId {
        self.id
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn waiters(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.wait_queue.iter()
    }
}

impl Scheduler {
    /// Take a permit (`P`). If none is available, block `task` in priority
    /// order until a `semaphore_signal` hands one to it directly.
    pub fn semaphore_wait(&mut self, semaphore: SemaphoreId, task: TaskId) -> Result<(), SchedulerError> {
        if !self.has_task(task) || !self.has_semaphore(semaphore) {
            return Err(SchedulerError::InvalidHandle);
        }

        if self.semaphore(semaphore).count > 0 {
            self.semaphore_mut(semaphore).count -= 1;
            let name = self.semaphore(semaphore).name.clone();
            self.log(task, VisualState::None, format!("{task} takes {name}"));
            return Ok(());
        }

        let name = self.semaphore(semaphore).name.clone();
        self.log(task, VisualState::None, format!("{task} blocks on {name}"));

        self.task_mut(task).blocked_on = Some(BlockedOn::Semaphore(semaphore));
        self.set_task_state(task, TaskState::Blocked);

        let priority = self.task(task).priority;
        let snapshot = self.priority_snapshot(self.semaphore(semaphore).waiters());
        let result = self.semaphore_mut(semaphore).wait_queue.insert(
            task,
            priority,
            move |id| lookup(&snapshot, id),
            QueueKind::SemaphoreWaitQueue,
        );
        if let Err(err) = &result {
            warn!("{name}: {err}");
            self.log(task, VisualState::None, format!("{err} on {name}"));
        }

        self.schedule();
        result
    }

    /// Release a permit (`V`). If a task is waiting, the permit is handed
    /// directly to the highest-priority waiter (it never touches `count`);
    /// otherwise `count` grows, capped at `max`.
    pub fn semaphore_signal(&mut self, semaphore: SemaphoreId, task: TaskId) -> Result<(), SchedulerError> {
        if !self.has_task(task) || !self.has_semaphore(semaphore) {
            return Err(SchedulerError::InvalidHandle);
        }

        let name = self.semaphore(semaphore).name.clone();
        self.log(task, VisualState::None, format!("{task} signals {name}"));

        match self.semaphore_mut(semaphore).wait_queue.pop_front() {
            Some(waiter) => {
                self.task_mut(waiter).blocked_on = None;
                self.set_task_state(waiter, TaskState::Ready);
                self.log(waiter, VisualState::None, format!("{waiter} woken by {name}"));
            }
            None => {
                let sem = self.semaphore_mut(semaphore);
                if sem.count < sem.max {
                    sem.count += 1;
                } else {
                    warn!("{name}: signaled at max count {}", sem.max);
                }
            }
        }

        self.schedule();
        Ok(())
    }

    /// Destroy a semaphore, waking any waiters with a warning rather than
    /// leaving them blocked forever.
    pub fn semaphore_destroy(&mut self, semaphore: SemaphoreId) -> Result<(), SchedulerError> {
        if !self.has_semaphore(semaphore) {
            return Err(SchedulerError::InvalidHandle);
        }

        while let Some(waiter) = self.semaphore_mut(semaphore).wait_queue.pop_front() {
            warn!(
                "{}: waiter {waiter} abandoned on destroy",
                self.semaphore(semaphore).name
            );
            self.task_mut(waiter).blocked_on = None;
            self.set_task_state(waiter, TaskState::Ready);
        }

        self.semaphore_mut(semaphore).destroyed = true;
        self.schedule();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Policy;

    #[test]
    fn wait_consumes_available_permit_without_blocking() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        let sem = sched.semaphore_create("sem", 1, 1);
        let t = sched.task_create("t", 10, 0, 0, 0).unwrap();
        sched.semaphore_wait(sem, t).unwrap();
        assert_eq!(sched.semaphore(sem).count(), 0);
        assert_eq!(sched.task(t).state(), crate::task::TaskState::Ready);
    }

    #[test]
    fn signal_wakes_highest_priority_waiter_directly() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        let sem = sched.semaphore_create("sem", 0, 1);
        let low = sched.task_create("low", 20, 0, 0, 0).unwrap();
        let high = sched.task_create("high", 5, 0, 0, 0).unwrap();

        sched.semaphore_wait(sem, low).unwrap();
        sched.semaphore_wait(sem, high).unwrap();
        assert_eq!(sched.task(low).state(), crate::task::TaskState::Blocked);
        assert_eq!(sched.task(high).state(), crate::task::TaskState::Blocked);

        let signaler = sched.task_create("signaler", 1, 0, 0, 0).unwrap();
        sched.semaphore_signal(sem, signaler).unwrap();

        assert_eq!(sched.task(high).state(), crate::task::TaskState::Ready);
        assert_eq!(sched.task(low).state(), crate::task::TaskState::Blocked);
        assert_eq!(sched.semaphore(sem).count(), 0);
    }

    #[test]
    fn signal_with_no_waiters_grows_count_up_to_max() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        let sem = sched.semaphore_create("sem", 0, 2);
        let t = sched.task_create("t", 10, 0, 0, 0).unwrap();
        sched.semaphore_signal(sem, t).unwrap();
        assert_eq!(sched.semaphore(sem).count(), 1);
        sched.semaphore_signal(sem, t).unwrap();
        assert_eq!(sched.semaphore(sem).count(), 2);
        sched.semaphore_signal(sem, t).unwrap();
        assert_eq!(sched.semaphore(sem).count(), 2);
    }
}
