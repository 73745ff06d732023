//! Mutexes with the Priority Inheritance Protocol (PIP).
//!
//! This is the module that earns the rest of the crate's keep. A mutex
//! tracks its owner as `Option<TaskId>` rather than a separate
//! `locked: bool` plus an owner pointer; `locked` is just `owner.is_some()`,
//! so there is exactly one place a contradiction between the two could
//! ever occur: nowhere.
use log::warn;

use crate::error::{QueueKind, SchedulerError};
use crate::event::VisualState;
use crate::id::{MutexId, TaskId};
use crate::scheduler::Scheduler;
use crate::task::{BlockedOn, Priority, TaskState};
use crate::wait::WaitQueue;
use crate::WAIT_QUEUE_CAPACITY;

/// A mutex control block.
#[derive(Debug, Clone)]
pub struct Mutex {
    pub(crate) id: MutexId,
    pub name: String,
    pub(crate) owner: Option<TaskId>,
    pub(crate) wait_queue: WaitQueue<WAIT_QUEUE_CAPACITY>,
    pub(crate) destroyed: bool,
}

impl Mutex {
    pub(crate) fn new(id: MutexId, name: String) -> Self {
        Self {
            id,
            name,
            owner: None,
            wait_queue: WaitQueue::new(),
            destroyed: false,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn id(&self) -> MutexId {
        self.id
    }

    pub fn is_locked(&self) -> bool {
        self.owner.is_some()
    }

    pub fn owner(&self) -> Option<TaskId> {
        self.owner
    }

    pub fn waiters(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.wait_queue.iter()
    }
}

impl Scheduler {
    /// Lock `mutex` on behalf of `task`. See the module and spec §4.3 for
    /// the full contended-path protocol.
    pub fn mutex_lock(&mut self, mutex: MutexId, task: TaskId) -> Result<(), SchedulerError> {
        if !self.has_task(task) || !self.has_mutex(mutex) {
            return Err(SchedulerError::InvalidHandle);
        }

        let owner = self.mutex(mutex).owner;
        match owner {
            None => {
                self.assign_owner(mutex, task);
                let name = self.mutex(mutex).name.clone();
                self.log(task, VisualState::None, format!("{task} locks {name}"));
                Ok(())
            }
            Some(owner) => {
                let mutex_name = self.mutex(mutex).name.clone();
                self.log(
                    task,
                    VisualState::None,
                    format!("{task} contends for {mutex_name} held by {owner}"),
                );

                if self.pi_enabled && self.task(task).priority < self.task(owner).priority {
                    self.boost(owner, self.task(task).priority);
                }

                self.task_mut(task).blocked_on = Some(BlockedOn::Mutex(mutex));
                self.set_task_state(task, TaskState::Blocked);

                let priority = self.task(task).priority;
                let snapshot = self.priority_snapshot(self.mutex(mutex).waiters());
                let result = self.mutex_mut(mutex).wait_queue.insert(
                    task,
                    priority,
                    move |id| crate::scheduler::lookup(&snapshot, id),
                    QueueKind::MutexWaitQueue,
                );
                if let Err(err) = result {
                    warn!("{mutex_name}: {err}");
                    self.log(task, VisualState::None, format!("{err} on {mutex_name}"));
                }

                self.schedule();
                result
            }
        }
    }

    /// Unlock `mutex` on behalf of `task`. Only the current owner may do
    /// this; the step ordering here (emit → drop held → restore → hand
    /// off → dispatch) is load-bearing, see spec §4.3.
    pub fn mutex_unlock(&mut self, mutex: MutexId, task: TaskId) -> Result<(), SchedulerError> {
        if !self.has_task(task) || !self.has_mutex(mutex) {
            return Err(SchedulerError::InvalidHandle);
        }

        if self.mutex(mutex).owner != Some(task) {
            warn!(
                "{task} attempted to unlock {} it does not own",
                self.mutex(mutex).name
            );
            return Err(SchedulerError::NotOwner);
        }

        let mutex_name = self.mutex(mutex).name.clone();
        self.log(task, VisualState::None, format!("{task} unlocks {mutex_name}"));

        self.task_mut(task).held_mutexes.retain(|&m| m != mutex);

        if self.pi_enabled {
            self.restore(task);
        }

        let next_waiter = self.mutex_mut(mutex).wait_queue.pop_front();
        match next_waiter {
            Some(waiter) => {
                self.task_mut(waiter).blocked_on = None;
                self.assign_owner(mutex, waiter);
                self.set_task_state(waiter, TaskState::Ready);
                self.log(
                    waiter,
                    VisualState::None,
                    format!("{waiter} acquires {mutex_name}"),
                );
            }
            None => {
                self.mutex_mut(mutex).owner = None;
            }
        }

        self.schedule();
        Ok(())
    }

    /// Give `mutex`'s ownership to `task` and record it in the task's held
    /// set, without touching the wait queue or dispatching. Shared by the
    /// uncontended-lock and wake-next-waiter paths.
    fn assign_owner(&mut self, mutex: MutexId, task: TaskId) {
        self.mutex_mut(mutex).owner = Some(task);
        self.task_mut(task).held_mutexes.push(mutex);
    }

    /// Transitively boost the owner of a contended mutex to at least `p`.
    /// No-op if `p` is not strictly higher than `owner`'s current priority.
    /// See spec §4.3 for the full algorithm and its termination argument.
    pub(crate) fn boost(&mut self, owner: TaskId, p: Priority) {
        self.boost_bounded(owner, p, 0);
    }

    /// `boost`'s actual recursion, capped at the task count so a malformed
    /// (cyclic) block chain can't recurse forever. The protocol's own
    /// invariant (a task blocked on a mutex never owns it) rules this out
    /// in practice, but the bound costs nothing to keep.
    fn boost_bounded(&mut self, owner: TaskId, p: Priority, depth: usize) {
        if depth > self.tasks.len() {
            warn!("boost: recursion depth exceeded task count, aborting chain");
            return;
        }

        if p >= self.task(owner).priority {
            return;
        }

        if !self.task(owner).inherited {
            self.task_mut(owner).original_priority = self.task(owner).priority;
            self.task_mut(owner).inherited = true;
        }

        let old_priority = self.task(owner).priority;
        self.task_mut(owner).priority = p;
        self.task_mut(owner).stats.priority_boosts += 1;
        self.log(
            owner,
            VisualState::None,
            format!("{owner} priority boosted {old_priority} -> {p}"),
        );

        if self.ready_queue.contains(owner) {
            self.ready_queue.remove(owner);
            if let Err(err) = self.insert_ready(owner) {
                warn!("re-inserting boosted task into ready queue: {err}");
            }
        }

        if let Some(BlockedOn::Mutex(blocking_mutex)) = self.task(owner).blocked_on {
            if let Some(next_owner) = self.mutex(blocking_mutex).owner {
                self.boost_bounded(next_owner, p, depth + 1);
            }
        }
    }

    /// Recompute `task`'s effective priority from its current held set and
    /// their waiters' pressure, and clear the inheritance flag if it has
    /// fully unwound. No-op if `task` isn't currently inherited.
    pub(crate) fn restore(&mut self, task: TaskId) {
        if !self.task(task).inherited {
            return;
        }

        let mut needed = self.task(task).original_priority;
        for &held in &self.task(task).held_mutexes.clone() {
            for waiter in self.mutex(held).waiters() {
                needed = needed.min(self.task(waiter).priority);
            }
        }

        let old_priority = self.task(task).priority;
        self.task_mut(task).priority = needed;
        if needed == self.task(task).original_priority {
            self.task_mut(task).inherited = false;
        }

        if old_priority != needed {
            self.log(
                task,
                VisualState::None,
                format!("{task} priority restored {old_priority} -> {needed}"),
            );
        }

        if self.ready_queue.contains(task) && old_priority != needed {
            self.ready_queue.remove(task);
            if let Err(err) = self.insert_ready(task) {
                warn!("re-inserting restored task into ready queue: {err}");
            }
        }
    }

    /// Force-release every mutex `task` holds, e.g. on task termination or
    /// mutex/scheduler teardown. Each release follows the normal unlock
    /// path so waiters are woken correctly; no ownership is left dangling.
    pub(crate) fn force_release_all(&mut self, task: TaskId) {
        let held: Vec<MutexId> = self.task(task).held_mutexes.clone();
        for mutex in held {
            let _ = self.mutex_unlock(mutex, task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Policy;

    #[test]
    fn uncontended_lock_acquires_immediately() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        let m = sched.mutex_create("m");
        let t = sched.task_create("t", 5, 0, 0, 0).unwrap();
        sched.mutex_lock(m, t).unwrap();
        assert_eq!(sched.mutex(m).owner(), Some(t));
        assert_eq!(sched.task(t).held_mutexes(), &[m]);
    }

    #[test]
    fn contended_lock_boosts_lower_priority_owner() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        let m = sched.mutex_create("m");
        let low = sched.task_create("low", 10, 0, 0, 0).unwrap();
        sched.schedule();
        sched.mutex_lock(m, low).unwrap();

        let high = sched.task_create("high", 1, 0, 0, 0).unwrap();
        sched.mutex_lock(m, high).unwrap();

        assert_eq!(sched.task(low).priority(), 1);
        assert!(sched.task(low).is_inherited());
        assert_eq!(sched.task(low).stats().priority_boosts, 1);
        assert_eq!(sched.task(high).state(), TaskState::Blocked);
    }

    #[test]
    fn no_boost_without_pi_enabled() {
        let mut sched = Scheduler::new(Policy::Priority, false);
        let m = sched.mutex_create("m");
        let low = sched.task_create("low", 10, 0, 0, 0).unwrap();
        sched.schedule();
        sched.mutex_lock(m, low).unwrap();

        let high = sched.task_create("high", 1, 0, 0, 0).unwrap();
        sched.mutex_lock(m, high).unwrap();

        assert_eq!(sched.task(low).priority(), 10);
        assert!(!sched.task(low).is_inherited());
    }

    #[test]
    fn unlock_restores_priority_and_hands_off_to_waiter() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        let m = sched.mutex_create("m");
        let low = sched.task_create("low", 10, 0, 0, 0).unwrap();
        sched.schedule();
        sched.mutex_lock(m, low).unwrap();

        let high = sched.task_create("high", 1, 0, 0, 0).unwrap();
        sched.mutex_lock(m, high).unwrap();
        assert_eq!(sched.task(low).priority(), 1);

        sched.mutex_unlock(m, low).unwrap();

        assert_eq!(sched.task(low).priority(), sched.task(low).original_priority());
        assert!(!sched.task(low).is_inherited());
        assert_eq!(sched.mutex(m).owner(), Some(high));
        assert_eq!(sched.task(high).state(), TaskState::Ready);
    }

    #[test]
    fn non_owner_unlock_is_rejected() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        let m = sched.mutex_create("m");
        let owner = sched.task_create("owner", 5, 0, 0, 0).unwrap();
        let other = sched.task_create("other", 5, 0, 0, 0).unwrap();
        sched.mutex_lock(m, owner).unwrap();
        assert_eq!(sched.mutex_unlock(m, other), Err(SchedulerError::NotOwner));
    }

    #[test]
    fn restore_accounts_for_remaining_waiter_pressure_across_multiple_mutexes() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        let a = sched.mutex_create("a");
        let b = sched.mutex_create("b");
        let low = sched.task_create("low", 20, 0, 0, 0).unwrap();
        sched.schedule();
        sched.mutex_lock(a, low).unwrap();
        sched.mutex_lock(b, low).unwrap();

        let mid = sched.task_create("mid", 10, 0, 0, 0).unwrap();
        sched.mutex_lock(a, mid).unwrap();
        let high = sched.task_create("high", 1, 0, 0, 0).unwrap();
        sched.mutex_lock(b, high).unwrap();

        assert_eq!(sched.task(low).priority(), 1);

        // Releasing `b` (high's mutex) should drop low only to mid's
        // pressure (10), not all the way back to its original 20.
        sched.mutex_unlock(b, low).unwrap();
        assert_eq!(sched.task(low).priority(), 10);
        assert!(sched.task(low).is_inherited());

        sched.mutex_unlock(a, low).unwrap();
        assert_eq!(sched.task(low).priority(), sched.task(low).original_priority());
        assert!(!sched.task(low).is_inherited());
    }
}
