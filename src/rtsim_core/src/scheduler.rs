//! The scheduler: task/mutex/semaphore registries, dispatch, and the
//! glue that keeps the cyclic task/resource reference graph consistent.
//!
//! All state lives in one `Scheduler` instance, owned by the single
//! simulation thread. There is no internal synchronization here, by
//! design (spec §5): tasks, mutexes, and the event log are mutated only
//! through this API, never concurrently.
use log::warn;

use crate::error::SchedulerError;
use crate::event::{Event, EventLog, VisualState};
use crate::id::{MutexId, SemaphoreId, TaskId};
use crate::mutex::Mutex;
use crate::semaphore::Semaphore;
use crate::task::readyqueue::ReadyQueue;
use crate::task::{Priority, Task, TaskState, IDLE_PRIORITY};
use crate::{READY_QUEUE_CAPACITY, WAIT_QUEUE_CAPACITY};

/// The scheduling policy in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Priorities are whatever the caller assigns at `task_create`/
    /// `task_set_priority` time.
    Priority,
    /// Priorities are derived from task periods by [`Scheduler::rm_recalculate`]
    /// (shorter period = higher priority).
    RateMonotonic,
}

/// Owns every task, mutex, and semaphore in a simulation run, the ready
/// queue, and the event log.
pub struct Scheduler {
    pub(crate) policy: Policy,
    pub(crate) pi_enabled: bool,

    pub(crate) tasks: Vec<Task>,
    pub(crate) mutexes: Vec<Mutex>,
    pub(crate) semaphores: Vec<Semaphore>,

    pub(crate) ready_queue: ReadyQueue<READY_QUEUE_CAPACITY>,
    pub(crate) current_task: Option<TaskId>,
    pub(crate) idle_task: TaskId,

    pub(crate) system_ticks: u64,
    pub(crate) context_switches: u64,

    event_log: EventLog,
}

impl Scheduler {
    /// Create a scheduler and its idle task.
    ///
    /// The idle task is registered like any other task but is never placed
    /// in the ready queue; the dispatcher falls back to it only when the
    /// ready queue is empty (spec §4.1).
    pub fn new(policy: Policy, pi_enabled: bool) -> Self {
        let idle = Task::new(TaskId::new(0), "idle".to_string(), IDLE_PRIORITY, 0, 0, 0);
        let mut sched = Self {
            policy,
            pi_enabled,
            tasks: vec![idle],
            mutexes: Vec::new(),
            semaphores: Vec::new(),
            ready_queue: ReadyQueue::new(),
            current_task: None,
            idle_task: TaskId::new(0),
            system_ticks: 0,
            context_switches: 0,
            event_log: EventLog::new(),
        };
        sched.log(TaskId::new(0), VisualState::None, "idle task created");
        sched
    }

    // -- accessors -----------------------------------------------------

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn pi_enabled(&self) -> bool {
        self.pi_enabled
    }

    pub fn system_ticks(&self) -> u64 {
        self.system_ticks
    }

    pub fn context_switches(&self) -> u64 {
        self.context_switches
    }

    pub fn current_task(&self) -> Option<TaskId> {
        self.current_task
    }

    pub fn idle_task(&self) -> TaskId {
        self.idle_task
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn task(&self, id: TaskId) -> &Task {
        &self.tasks[id.index()]
    }

    pub(crate) fn task_mut(&mut self, id: TaskId) -> &mut Task {
        &mut self.tasks[id.index()]
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn mutex(&self, id: MutexId) -> &Mutex {
        &self.mutexes[id.index()]
    }

    pub(crate) fn mutex_mut(&mut self, id: MutexId) -> &mut Mutex {
        &mut self.mutexes[id.index()]
    }

    pub fn mutexes(&self) -> impl Iterator<Item = &Mutex> {
        self.mutexes.iter()
    }

    pub fn semaphore(&self, id: SemaphoreId) -> &Semaphore {
        &self.semaphores[id.index()]
    }

    pub(crate) fn semaphore_mut(&mut self, id: SemaphoreId) -> &mut Semaphore {
        &mut self.semaphores[id.index()]
    }

    pub fn semaphores(&self) -> impl Iterator<Item = &Semaphore> {
        self.semaphores.iter()
    }

    pub(crate) fn has_task(&self, id: TaskId) -> bool {
        id.index() < self.tasks.len()
    }

    pub(crate) fn has_mutex(&self, id: MutexId) -> bool {
        id.index() < self.mutexes.len() && !self.mutexes[id.index()].destroyed
    }

    pub(crate) fn has_semaphore(&self, id: SemaphoreId) -> bool {
        id.index() < self.semaphores.len() && !self.semaphores[id.index()].destroyed
    }

    /// Append an event. `task` of `None` records an annotation-only event.
    pub(crate) fn log(&mut self, task: impl Into<Option<TaskId>>, visual_state: VisualState, annotation: impl Into<String>) {
        self.event_log.push(self.system_ticks, task.into(), visual_state, annotation);
    }

    /// Snapshot the effective priorities of a set of tasks, so a closure
    /// passed into a bounded-queue insert doesn't need to borrow `self`
    /// (which would collide with the `&mut self` needed to perform the
    /// insert itself).
    pub(crate) fn priority_snapshot(&self, ids: impl Iterator<Item = TaskId>) -> Vec<(TaskId, Priority)> {
        ids.map(|id| (id, self.task(id).priority)).collect()
    }

    // -- task lifecycle --------------------------------------------------

    /// Create a task. `period == 0` means aperiodic. `deadline == 0` means
    /// an implicit deadline equal to the period. `work` is the initial
    /// simulated work budget (also used as the WCET proxy for
    /// [`rm_utilization`](crate::rm::rm_utilization)).
    ///
    /// Under [`Policy::RateMonotonic`] with `period > 0`, `priority` is
    /// overridden by the period value; a subsequent
    /// [`rm_recalculate`](crate::rm::rm_recalculate) finalizes ranks.
    pub fn task_create(
        &mut self,
        name: impl Into<String>,
        priority: Priority,
        period: u64,
        deadline: u64,
        work: u64,
    ) -> Result<TaskId, SchedulerError> {
        if self.tasks.len() >= READY_QUEUE_CAPACITY {
            return Err(SchedulerError::CapacityExceeded {
                queue: crate::error::QueueKind::TaskRegistry,
            });
        }

        let relative_deadline = if deadline == 0 { period } else { deadline };
        let effective_priority = if self.policy == Policy::RateMonotonic && period > 0 {
            period as usize
        } else {
            priority
        };

        let id = TaskId::new(self.tasks.len());
        let mut task = Task::new(id, name.into(), effective_priority, period, relative_deadline, work);
        // A task's first activation is implicitly a release at the current
        // tick, periodic or not; periodic re-releases refresh this in
        // `periodic_release_pass`.
        if relative_deadline > 0 {
            task.absolute_deadline = self.system_ticks + relative_deadline;
        }
        self.tasks.push(task);

        self.log(id, VisualState::Ready, format!("{id} created"));
        self.insert_ready(id)?;
        Ok(id)
    }

    /// Set a task's lifecycle state directly, keeping ready-queue
    /// membership consistent with it (invariant 1 in spec §3).
    pub fn task_set_state(&mut self, task: TaskId, state: TaskState) -> Result<(), SchedulerError> {
        if !self.has_task(task) {
            return Err(SchedulerError::InvalidHandle);
        }
        self.set_task_state(task, state);
        Ok(())
    }

    pub(crate) fn set_task_state(&mut self, task: TaskId, state: TaskState) {
        self.tasks[task.index()].state = state;

        let is_idle = self.task(task).is_idle();
        if state == TaskState::Ready && !is_idle {
            if !self.ready_queue.contains(task) {
                if let Err(err) = self.insert_ready(task) {
                    warn!("{task}: {err}");
                }
            }
        } else {
            self.ready_queue.remove(task);
        }

        let visual = match state {
            TaskState::Ready => VisualState::Ready,
            TaskState::Running => VisualState::Running,
            TaskState::Blocked => VisualState::Blocked,
            TaskState::Suspended => VisualState::Suspended,
            TaskState::Terminated => VisualState::None,
        };
        let label = match state {
            TaskState::Ready => "ready",
            TaskState::Running => "running",
            TaskState::Blocked => "blocked",
            TaskState::Suspended => "suspended",
            TaskState::Terminated => "terminated",
        };
        self.log(task, visual, format!("{task} {label}"));
    }

    pub fn task_suspend(&mut self, task: TaskId) -> Result<(), SchedulerError> {
        if !self.has_task(task) {
            return Err(SchedulerError::InvalidHandle);
        }
        self.set_task_state(task, TaskState::Suspended);
        if self.current_task == Some(task) {
            self.current_task = None;
        }
        self.schedule();
        Ok(())
    }

    pub fn task_resume(&mut self, task: TaskId) -> Result<(), SchedulerError> {
        if !self.has_task(task) {
            return Err(SchedulerError::InvalidHandle);
        }
        self.set_task_state(task, TaskState::Ready);
        self.schedule();
        Ok(())
    }

    pub fn task_terminate(&mut self, task: TaskId) -> Result<(), SchedulerError> {
        if !self.has_task(task) {
            return Err(SchedulerError::InvalidHandle);
        }

        self.force_release_all(task);
        self.task_mut(task).blocked_on = None;
        self.set_task_state(task, TaskState::Terminated);

        if self.current_task == Some(task) {
            self.current_task = None;
        }
        self.schedule();
        Ok(())
    }

    /// Reassign `task`'s baseline priority, re-sorting the ready queue if
    /// the task is currently queued. A boosted task's *effective*
    /// priority only drops to the new baseline once inheritance would
    /// otherwise have allowed it (it never rises above what PIP demands).
    pub fn task_set_priority(&mut self, task: TaskId, new_priority: Priority) -> Result<(), SchedulerError> {
        if !self.has_task(task) {
            return Err(SchedulerError::InvalidHandle);
        }

        let old_priority = self.task(task).priority;
        self.task_mut(task).original_priority = new_priority;
        let effective = if self.task(task).inherited {
            new_priority.min(old_priority)
        } else {
            new_priority
        };
        self.task_mut(task).priority = effective;

        if effective != old_priority && self.ready_queue.contains(task) {
            self.ready_queue.remove(task);
            self.insert_ready(task)?;
        }
        self.log(
            task,
            VisualState::None,
            format!("{task} priority set {old_priority} -> {effective}"),
        );
        Ok(())
    }

    pub(crate) fn insert_ready(&mut self, task: TaskId) -> Result<(), SchedulerError> {
        let priority = self.task(task).priority;
        let snapshot = self.priority_snapshot(self.ready_queue.iter());
        self.ready_queue
            .insert(task, priority, move |id| lookup(&snapshot, id))
    }

    // -- dispatch ---------------------------------------------------------

    /// Compute the next task to run and context-switch to it if the
    /// preemption policy (spec §4.2) calls for it.
    pub fn schedule(&mut self) {
        let next = self.ready_queue.peek().unwrap_or(self.idle_task);

        if Some(next) == self.current_task {
            return;
        }

        match self.current_task {
            Some(cur) if self.task(cur).state == TaskState::Running => {
                if self.task(next).priority >= self.task(cur).priority {
                    // Ties go to the incumbent.
                    return;
                }
                self.context_switch(Some(cur), next, true);
            }
            _ => self.context_switch(self.current_task, next, false),
        }
    }

    fn context_switch(&mut self, from: Option<TaskId>, to: TaskId, is_preemption: bool) {
        if let Some(from) = from {
            if self.task(from).state == TaskState::Running {
                self.task_mut(from).ready_since = Some(self.system_ticks);
                self.task_mut(from).stats.preemptions += 1;
                self.set_task_state(from, TaskState::Ready);
            }
        }

        self.ready_queue.remove(to);
        self.task_mut(to).state = TaskState::Running;
        self.current_task = Some(to);
        self.context_switches += 1;
        self.log(to, VisualState::Running, format!("{to} running"));

        if is_preemption {
            if let Some(from) = from {
                self.log(to, VisualState::None, format!("{to} preempts {from}"));
            }
        }
    }

    // -- resources ---------------------------------------------------------

    pub fn mutex_create(&mut self, name: impl Into<String>) -> MutexId {
        let id = MutexId::new(self.mutexes.len());
        self.mutexes.push(Mutex::new(id, name.into()));
        id
    }

    /// Destroy a mutex. If it is still held or has waiters, they are
    /// force-released / woken with a warning rather than left dangling.
    pub fn mutex_destroy(&mut self, mutex: MutexId) -> Result<(), SchedulerError> {
        if !self.has_mutex(mutex) {
            return Err(SchedulerError::InvalidHandle);
        }

        if let Some(owner) = self.mutex(mutex).owner {
            warn!("{}: destroyed while still held by {owner}", self.mutex(mutex).name);
            self.task_mut(owner).held_mutexes.retain(|&m| m != mutex);
            if self.pi_enabled {
                self.restore(owner);
            }
        }

        while let Some(waiter) = self.mutex_mut(mutex).wait_queue.pop_front() {
            warn!("{}: waiter {waiter} abandoned on destroy", self.mutex(mutex).name);
            self.task_mut(waiter).blocked_on = None;
            self.set_task_state(waiter, TaskState::Ready);
        }

        self.mutex_mut(mutex).owner = None;
        self.mutex_mut(mutex).destroyed = true;
        self.schedule();
        Ok(())
    }

    pub fn semaphore_create(&mut self, name: impl Into<String>, initial: u32, max: u32) -> SemaphoreId {
        let id = SemaphoreId::new(self.semaphores.len());
        self.semaphores.push(Semaphore::new(id, name.into(), initial, max));
        id
    }

    // -- time --------------------------------------------------------------

    /// Advance simulated time by one tick: account for the running task's
    /// execution, release periodic tasks whose boundary was reached, and
    /// detect deadline misses (spec §4.4). Does not dispatch; call
    /// [`schedule`](Self::schedule) afterward, or use
    /// [`advance_time`](Self::advance_time).
    pub fn tick_handler(&mut self) {
        self.system_ticks += 1;

        if let Some(cur) = self.current_task {
            if self.task(cur).state == TaskState::Running && !self.task(cur).is_idle() {
                let t = self.task_mut(cur);
                t.exec_time_this_period += 1;
                t.total_exec_time += 1;
                if t.remaining_work > 0 {
                    t.remaining_work -= 1;
                }
                t.wcet_observed = t.wcet_observed.max(t.exec_time_this_period);
            }
        }

        self.periodic_release_pass();
        self.deadline_pass();
    }

    fn periodic_release_pass(&mut self) {
        let due: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|t| !t.is_idle() && t.period > 0 && t.state == TaskState::Suspended && t.next_release == self.system_ticks)
            .map(|t| t.id)
            .collect();

        for id in due {
            let period = self.task(id).period;
            let relative_deadline = self.task(id).relative_deadline;
            let t = self.task_mut(id);
            t.next_release += period;
            t.absolute_deadline = self.system_ticks + relative_deadline;
            t.exec_time_this_period = 0;
            t.stats.invocations += 1;
            self.log(id, VisualState::None, format!("{id} released"));
            self.set_task_state(id, TaskState::Ready);
        }
    }

    fn deadline_pass(&mut self) {
        let missed: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|t| {
                !t.is_idle()
                    && matches!(t.state, TaskState::Running | TaskState::Ready)
                    && t.absolute_deadline > 0
                    && self.system_ticks > t.absolute_deadline
                    && t.remaining_work > 0
            })
            .map(|t| t.id)
            .collect();

        for id in missed {
            self.task_mut(id).stats.deadline_misses += 1;
            self.log(id, VisualState::None, format!("{id} missed its deadline"));
            self.task_mut(id).absolute_deadline = u64::MAX;
        }
    }

    /// Run `n` ticks, dispatching after each one.
    pub fn advance_time(&mut self, n: u64) {
        for _ in 0..n {
            self.tick_handler();
            self.schedule();
        }
    }

    /// Install `n` ticks of work on `task` and run the tick loop while it
    /// remains the current task, yielding as soon as it is preempted or
    /// finishes. Resumption after a yield is implicit: the scheduler will
    /// simply pick the task again once it is highest-priority-ready.
    pub fn simulate_work(&mut self, task: TaskId, n: u64) -> Result<(), SchedulerError> {
        if !self.has_task(task) {
            return Err(SchedulerError::InvalidHandle);
        }

        self.task_mut(task).remaining_work = n;

        while self.current_task == Some(task) && self.task(task).remaining_work > 0 {
            self.tick_handler();
            self.schedule();
        }
        Ok(())
    }
}

pub(crate) fn lookup(snapshot: &[(TaskId, Priority)], id: TaskId) -> Priority {
    snapshot
        .iter()
        .find(|&&(t, _)| t == id)
        .map(|&(_, p)| p)
        .unwrap_or(IDLE_PRIORITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_task_runs_when_ready_queue_empty() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        sched.schedule();
        assert_eq!(sched.current_task(), Some(sched.idle_task()));
    }

    #[test]
    fn highest_priority_task_dispatched_first() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        sched.task_create("low", 10, 0, 0, 1).unwrap();
        let high = sched.task_create("high", 1, 0, 0, 1).unwrap();
        sched.schedule();
        assert_eq!(sched.current_task(), Some(high));
    }

    #[test]
    fn ties_go_to_the_incumbent() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        let a = sched.task_create("a", 5, 0, 0, 1).unwrap();
        sched.schedule();
        sched.task_create("b", 5, 0, 0, 1).unwrap();
        sched.schedule();
        assert_eq!(sched.current_task(), Some(a));
    }

    #[test]
    fn suspend_and_resume_round_trips_through_ready_queue() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        let t = sched.task_create("t", 1, 0, 0, 1).unwrap();
        sched.schedule();
        assert_eq!(sched.current_task(), Some(t));

        sched.task_suspend(t).unwrap();
        assert_eq!(sched.task(t).state(), TaskState::Suspended);
        assert_eq!(sched.current_task(), Some(sched.idle_task()));

        sched.task_resume(t).unwrap();
        assert_eq!(sched.task(t).state(), TaskState::Running);
    }

    #[test]
    fn terminate_releases_held_mutexes_and_wakes_waiter() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        let m = sched.mutex_create("m");
        let owner = sched.task_create("owner", 5, 0, 0, 0).unwrap();
        sched.schedule();
        sched.mutex_lock(m, owner).unwrap();

        let waiter = sched.task_create("waiter", 1, 0, 0, 0).unwrap();
        sched.mutex_lock(m, waiter).unwrap();
        assert_eq!(sched.task(waiter).state(), TaskState::Blocked);

        sched.task_terminate(owner).unwrap();
        assert_eq!(sched.mutex(m).owner(), Some(waiter));
        assert_eq!(sched.task(waiter).state(), TaskState::Ready);
    }

    #[test]
    fn set_priority_resorts_ready_queue() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        let a = sched.task_create("a", 5, 0, 0, 1).unwrap();
        sched.schedule();
        let b = sched.task_create("b", 10, 0, 0, 1).unwrap();

        sched.task_set_priority(b, 1).unwrap();
        sched.schedule();
        assert_eq!(sched.current_task(), Some(b));
        assert!(sched.task(a).stats().preemptions >= 1);
    }

    #[test]
    fn capacity_exceeded_on_task_registry_is_reported() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        for i in 0..READY_QUEUE_CAPACITY {
            sched.task_create(format!("t{i}"), 10, 0, 0, 0).unwrap();
        }
        let err = sched.task_create("overflow", 10, 0, 0, 0).unwrap_err();
        assert_eq!(
            err,
            SchedulerError::CapacityExceeded {
                queue: crate::error::QueueKind::TaskRegistry
            }
        );
    }

    #[test]
    fn suspended_periodic_task_re_releases_at_its_next_boundary() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        let t = sched.task_create("t", 1, 5, 0, 100).unwrap();
        sched.schedule();

        sched.advance_time(2);
        assert_eq!(sched.task(t).total_exec_time(), 2);

        sched.task_suspend(t).unwrap();
        assert_eq!(sched.task(t).state(), TaskState::Suspended);
        assert_eq!(sched.task(t).next_release, 5);

        sched.advance_time(2);
        assert_eq!(sched.task(t).state(), TaskState::Suspended);

        sched.advance_time(1);
        assert_eq!(sched.system_ticks(), 5);
        assert_eq!(sched.task(t).state(), TaskState::Running);
        assert_eq!(sched.task(t).next_release, 10);
        assert_eq!(sched.task(t).absolute_deadline(), 10);
        assert_eq!(sched.task(t).exec_time_this_period, 0);
        assert_eq!(sched.task(t).stats().invocations, 1);
        assert!(sched
            .event_log()
            .iter()
            .any(|e| e.tick == 5 && e.annotation.contains("released")));
    }
}
