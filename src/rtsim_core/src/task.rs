//! Tasks: the scheduler's control blocks.
use crate::id::{MutexId, SemaphoreId, TaskId};

pub mod readyqueue;

/// A task priority.
///
/// Numerically **lower is logically higher**, matching the POSIX/VxWorks
/// convention. [`IDLE_PRIORITY`] is the maximum representable sentinel,
/// below every priority a real task can hold.
pub type Priority = usize;

/// The sentinel priority held by the idle task; lower (logically higher)
/// than any priority a real task may be assigned.
pub const IDLE_PRIORITY: Priority = Priority::MAX;

/// A task's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Running,
    Blocked,
    Suspended,
    Terminated,
}

/// What a [`Blocked`](TaskState::Blocked) task is waiting on.
///
/// The spec's data model describes only a `blocked_on` *mutex* pointer,
/// since the mutex subsystem is the one that needs it to drive transitive
/// priority inheritance. A task parked on a semaphore is tracked the same
/// way internally (so the scheduler can still find and unblock it by
/// identity), but semaphores never consult this field for PIP purposes;
/// see [`crate::semaphore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedOn {
    Mutex(MutexId),
    Semaphore(SemaphoreId),
}

/// Running statistics accumulated over a task's lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskStats {
    pub invocations: u64,
    pub deadline_misses: u64,
    pub preemptions: u64,
    pub priority_boosts: u64,
}

/// A task control block (TCB).
#[derive(Debug, Clone)]
pub struct Task {
    pub(crate) id: TaskId,
    pub name: String,

    pub(crate) state: TaskState,

    /// Effective priority, possibly boosted by PIP.
    pub(crate) priority: Priority,
    /// The priority the task was created or last reassigned at.
    pub(crate) original_priority: Priority,
    /// True iff `priority != original_priority` due to an ongoing
    /// inheritance episode.
    pub(crate) inherited: bool,

    /// Zero means aperiodic.
    pub period: u64,
    pub relative_deadline: u64,
    pub(crate) next_release: u64,
    pub(crate) absolute_deadline: u64,
    pub(crate) exec_time_this_period: u64,
    pub(crate) total_exec_time: u64,
    pub(crate) wcet_observed: u64,
    /// Remaining simulated work, in ticks, for the current activation.
    pub(crate) remaining_work: u64,
    /// The `remaining_work` the task was created or last `simulate_work`'d
    /// with; used as the WCET proxy by [`crate::rm::rm_utilization`], which
    /// is only meaningful before the first tick executes (see that
    /// function's documentation).
    pub(crate) initial_work: u64,

    pub(crate) stats: TaskStats,

    /// Mutexes currently held by this task, in acquisition order.
    pub(crate) held_mutexes: Vec<MutexId>,
    pub(crate) blocked_on: Option<BlockedOn>,

    /// The tick at which this task last entered the `Ready` state, set
    /// when a context switch preempts it back off the CPU.
    pub(crate) ready_since: Option<u64>,
}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        name: String,
        priority: Priority,
        period: u64,
        relative_deadline: u64,
        work: u64,
    ) -> Self {
        Self {
            id,
            name,
            state: TaskState::Ready,
            priority,
            original_priority: priority,
            inherited: false,
            period,
            relative_deadline,
            next_release: period,
            absolute_deadline: 0,
            exec_time_this_period: 0,
            total_exec_time: 0,
            wcet_observed: 0,
            remaining_work: work,
            initial_work: work,
            stats: TaskStats::default(),
            held_mutexes: Vec::new(),
            blocked_on: None,
            ready_since: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn original_priority(&self) -> Priority {
        self.original_priority
    }

    pub fn is_inherited(&self) -> bool {
        self.inherited
    }

    /// The mutex this task is blocked on, if any. See invariant 2 in the
    /// data model (`blocked_on != None` iff `state == Blocked` and the
    /// task is present in that mutex's wait queue).
    pub fn blocked_on_mutex(&self) -> Option<MutexId> {
        match self.blocked_on {
            Some(BlockedOn::Mutex(m)) => Some(m),
            _ => None,
        }
    }

    pub fn held_mutexes(&self) -> &[MutexId] {
        &self.held_mutexes
    }

    pub fn stats(&self) -> TaskStats {
        self.stats
    }

    pub fn remaining_work(&self) -> u64 {
        self.remaining_work
    }

    pub fn total_exec_time(&self) -> u64 {
        self.total_exec_time
    }

    pub fn wcet_observed(&self) -> u64 {
        self.wcet_observed
    }

    pub fn absolute_deadline(&self) -> u64 {
        self.absolute_deadline
    }

    pub fn is_idle(&self) -> bool {
        self.original_priority == IDLE_PRIORITY
    }
}
