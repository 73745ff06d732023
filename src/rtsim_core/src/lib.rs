//! A simulated priority-based preemptive real-time scheduler.
//!
//! This crate is the *core* of the simulation: task control blocks, the
//! ready-queue discipline, a mutex subsystem implementing the Priority
//! Inheritance Protocol (PIP), a counting semaphore with no PIP, a
//! discrete-tick time model, and Rate-Monotonic (RM) priority assignment
//! with the Liu-Layland schedulability test.
//!
//! The simulation is single-threaded and cooperative: "preemption" is
//! expressed entirely through dispatcher-driven state transitions on one
//! logical CPU, never through real OS threads. No operation in this crate
//! blocks the caller; a contended [`mutex_lock`](Scheduler::mutex_lock) or
//! [`semaphore_wait`](Scheduler::semaphore_wait) simply marks the calling
//! task `Blocked` and returns.
//!
//! Every externally observable transition (state changes, mutex operations,
//! priority boosts/restores, releases, deadline misses) is appended to an
//! [`EventLog`](event::EventLog), which a separate renderer crate consumes
//! to draw an ASCII Gantt chart. This crate never formats anything for
//! display itself.
#![forbid(unsafe_code)]

pub mod error;
pub mod event;
pub mod mutex;
pub mod rm;
pub mod scheduler;
pub mod semaphore;
pub mod task;
pub mod wait;

mod id;

pub use error::SchedulerError;
pub use event::{Event, EventLog, VisualState};
pub use id::{MutexId, SemaphoreId, TaskId};
pub use mutex::Mutex;
pub use rm::{RmVerdict, UtilizationReport};
pub use scheduler::{Policy, Scheduler};
pub use semaphore::Semaphore;
pub use task::{Priority, Task, TaskState, IDLE_PRIORITY};

/// Reference capacity of a mutex's or semaphore's wait queue.
///
/// This is a conservative bound for an RTOS demonstration; see
/// [`error::SchedulerError::CapacityExceeded`] for overflow behavior.
pub const WAIT_QUEUE_CAPACITY: usize = 16;

/// Reference capacity of the ready queue and the task registry.
pub const READY_QUEUE_CAPACITY: usize = 64;
