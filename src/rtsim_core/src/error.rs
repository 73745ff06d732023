//! The error taxonomy reported by core operations.
//!
//! Every fallible operation in this crate follows the same propagation
//! policy: errors never unwind the call and never panic. They are
//! reported on a side channel (an [`event::Event`](crate::event::Event)
//! with [`VisualState::None`](crate::event::VisualState::None) plus a
//! `log::warn!`/`log::error!` line), and the operation that triggered them
//! degrades gracefully. The core commits to remaining usable after any
//! reported error.
use core::fmt;

/// An error reported by a core scheduler operation.
///
/// None of these variants unwind their caller; see the module
/// documentation for the propagation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// A bounded queue (ready queue, task registry, a mutex's or
    /// semaphore's wait queue) was already at capacity. The insertion that
    /// triggered this is dropped; the caller sees a silent no-op from the
    /// operation's point of view, but this error is reported so the
    /// condition isn't invisible.
    CapacityExceeded {
        /// What kind of queue overflowed.
        queue: QueueKind,
    },

    /// A task, mutex, or semaphore handle did not resolve to a live
    /// object in the scheduler's registries.
    InvalidHandle,

    /// A task attempted to unlock a mutex it does not own.
    NotOwner,

    /// `rm_recalculate` (or a utilization/schedulability query) was asked
    /// to analyze zero periodic tasks.
    NoPeriodicTasks,
}

/// Identifies which bounded collection overflowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    ReadyQueue,
    TaskRegistry,
    MutexWaitQueue,
    SemaphoreWaitQueue,
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded { queue } => {
                write!(f, "capacity exceeded on {queue}")
            }
            Self::InvalidHandle => write!(f, "invalid or stale handle"),
            Self::NotOwner => write!(f, "unlock attempted by a non-owner task"),
            Self::NoPeriodicTasks => write!(f, "no periodic tasks to analyze"),
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ReadyQueue => "ready queue",
            Self::TaskRegistry => "task registry",
            Self::MutexWaitQueue => "mutex wait queue",
            Self::SemaphoreWaitQueue => "semaphore wait queue",
        };
        f.write_str(s)
    }
}

impl std::error::Error for SchedulerError {}
