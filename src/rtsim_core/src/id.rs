//! Stable integer handles into the scheduler's arenas.
//!
//! The scheduler owns every [`Task`](crate::task::Task), [`Mutex`], and
//! [`Semaphore`] in a flat `Vec`-backed arena and hands callers a small
//! `Copy` handle rather than a reference, so that a task can freely
//! reference the mutex it is blocked on and a mutex can freely reference
//! the task it is waiting for without fighting the borrow checker over a
//! cyclic ownership graph. This is the same arena-of-handles idea the
//! kernel uses for its `TaskId`/`MutexId`, just without the `'static`
//! pointer arithmetic a `no_std` kernel needs to recover a handle from a
//! control block's address.
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);

        impl $name {
            pub(crate) fn new(index: usize) -> Self {
                Self(index)
            }

            /// The index of the referenced object within its arena.
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

define_id!(
    /// Identifies a [`Task`](crate::task::Task) within a [`Scheduler`](crate::scheduler::Scheduler).
    TaskId
);
define_id!(
    /// Identifies a [`Mutex`](crate::mutex::Mutex) within a [`Scheduler`](crate::scheduler::Scheduler).
    MutexId
);
define_id!(
    /// Identifies a [`Semaphore`](crate::semaphore::Semaphore) within a [`Scheduler`](crate::scheduler::Scheduler).
    SemaphoreId
);
