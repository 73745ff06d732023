//! Rate-Monotonic priority assignment and schedulability analysis.
//!
//! Under RM, shorter period means higher priority. This module only
//! assigns ranks and reports on them; [`crate::scheduler::Scheduler`]'s
//! dispatch logic is policy-agnostic and just reads whatever priority
//! ends up on each task.
use either::Either;

use crate::error::SchedulerError;
use crate::id::TaskId;
use crate::scheduler::{Policy, Scheduler};

/// One row of a utilization report: a task's period, its WCET proxy
/// (`initial_work`, the work budget it was created or last
/// `simulate_work`'d with), and the resulting per-task utilization.
#[derive(Debug, Clone, Copy)]
pub struct UtilizationEntry {
    pub task: TaskId,
    pub period: u64,
    pub execution_time: u64,
    pub utilization: f64,
}

/// A utilization report over every periodic task.
#[derive(Debug, Clone)]
pub struct UtilizationReport {
    pub entries: Vec<UtilizationEntry>,
    pub total_utilization: f64,
}

/// The result of comparing a utilization total against the Liu & Layland
/// bound `B(n) = n * (2^(1/n) - 1)`.
///
/// The simple sufficient bound can return a false negative (reject a
/// schedulable set), so `Inconclusive` is a distinct, honest outcome
/// rather than being folded into `Unschedulable` (spec §4.5's
/// utilization test is sufficient, not necessary).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RmVerdict {
    /// Total utilization is at or below `B(n)`: guaranteed schedulable.
    Schedulable,
    /// Total utilization exceeds 1.0: guaranteed unschedulable.
    Unschedulable,
    /// Between `B(n)` and `1.0`: the sufficient test doesn't decide it.
    Inconclusive,
}

impl Scheduler {
    /// Recompute every periodic task's priority from its period (shorter
    /// period, higher priority) and reinsert any that are currently
    /// ready under the new ordering. Aperiodic tasks keep whatever
    /// priority they were assigned and sort after all periodic tasks,
    /// in creation order among themselves.
    ///
    /// No-op (returns `Ok`) under [`Policy::Priority`]; this only governs
    /// tasks under [`Policy::RateMonotonic`].
    pub fn rm_recalculate(&mut self) -> Result<(), SchedulerError> {
        if self.policy != Policy::RateMonotonic {
            return Ok(());
        }

        if !self.tasks().any(|t| !t.is_idle() && t.period > 0) {
            log::warn!("rm_recalculate: no periodic tasks registered, skipping analysis");
            return Err(SchedulerError::NoPeriodicTasks);
        }

        let mut candidates: Vec<(TaskId, Either<u64, usize>)> = self
            .tasks()
            .filter(|t| !t.is_idle())
            .map(|t| {
                let key = if t.period > 0 {
                    Either::Left(t.period)
                } else {
                    Either::Right(t.id().index())
                };
                (t.id(), key)
            })
            .collect();

        candidates.sort_by(|a, b| match (&a.1, &b.1) {
            (Either::Left(pa), Either::Left(pb)) => pa.cmp(pb),
            (Either::Left(_), Either::Right(_)) => std::cmp::Ordering::Less,
            (Either::Right(_), Either::Left(_)) => std::cmp::Ordering::Greater,
            (Either::Right(ia), Either::Right(ib)) => ia.cmp(ib),
        });

        for (rank, (id, _)) in candidates.into_iter().enumerate() {
            let was_ready = self.ready_queue.contains(id);
            if was_ready {
                self.ready_queue.remove(id);
            }
            self.task_mut(id).original_priority = rank;
            if !self.task(id).is_inherited() {
                self.task_mut(id).priority = rank;
            }
            if was_ready {
                self.insert_ready(id)?;
            }
        }

        Ok(())
    }

    /// Per-task and total CPU utilization (`execution_time / period`) over
    /// every periodic task, using `initial_work` as the execution-time
    /// proxy. Meaningful as a capacity-planning figure at any point in a
    /// run, though it only reflects each task's *configured* budget, not
    /// ticks actually consumed since its last release.
    pub fn rm_utilization(&self) -> UtilizationReport {
        let entries: Vec<UtilizationEntry> = self
            .tasks()
            .filter(|t| !t.is_idle() && t.period > 0)
            .map(|t| UtilizationEntry {
                task: t.id(),
                period: t.period,
                execution_time: t.initial_work,
                utilization: t.initial_work as f64 / t.period as f64,
            })
            .collect();

        let total_utilization = entries.iter().map(|e| e.utilization).sum();
        UtilizationReport {
            entries,
            total_utilization,
        }
    }

    /// Compare total utilization against the Liu & Layland sufficient
    /// bound for `n` periodic tasks. Returns [`RmVerdict::Schedulable`]
    /// vacuously (bound undefined) when there are no periodic tasks.
    pub fn rm_schedulability_test(&self) -> RmVerdict {
        let report = self.rm_utilization();
        let n = report.entries.len();
        if n == 0 {
            return RmVerdict::Schedulable;
        }

        let u = report.total_utilization;
        if u > 1.0 {
            return RmVerdict::Unschedulable;
        }

        let bound = n as f64 * (2f64.powf(1.0 / n as f64) - 1.0);
        if u <= bound {
            RmVerdict::Schedulable
        } else {
            RmVerdict::Inconclusive
        }
    }

    /// Render a utilization/schedulability summary as text. Formatting
    /// lives here only because the report's numbers are the core's to
    /// compute; actually printing it to a stream is left to a
    /// collaborator (the CLI).
    pub fn rm_print_report(&self) -> Result<String, SchedulerError> {
        let report = self.rm_utilization();
        if report.entries.is_empty() {
            return Err(SchedulerError::NoPeriodicTasks);
        }

        let mut out = String::new();
        for entry in &report.entries {
            out.push_str(&format!(
                "{}: C={} T={} U={:.4}\n",
                entry.task, entry.execution_time, entry.period, entry.utilization
            ));
        }
        let verdict = self.rm_schedulability_test();
        out.push_str(&format!(
            "total U={:.4}, verdict={verdict:?}\n",
            report.total_utilization
        ));
        Ok(out)
    }
}
