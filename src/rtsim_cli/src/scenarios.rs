//! The eight end-to-end scenarios driving the core through its
//! distinguishing behaviors: strict priority dispatch, preemption, PIP
//! (with and without), transitive PIP, rate-monotonic assignment, the
//! semaphore invariant, and a deadline miss.
use rtsim_core::{Policy, RmVerdict, Scheduler, TaskState};

/// A single assertion a scenario makes about the run it just drove.
/// Failures are collected rather than panicking so a scenario reports
/// everything wrong with it, not just the first thing.
fn check(failures: &mut Vec<String>, ok: bool, description: impl Into<String>) {
    if !ok {
        failures.push(description.into());
    }
}

pub struct ScenarioReport {
    pub name: &'static str,
    pub sched: Scheduler,
    pub failures: Vec<String>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 1. Strict priority, three aperiodic tasks.
pub fn scenario_1() -> ScenarioReport {
    let mut sched = Scheduler::new(Policy::Priority, true);
    let mut failures = Vec::new();

    let a = sched.task_create("A", 1, 0, 0, 5).unwrap();
    let b = sched.task_create("B", 2, 0, 0, 10).unwrap();
    let c = sched.task_create("C", 3, 0, 0, 8).unwrap();
    sched.schedule();

    let mut finish_order = Vec::new();
    for _ in 0..30 {
        sched.tick_handler();
        for &t in &[a, b, c] {
            if sched.task(t).remaining_work() == 0 && sched.task(t).state() != TaskState::Terminated {
                sched.task_terminate(t).unwrap();
                finish_order.push(t);
            }
        }
        sched.schedule();
    }

    check(
        &mut failures,
        [a, b, c].iter().all(|&t| sched.task(t).state() == TaskState::Terminated),
        "all three tasks terminated",
    );
    check(
        &mut failures,
        finish_order == vec![a, b, c],
        format!("finish order A, B, C (got {finish_order:?})"),
    );
    check(
        &mut failures,
        sched.context_switches() >= 2,
        format!("context_switches >= 2 (got {})", sched.context_switches()),
    );

    ScenarioReport {
        name: "strict priority, three aperiodic tasks",
        sched,
        failures,
    }
}

/// 2. Preemption.
pub fn scenario_2() -> ScenarioReport {
    let mut sched = Scheduler::new(Policy::Priority, true);
    let mut failures = Vec::new();

    let low = sched.task_create("Low", 10, 0, 0, 20).unwrap();
    sched.schedule();
    sched.advance_time(5);

    let high = sched.task_create("High", 1, 0, 0, 10).unwrap();
    sched.schedule();

    let mut finish_order = Vec::new();
    for _ in 0..30 {
        sched.tick_handler();
        for &t in &[low, high] {
            if sched.task(t).remaining_work() == 0 && sched.task(t).state() != TaskState::Terminated {
                sched.task_terminate(t).unwrap();
                finish_order.push(t);
            }
        }
        sched.schedule();
    }

    check(
        &mut failures,
        sched.task(low).stats().preemptions >= 1,
        "Low was preempted at least once",
    );
    check(
        &mut failures,
        sched.task(low).state() == TaskState::Terminated && sched.task(high).state() == TaskState::Terminated,
        "both tasks terminated",
    );
    check(
        &mut failures,
        finish_order == vec![high, low],
        format!("High completes strictly before Low (got {finish_order:?})"),
    );

    ScenarioReport {
        name: "preemption",
        sched,
        failures,
    }
}

/// 3 & 4. PIP resolving (or, with PI disabled, failing to resolve)
/// priority inversion. Shared driver; `pi_enabled` selects the variant.
fn pip_inversion_scenario(pi_enabled: bool) -> ScenarioReport {
    let mut sched = Scheduler::new(Policy::Priority, pi_enabled);
    let mut failures = Vec::new();

    let mutex_a = sched.mutex_create("MutexA");
    let low = sched.task_create("Low", 10, 0, 0, 0).unwrap();
    sched.schedule();
    sched.mutex_lock(mutex_a, low).unwrap();

    sched.advance_time(2);
    let med = sched.task_create("Med", 5, 0, 0, 12).unwrap();

    sched.advance_time(3);
    let high = sched.task_create("High", 1, 0, 0, 6).unwrap();
    sched.mutex_lock(mutex_a, high).unwrap();

    check(
        &mut failures,
        sched.task(high).state() == TaskState::Blocked,
        "High blocks on MutexA",
    );

    if pi_enabled {
        check(
            &mut failures,
            sched.task(low).stats().priority_boosts >= 1,
            "Low was boosted at least once",
        );
        check(
            &mut failures,
            sched.current_task() == Some(low),
            "boosted Low preempts Med while holding MutexA",
        );
    } else {
        check(&mut failures, sched.task(low).stats().priority_boosts == 0, "no boosts occur with PI disabled");
        check(
            &mut failures,
            sched.current_task() == Some(med),
            "Med runs instead of Low while High waits, with PI disabled",
        );
    }

    sched.advance_time(20);
    sched.mutex_unlock(mutex_a, low).unwrap();
    sched.advance_time(1);

    if pi_enabled {
        check(
            &mut failures,
            sched.task(low).priority() == sched.task(low).original_priority(),
            "Low's priority returns to its original value after unlocking",
        );
    }

    ScenarioReport {
        name: if pi_enabled {
            "PIP resolves inversion"
        } else {
            "without PIP, inversion occurs"
        },
        sched,
        failures,
    }
}

pub fn scenario_3() -> ScenarioReport {
    pip_inversion_scenario(true)
}

pub fn scenario_4() -> ScenarioReport {
    pip_inversion_scenario(false)
}

/// 5. Transitive PIP across a chain of two held mutexes.
pub fn scenario_5() -> ScenarioReport {
    let mut sched = Scheduler::new(Policy::Priority, true);
    let mut failures = Vec::new();

    let mutex_a = sched.mutex_create("A");
    let mutex_b = sched.mutex_create("B");

    let very_low = sched.task_create("VeryLow", 20, 0, 0, 0).unwrap();
    sched.schedule();
    sched.mutex_lock(mutex_a, very_low).unwrap();

    let low = sched.task_create("Low", 15, 0, 0, 0).unwrap();
    sched.mutex_lock(mutex_b, low).unwrap();
    sched.mutex_lock(mutex_a, low).unwrap();
    check(&mut failures, sched.task(low).state() == TaskState::Blocked, "Low blocks on A");

    let high = sched.task_create("High", 1, 0, 0, 0).unwrap();
    sched.mutex_lock(mutex_b, high).unwrap();
    check(&mut failures, sched.task(high).state() == TaskState::Blocked, "High blocks on B");

    check(
        &mut failures,
        sched.task(very_low).stats().priority_boosts >= 1,
        "VeryLow received a boost",
    );
    check(
        &mut failures,
        sched.task(low).stats().priority_boosts >= 1,
        "Low received a boost",
    );
    check(
        &mut failures,
        sched.task(very_low).priority() == 1,
        format!(
            "VeryLow's effective priority is raised to High's (1), got {}",
            sched.task(very_low).priority()
        ),
    );

    ScenarioReport {
        name: "transitive PIP",
        sched,
        failures,
    }
}

/// 6. Rate-monotonic assignment and schedulability verdict.
pub fn scenario_6() -> ScenarioReport {
    let mut sched = Scheduler::new(Policy::RateMonotonic, true);
    let mut failures = Vec::new();

    let t1 = sched.task_create("T1", 0, 10, 0, 3).unwrap();
    let t2 = sched.task_create("T2", 0, 15, 0, 4).unwrap();
    let t3 = sched.task_create("T3", 0, 20, 0, 5).unwrap();
    sched.rm_recalculate().unwrap();

    check(
        &mut failures,
        sched.task(t1).priority() < sched.task(t2).priority() && sched.task(t2).priority() < sched.task(t3).priority(),
        "T1 < T2 < T3 in priority after rm_recalculate",
    );
    check(
        &mut failures,
        (sched.task(t1).priority(), sched.task(t2).priority(), sched.task(t3).priority()) == (0, 1, 2),
        "ranks are exactly 0, 1, 2",
    );

    let report = sched.rm_utilization();
    check(
        &mut failures,
        (report.total_utilization - 0.8167).abs() < 1e-3,
        format!("total utilization ~0.8167 (got {})", report.total_utilization),
    );
    check(
        &mut failures,
        sched.rm_schedulability_test() == RmVerdict::Inconclusive,
        format!("verdict is possibly-schedulable (got {:?})", sched.rm_schedulability_test()),
    );

    ScenarioReport {
        name: "rate-monotonic assignment",
        sched,
        failures,
    }
}

/// 7. Semaphore producer/consumer invariant.
pub fn scenario_7() -> ScenarioReport {
    let mut sched = Scheduler::new(Policy::Priority, true);
    let mut failures = Vec::new();

    let full = sched.semaphore_create("full", 0, 5);
    let empty = sched.semaphore_create("empty", 5, 5);
    let producer = sched.task_create("producer", 5, 0, 0, 0).unwrap();
    let consumer = sched.task_create("consumer", 5, 0, 0, 0).unwrap();

    for _ in 0..8 {
        sched.semaphore_wait(empty, producer).unwrap();
        sched.semaphore_signal(full, producer).unwrap();
        check(
            &mut failures,
            sched.semaphore(full).count() + sched.semaphore(empty).count() == 5,
            "full.count + empty.count == 5 after produce",
        );

        sched.semaphore_wait(full, consumer).unwrap();
        sched.semaphore_signal(empty, consumer).unwrap();
        check(
            &mut failures,
            sched.semaphore(full).count() + sched.semaphore(empty).count() == 5,
            "full.count + empty.count == 5 after consume",
        );
    }

    ScenarioReport {
        name: "semaphore producer/consumer invariant",
        sched,
        failures,
    }
}

/// 8. Deadline miss.
pub fn scenario_8() -> ScenarioReport {
    let mut sched = Scheduler::new(Policy::Priority, true);
    let mut failures = Vec::new();

    let _hog = sched.task_create("Hog", 1, 0, 100, 12).unwrap();
    let tight = sched.task_create("Tight", 2, 0, 10, 15).unwrap();
    let _relax = sched.task_create("Relax", 3, 0, 50, 8).unwrap();

    sched.schedule();
    sched.advance_time(40);

    check(
        &mut failures,
        sched.task(tight).stats().deadline_misses >= 1,
        format!(
            "Tight misses its deadline at least once (got {})",
            sched.task(tight).stats().deadline_misses
        ),
    );

    ScenarioReport {
        name: "deadline miss",
        sched,
        failures,
    }
}
