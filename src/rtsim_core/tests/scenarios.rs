//! End-to-end scenarios exercising the scheduler, mutex/PIP, semaphore,
//! and RM subsystems together.
use rtsim_core::{Policy, RmVerdict, Scheduler, TaskState};

fn init_logger() {
    let _ = env_logger::try_init();
}

#[test]
fn strict_priority_three_aperiodic_tasks() {
    init_logger();
    let mut sched = Scheduler::new(Policy::Priority, true);
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

    assert!([a, b, c].iter().all(|&t| sched.task(t).state() == TaskState::Terminated));
    assert_eq!(finish_order, vec![a, b, c]);
    assert!(sched.context_switches() >= 2);
}

#[test]
fn preemption_by_higher_priority_arrival() {
    init_logger();
    let mut sched = Scheduler::new(Policy::Priority, true);
    let low = sched.task_create("Low", 10, 0, 0, 20).unwrap();
    sched.schedule();
    sched.advance_time(5);

    let high = sched.task_create("High", 1, 0, 0, 10).unwrap();
    sched.schedule();
    assert_eq!(sched.current_task(), Some(high));
    assert!(sched.task(low).stats().preemptions >= 1);
}

#[test]
fn pip_resolves_inversion() {
    init_logger();
    let mut sched = Scheduler::new(Policy::Priority, true);
    let mutex_a = sched.mutex_create("MutexA");

    let low = sched.task_create("Low", 10, 0, 0, 0).unwrap();
    sched.schedule();
    sched.mutex_lock(mutex_a, low).unwrap();

    sched.advance_time(2);
    sched.task_create("Med", 5, 0, 0, 12).unwrap();
    sched.advance_time(3);

    let high = sched.task_create("High", 1, 0, 0, 6).unwrap();
    sched.mutex_lock(mutex_a, high).unwrap();

    assert!(sched.task(low).stats().priority_boosts >= 1);
    assert_eq!(sched.current_task(), Some(low));

    sched.mutex_unlock(mutex_a, low).unwrap();
    assert_eq!(sched.task(low).priority(), sched.task(low).original_priority());
    assert_eq!(sched.current_task(), Some(high));
}

#[test]
fn without_pip_medium_priority_task_delays_high() {
    init_logger();
    let mut sched = Scheduler::new(Policy::Priority, false);
    let mutex_a = sched.mutex_create("MutexA");

    let low = sched.task_create("Low", 10, 0, 0, 0).unwrap();
    sched.schedule();
    sched.mutex_lock(mutex_a, low).unwrap();

    sched.advance_time(2);
    let med = sched.task_create("Med", 5, 0, 0, 12).unwrap();
    sched.advance_time(3);

    let high = sched.task_create("High", 1, 0, 0, 6).unwrap();
    sched.mutex_lock(mutex_a, high).unwrap();

    assert_eq!(sched.task(low).stats().priority_boosts, 0);
    assert_eq!(sched.current_task(), Some(med));
}

#[test]
fn transitive_pip_across_two_mutexes() {
    init_logger();
    let mut sched = Scheduler::new(Policy::Priority, true);
    let mutex_a = sched.mutex_create("A");
    let mutex_b = sched.mutex_create("B");

    let very_low = sched.task_create("VeryLow", 20, 0, 0, 0).unwrap();
    sched.schedule();
    sched.mutex_lock(mutex_a, very_low).unwrap();

    let low = sched.task_create("Low", 15, 0, 0, 0).unwrap();
    sched.mutex_lock(mutex_b, low).unwrap();
    sched.mutex_lock(mutex_a, low).unwrap();

    let high = sched.task_create("High", 1, 0, 0, 0).unwrap();
    sched.mutex_lock(mutex_b, high).unwrap();

    assert!(sched.task(very_low).stats().priority_boosts >= 1);
    assert!(sched.task(low).stats().priority_boosts >= 1);
    assert_eq!(sched.task(very_low).priority(), 1);
}

#[test]
fn rate_monotonic_assignment_and_bound() {
    init_logger();
    let mut sched = Scheduler::new(Policy::RateMonotonic, true);
    let t1 = sched.task_create("T1", 0, 10, 0, 3).unwrap();
    let t2 = sched.task_create("T2", 0, 15, 0, 4).unwrap();
    let t3 = sched.task_create("T3", 0, 20, 0, 5).unwrap();
    sched.rm_recalculate().unwrap();

    assert!(sched.task(t1).priority() < sched.task(t2).priority());
    assert!(sched.task(t2).priority() < sched.task(t3).priority());

    let report = sched.rm_utilization();
    assert!((report.total_utilization - (3.0 / 10.0 + 4.0 / 15.0 + 5.0 / 20.0)).abs() < 1e-9);
    assert_eq!(sched.rm_schedulability_test(), RmVerdict::Inconclusive);
}

#[test]
fn semaphore_producer_consumer_invariant_holds() {
    init_logger();
    let mut sched = Scheduler::new(Policy::Priority, true);
    let full = sched.semaphore_create("full", 0, 5);
    let empty = sched.semaphore_create("empty", 5, 5);
    let producer = sched.task_create("producer", 5, 0, 0, 0).unwrap();
    let consumer = sched.task_create("consumer", 5, 0, 0, 0).unwrap();

    for _ in 0..8 {
        sched.semaphore_wait(empty, producer).unwrap();
        sched.semaphore_signal(full, producer).unwrap();
        assert_eq!(sched.semaphore(full).count() + sched.semaphore(empty).count(), 5);

        sched.semaphore_wait(full, consumer).unwrap();
        sched.semaphore_signal(empty, consumer).unwrap();
        assert_eq!(sched.semaphore(full).count() + sched.semaphore(empty).count(), 5);
    }
}

#[test]
fn deadline_miss_under_priority_starvation() {
    init_logger();
    let mut sched = Scheduler::new(Policy::Priority, true);
    sched.task_create("Hog", 1, 0, 100, 12).unwrap();
    let tight = sched.task_create("Tight", 2, 0, 10, 15).unwrap();
    sched.task_create("Relax", 3, 0, 50, 8).unwrap();

    sched.schedule();
    sched.advance_time(40);

    assert!(sched.task(tight).stats().deadline_misses >= 1);
}

#[test]
fn deadline_exactly_at_tick_is_not_a_miss_but_one_past_it_is() {
    init_logger();
    let mut sched = Scheduler::new(Policy::Priority, true);
    let t = sched.task_create("t", 1, 0, 10, 20).unwrap();
    sched.schedule();

    sched.advance_time(10);
    assert_eq!(sched.task(t).stats().deadline_misses, 0);

    sched.advance_time(1);
    assert_eq!(sched.task(t).stats().deadline_misses, 1);
}
