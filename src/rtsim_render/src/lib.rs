//! ASCII Gantt-chart and annotation renderer for `rtsim_core` event logs.
//!
//! This crate treats [`EventLog`] as opaque input, exactly as the core
//! commits to in its own documentation: it never reaches into scheduler
//! internals, only the public event stream and (for row labels) task
//! names.
use std::collections::BTreeMap;
use std::fmt::Write as _;

use bitflags::bitflags;

use rtsim_core::{EventLog, Scheduler, TaskId, VisualState};

bitflags! {
    /// Which parts of a rendered report to include.
    ///
    /// Mirrors the kernel family's convention of expressing a caller's
    /// "what to show" choice as flag bits rather than a struct of bools.
    pub struct RenderOptions: u8 {
        /// The per-tick Gantt grid.
        const GANTT       = 0b0000_0001;
        /// The annotation-only event stream (boosts, restores, mutex ops,
        /// releases, misses) printed below the grid.
        const ANNOTATIONS = 0b0000_0010;
        /// A one-line summary (`context_switches`, tick span).
        const SUMMARY      = 0b0000_0100;
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::GANTT | Self::ANNOTATIONS | Self::SUMMARY
    }
}

const fn glyph(state: VisualState) -> char {
    match state {
        VisualState::Running => 'R',
        VisualState::Ready => '.',
        VisualState::Blocked => 'B',
        VisualState::Suspended => 'S',
        VisualState::None => ' ',
    }
}

/// Render `log` as an ASCII Gantt chart, labeling rows with `task_label`.
///
/// One row per task that appears in a visual-state record, one column per
/// tick in `[min_tick, max_tick]`. A task's glyph at tick `t` is whatever
/// visual state was last recorded for it at or before `t`; ticks before a
/// task's first recorded state are blank.
pub fn render_gantt(log: &EventLog, task_label: impl Fn(TaskId) -> String) -> String {
    let (Some(min_tick), Some(max_tick)) = (log.min_tick(), log.max_tick()) else {
        return String::from("(no events recorded)\n");
    };

    // task -> tick -> state, sparse; we forward-fill when rendering.
    let mut timelines: BTreeMap<TaskId, BTreeMap<u64, VisualState>> = BTreeMap::new();
    for event in log.iter() {
        if event.visual_state == VisualState::None {
            continue;
        }
        if let Some(task) = event.task {
            timelines
                .entry(task)
                .or_default()
                .insert(event.tick, event.visual_state);
        }
    }

    let mut out = String::new();
    for (task, timeline) in &timelines {
        let label = task_label(*task);
        let _ = write!(out, "{label:>12} | ");
        let mut current = VisualState::None;
        for tick in min_tick..=max_tick {
            if let Some(&state) = timeline.get(&tick) {
                current = state;
            }
            out.push(glyph(current));
        }
        out.push('\n');
    }
    out
}

/// Print the annotation-only (non-visual-state) event stream.
pub fn render_annotations(log: &EventLog) -> String {
    let mut out = String::new();
    for event in log.iter() {
        if event.visual_state == VisualState::None {
            let _ = writeln!(out, "{event}");
        }
    }
    out
}

/// Render a full report for `sched` according to `options`.
pub fn render(sched: &Scheduler, options: RenderOptions) -> String {
    let mut out = String::new();

    if options.contains(RenderOptions::SUMMARY) {
        let log = sched.event_log();
        let _ = writeln!(
            out,
            "ticks=[{}, {}] context_switches={}",
            log.min_tick().unwrap_or(0),
            log.max_tick().unwrap_or(0),
            sched.context_switches()
        );
    }

    if options.contains(RenderOptions::GANTT) {
        out.push_str(&render_gantt(sched.event_log(), |id| sched.task(id).name.clone()));
    }

    if options.contains(RenderOptions::ANNOTATIONS) {
        out.push_str("--\n");
        out.push_str(&render_annotations(sched.event_log()));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtsim_core::Policy;

    #[test]
    fn empty_log_renders_placeholder() {
        let log = EventLog::new();
        assert_eq!(render_gantt(&log, |_| "x".into()), "(no events recorded)\n");
    }

    #[test]
    fn gantt_forward_fills_last_known_state() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        let t = sched.task_create("a", 1, 0, 0, 5).unwrap();
        sched.schedule();
        sched.advance_time(3);
        let out = render_gantt(sched.event_log(), |id| sched.task(id).name.clone());
        assert!(out.contains(&sched.task(t).name));
        assert!(out.lines().next().unwrap().contains('R') || out.lines().next().unwrap().contains('.'));
    }

    #[test]
    fn render_respects_option_flags() {
        let mut sched = Scheduler::new(Policy::Priority, true);
        sched.task_create("a", 1, 0, 0, 1).unwrap();
        sched.schedule();
        let summary_only = render(&sched, RenderOptions::SUMMARY);
        assert!(summary_only.contains("context_switches"));
        assert!(!summary_only.contains('|'));
    }
}
