// Copyright 2021 Zachary Stewart
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//! Component I: recalculation/render coalescing.
//!
//! The scheduler owns three dirty flags and nothing else: it has no notion
//! of idle callbacks or timers. The host embedding (out of scope here, per
//! SPEC_FULL.md §5) calls [`Scheduler::flush_now`] or polls
//! [`Scheduler::is_pending`] from its own event loop and calls
//! [`Scheduler::run`] when ready; the scheduler itself never performs I/O or
//! suspends.

/// What a run should do, decided at `invalidate`/`flush_now` time and
/// consumed once by [`Scheduler::run`] (spec.md §4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Invalidation {
    pub needs_recalc: bool,
    pub needs_render: bool,
    pub force_recreate: bool,
}

/// Coalesces UI-mutation events into a single queued recompute+render pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler {
    calc_dirty: bool,
    render_dirty: bool,
    force_recreate: bool,
    pending: bool,
}

/// What [`Scheduler::run`] decided to do on this call, so a caller not
/// threading a calculator/renderer through the scheduler itself can react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub ran_calc: bool,
    pub ran_render: bool,
    pub force_recreate: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Default::default()
    }

    /// ORs the given flags into the pending state and marks a task queued
    /// (spec.md §4.I). Multiple calls before [`Scheduler::run`] collapse into
    /// one pending task; flags survive until consumed.
    pub fn invalidate(&mut self, invalidation: Invalidation) {
        self.calc_dirty |= invalidation.needs_recalc;
        self.render_dirty |= invalidation.needs_render;
        self.force_recreate |= invalidation.force_recreate;
        self.pending = true;
    }

    /// Sets every flag and marks a task queued, bypassing any idle wait the
    /// host embedding would otherwise impose.
    pub fn flush_now(&mut self) {
        self.calc_dirty = true;
        self.render_dirty = true;
        self.force_recreate = true;
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Runs the coalesced task: calculation always precedes rendering
    /// (spec.md §4.I, §5 ordering guarantee). A no-op call (nothing dirty)
    /// returns an all-`false` outcome and clears the pending flag.
    ///
    /// `run_calc` and `run_render` are the caller's actual calculator/render
    /// entry points; the scheduler decides *whether* to call them, not *how*.
    pub fn run(&mut self, mut run_calc: impl FnMut(), mut run_render: impl FnMut(bool)) -> RunOutcome {
        let ran_calc = self.calc_dirty;
        let ran_render = self.render_dirty;
        let force_recreate = self.force_recreate;

        if ran_calc {
            run_calc();
        }
        if ran_render {
            run_render(force_recreate);
        }

        self.calc_dirty = false;
        self.render_dirty = false;
        self.force_recreate = false;
        self.pending = false;

        RunOutcome {
            ran_calc,
            ran_render,
            force_recreate,
        }
    }
}
