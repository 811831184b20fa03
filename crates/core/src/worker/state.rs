// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker lifecycle bookkeeping
//!
//! Pure state with no scheduling. The driver in `worker/mod.rs` applies these
//! transitions under its lock and performs the side effects.
//!
//! Every `begin` opens a new generation. Loops report entry and teardown for
//! their own generation only, and the counters only move forward, so a slow
//! loop from an older generation can never overwrite the signals of a newer one.

use crate::error::WorkerError;

/// Observable lifecycle phase of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// No live loop: the stopped signal is satisfied (initial state)
    Stopped,
    /// Started but the loop has not entered yet: neither signal is satisfied
    Starting,
    /// The loop is iterating: the started signal is satisfied
    Running,
}

/// Snapshot of the started/stopped signals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    /// Latest generation opened by `begin`
    pub generation: u64,
    /// Highest generation whose loop has entered
    pub entered: u64,
    /// Highest generation whose loop has torn down
    pub exited: u64,
}

impl Signals {
    pub fn phase(&self) -> WorkerPhase {
        if self.exited >= self.generation {
            WorkerPhase::Stopped
        } else if self.entered >= self.generation {
            WorkerPhase::Running
        } else {
            WorkerPhase::Starting
        }
    }

    pub fn started(&self) -> bool {
        self.phase() == WorkerPhase::Running
    }

    pub fn stopped(&self) -> bool {
        self.phase() == WorkerPhase::Stopped
    }
}

/// Run flag, generation counters and the captured failure slot
#[derive(Debug, Default)]
pub struct WorkerState {
    run: bool,
    signals: Signals,
    failure: Option<WorkerError>,
}

impl WorkerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new generation and raise the run flag
    pub fn begin(&mut self) -> u64 {
        self.run = true;
        self.signals.generation += 1;
        self.signals.generation
    }

    /// The loop of `generation` has entered
    pub fn enter(&mut self, generation: u64) {
        self.signals.entered = self.signals.entered.max(generation);
    }

    /// The loop of `generation` has torn down
    pub fn exit(&mut self, generation: u64) {
        self.signals.exited = self.signals.exited.max(generation);
    }

    /// Whether the loop of `generation` should run another iteration
    pub fn should_continue(&self, generation: u64) -> bool {
        self.run && self.signals.generation == generation
    }

    /// Record a failure from the loop of `generation`
    ///
    /// Clears the run flag when `generation` is current. Returns the failure
    /// it replaced, if an earlier one was never surfaced.
    pub fn fail(&mut self, generation: u64, error: WorkerError) -> Option<WorkerError> {
        if self.signals.generation == generation {
            self.run = false;
        }
        self.failure.replace(error)
    }

    /// Clear the run flag and take any pending failure
    pub fn halt(&mut self) -> Option<WorkerError> {
        self.run = false;
        self.failure.take()
    }

    /// Take any pending failure without touching the run flag
    pub fn take_failure(&mut self) -> Option<WorkerError> {
        self.failure.take()
    }

    pub fn has_failure(&self) -> bool {
        self.failure.is_some()
    }

    pub fn run_requested(&self) -> bool {
        self.run
    }

    pub fn generation(&self) -> u64 {
        self.signals.generation
    }

    pub fn signals(&self) -> Signals {
        self.signals
    }

    pub fn phase(&self) -> WorkerPhase {
        self.signals.phase()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
