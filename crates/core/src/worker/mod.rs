// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repeating worker supervisor
//!
//! A [`Worker`] turns one [`Step`] into a background loop on the ambient tokio
//! runtime. The loop awaits the step, yields to the scheduler, and repeats
//! until the worker is stopped or the step fails.
//!
//! Failures are never raised where they happen. The loop stops, keeps the
//! error, and the next [`Worker::stop`] or [`Worker::ensure_stopped`] returns
//! it, exactly once.
//!
//! Cancellation is cooperative: `stop` fires a [`CancellationToken`] that the
//! loop observes at its next suspension point (inside a suspending step, the
//! optional pause, or the per-iteration yield).

mod state;

pub use state::{Signals, WorkerPhase, WorkerState};

use crate::config::WorkerConfig;
use crate::error::{StepError, WorkerError};
use crate::step::{Step, StepAdapter};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A single supervised repeating task
pub struct Worker {
    shared: Arc<Shared>,
    step: Arc<dyn Step>,
    config: WorkerConfig,
}

/// State shared between the worker handle and its loop task
struct Shared {
    name: String,
    inner: Mutex<Inner>,
    signals: watch::Sender<Signals>,
}

struct Inner {
    state: WorkerState,
    task: Option<LoopHandle>,
}

/// Ownership of one scheduled loop
struct LoopHandle {
    generation: u64,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl LoopHandle {
    fn cancel(&self) {
        self.cancel.cancel();
    }

    fn abort(self) {
        self.cancel.cancel();
        self.join.abort();
    }
}

impl Inner {
    fn is_running(&self) -> bool {
        self.state.run_requested() && self.task.is_some()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a state transition and publish the resulting signals
    fn update<R>(&self, f: impl FnOnce(&mut WorkerState) -> R) -> R {
        let mut inner = self.lock();
        let result = f(&mut inner.state);
        self.publish(&inner);
        result
    }

    fn publish(&self, inner: &Inner) {
        self.signals.send_replace(inner.state.signals());
    }

    fn should_continue(&self, generation: u64) -> bool {
        self.lock().state.should_continue(generation)
    }
}

impl Worker {
    /// Create a stopped worker around `step` with default configuration
    pub fn new(step: impl Step) -> Self {
        Self::with_config(step, WorkerConfig::default())
    }

    /// Create a stopped worker around `step`
    pub fn with_config(step: impl Step, config: WorkerConfig) -> Self {
        let (signals, _) = watch::channel(Signals::default());
        let shared = Arc::new(Shared {
            name: config.name.clone(),
            inner: Mutex::new(Inner {
                state: WorkerState::new(),
                task: None,
            }),
            signals,
        });
        Self {
            shared,
            step: Arc::new(step),
            config,
        }
    }

    /// Create a worker around a function that returns without suspending
    pub fn immediate<F, E>(f: F) -> Self
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
        E: Into<StepError>,
    {
        Self::new(StepAdapter::immediate(f))
    }

    /// Create a worker around a function whose work may suspend
    pub fn suspending<F, Fut, E>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<StepError>,
    {
        Self::new(StepAdapter::suspending(f))
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// True while the loop is meant to keep iterating and a loop task is owned
    pub fn is_running(&self) -> bool {
        self.shared.lock().is_running()
    }

    pub fn phase(&self) -> WorkerPhase {
        self.shared.signals.borrow().phase()
    }

    /// Schedule the loop on the current tokio runtime
    ///
    /// Does nothing if the worker is already running. A failure left over
    /// from an earlier run stays pending until the next `stop`.
    pub fn start(&self) -> Result<(), WorkerError> {
        self.start_generation().map(|_| ())
    }

    fn start_generation(&self) -> Result<u64, WorkerError> {
        let (runtime, generation) = {
            let mut inner = self.shared.lock();
            if inner.is_running() {
                tracing::trace!(worker = %self.shared.name, "start ignored, already running");
                return Ok(inner.state.generation());
            }

            let runtime = Handle::try_current()
                .map_err(|_| WorkerError::NoRuntime(self.shared.name.clone()))?;
            let generation = inner.state.begin();
            self.shared.publish(&inner);
            (runtime, generation)
        };

        // Spawned without the lock held: a closing runtime drops the loop
        // future, and with it the teardown guard, inside `spawn`
        let cancel = CancellationToken::new();
        let teardown = Teardown {
            shared: Arc::clone(&self.shared),
            generation,
        };
        let join = runtime.spawn(run_loop(
            teardown,
            Arc::clone(&self.step),
            cancel.clone(),
            self.config.interval,
        ));
        let handle = LoopHandle {
            generation,
            cancel,
            join,
        };

        let mut inner = self.shared.lock();
        if !inner.state.should_continue(generation) {
            // Stopped, restarted or already failed while spawning
            drop(inner);
            handle.cancel();
            tracing::debug!(worker = %self.shared.name, generation, "start superseded");
            return Ok(generation);
        }
        // A previous handle can only belong to a loop that already failed
        inner.task = Some(handle);

        tracing::debug!(worker = %self.shared.name, generation, "worker started");
        Ok(generation)
    }

    /// Start the worker and wait until its loop has entered
    ///
    /// Returns once the loop of the current run has begun, even if that loop
    /// has already ended because its first step failed.
    pub async fn ensure_started(&self) -> Result<(), WorkerError> {
        let generation = self.start_generation()?;
        let mut signals = self.shared.signals.subscribe();
        // The sender lives in `self.shared`, so the channel cannot close here
        let _ = signals.wait_for(|s| s.entered >= generation).await;
        Ok(())
    }

    /// Request the loop to stop and surface any captured failure
    ///
    /// The loop observes the request at its next suspension point. A captured
    /// failure is returned once; calling `stop` again returns `Ok`.
    pub fn stop(&self) -> Result<(), WorkerError> {
        self.halt().1
    }

    fn halt(&self) -> (u64, Result<(), WorkerError>) {
        let (generation, task, failure) = {
            let mut inner = self.shared.lock();
            let failure = inner.state.halt();
            let task = inner.task.take();
            self.shared.publish(&inner);
            (inner.state.generation(), task, failure)
        };

        match &task {
            Some(task) => {
                task.cancel();
                tracing::debug!(
                    worker = %self.shared.name,
                    generation = task.generation,
                    "stop requested"
                );
            }
            None => tracing::trace!(worker = %self.shared.name, "stop ignored, not running"),
        }

        match failure {
            Some(err) => {
                tracing::info!(worker = %self.shared.name, error = %err, "surfacing captured failure");
                (generation, Err(err))
            }
            None => (generation, Ok(())),
        }
    }

    /// Stop the worker and wait until its loop has fully unwound
    ///
    /// No step invocation of the stopped run happens after this returns.
    /// Returns immediately on a worker that was never started.
    pub async fn ensure_stopped(&self) -> Result<(), WorkerError> {
        let (generation, stopped) = self.halt();
        let mut signals = self.shared.signals.subscribe();
        let _ = signals.wait_for(|s| s.exited >= generation).await;
        stopped?;

        // The loop may have failed while it was unwinding
        match self.shared.lock().state.take_failure() {
            Some(err) => {
                tracing::info!(worker = %self.shared.name, error = %err, "surfacing captured failure");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.shared.name)
            .field("phase", &self.phase())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let (task, failure) = {
            let mut inner = self.shared.lock();
            let failure = inner.state.halt();
            let task = inner.task.take();
            self.shared.publish(&inner);
            (task, failure)
        };

        if let Some(task) = task {
            tracing::debug!(worker = %self.shared.name, generation = task.generation, "worker dropped, aborting loop");
            task.abort();
        }
        if let Some(err) = failure {
            tracing::warn!(worker = %self.shared.name, error = %err, "worker dropped with unobserved failure");
        }
    }
}

/// Why a loop run ended
enum LoopExit {
    /// Cancellation was observed at a suspension point
    Cancelled,
    /// The run flag went false between iterations
    Halted,
    /// The step failed or panicked
    Failed(WorkerError),
}

/// Marks a generation as torn down on drop
///
/// Built before the loop is spawned and moved into the loop future, so the
/// exit mark runs on every exit path: normal return, step failure, an abort,
/// and a runtime dropping the task before its first poll.
struct Teardown {
    shared: Arc<Shared>,
    generation: u64,
}

impl Teardown {
    fn enter(&self) {
        let generation = self.generation;
        self.shared.update(|state| state.enter(generation));
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        let generation = self.generation;
        self.shared.update(|state| state.exit(generation));
        tracing::debug!(worker = %self.shared.name, generation, "loop exited");
    }
}

async fn run_loop(
    teardown: Teardown,
    step: Arc<dyn Step>,
    cancel: CancellationToken,
    interval: Duration,
) {
    teardown.enter();
    let shared = Arc::clone(&teardown.shared);
    let generation = teardown.generation;
    tracing::debug!(worker = %shared.name, generation, "loop entered");

    let exit = tokio::select! {
        biased;
        _ = cancel.cancelled() => LoopExit::Cancelled,
        exit = iterate(&shared, step.as_ref(), generation, interval) => exit,
    };

    match exit {
        LoopExit::Cancelled => {
            tracing::debug!(worker = %shared.name, generation, "loop cancelled")
        }
        LoopExit::Halted => {
            tracing::debug!(worker = %shared.name, generation, "loop halted")
        }
        LoopExit::Failed(err) => {
            tracing::warn!(worker = %shared.name, generation, error = %err, "step failed, worker stopping");
            let replaced = shared.update(|state| state.fail(generation, err));
            if let Some(old) = replaced {
                tracing::warn!(worker = %shared.name, error = %old, "unobserved failure replaced");
            }
        }
    }
}

async fn iterate(
    shared: &Shared,
    step: &dyn Step,
    generation: u64,
    interval: Duration,
) -> LoopExit {
    while shared.should_continue(generation) {
        if let Err(err) = run_step(step).await {
            return LoopExit::Failed(err);
        }
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        tokio::task::yield_now().await;
    }
    LoopExit::Halted
}

async fn run_step(step: &dyn Step) -> Result<(), WorkerError> {
    match AssertUnwindSafe(step.run()).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(WorkerError::StepFailed(err)),
        Err(payload) => Err(WorkerError::StepPanicked(panic_message(payload))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
