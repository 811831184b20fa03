//! Shared helpers for worker specs

pub use aw_core::{
    BindingError, Step, StepAdapter, StepResult, TracedStep, Worker, WorkerConfig, WorkerError,
    WorkerPhase, WorkerSlot,
};
pub use std::convert::Infallible;
pub use std::sync::atomic::{AtomicUsize, Ordering};
pub use std::sync::Arc;
pub use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// How long specs let a worker run before sampling its side effects
pub const RUN_FOR: Duration = Duration::from_millis(10);

/// Install a test log subscriber honoring `RUST_LOG`, once per process
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Let the worker loop run for [`RUN_FOR`]
pub async fn let_it_run() {
    tokio::time::sleep(RUN_FOR).await;
}

/// Arithmetic failure raised by the failing steps
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("division by zero")]
pub struct ZeroDivision;

/// Integer division that reports division by zero as an error
pub fn checked_divide(numerator: i64, denominator: i64) -> Result<i64, ZeroDivision> {
    numerator.checked_div(denominator).ok_or(ZeroDivision)
}

/// Owner with one counting worker, as an application type would hold it
pub struct Counter {
    count: Arc<AtomicUsize>,
    adder: WorkerSlot<Counter>,
}

impl Counter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            count: Arc::new(AtomicUsize::new(0)),
            adder: WorkerSlot::new("add_worker"),
        })
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Handle on the count that stays readable after the owner is dropped
    pub fn tally(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.count)
    }

    /// The counter's worker, bound on first access
    pub fn add_worker(self: &Arc<Self>) -> &Worker {
        self.adder.get_or_bind_immediate(self, |counter| {
            counter.count.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(())
        })
    }

    pub fn adder_slot(&self) -> &WorkerSlot<Counter> {
        &self.adder
    }
}

/// Owner whose worker suspends inside every step
pub struct AsyncCounter {
    pub count: AtomicUsize,
    adder: WorkerSlot<AsyncCounter>,
}

impl AsyncCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            count: AtomicUsize::new(0),
            adder: WorkerSlot::new("add_worker"),
        })
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn add_worker(self: &Arc<Self>) -> &Worker {
        self.adder.get_or_bind(self, |counter: Arc<AsyncCounter>| async move {
            tokio::task::yield_now().await;
            counter.count.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(())
        })
    }
}
