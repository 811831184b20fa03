// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-owner worker slots
//!
//! A [`WorkerSlot`] is a field on an owning type. The first access builds one
//! [`Worker`] whose step calls a method on the owner; every later access
//! returns that same worker. The slot can be filled once and never reassigned.
//!
//! ```ignore
//! struct Beacon {
//!     sent: AtomicUsize,
//!     pulse: WorkerSlot<Beacon>,
//! }
//!
//! impl Beacon {
//!     fn pulse(self: &Arc<Self>) -> &Worker {
//!         self.pulse.get_or_bind_immediate(self, |beacon| {
//!             beacon.sent.fetch_add(1, Ordering::SeqCst);
//!             Ok::<_, Infallible>(())
//!         })
//!     }
//! }
//! ```
//!
//! The worker's step only holds a weak reference to the owner, so it never
//! keeps the owner alive. Dropping the owner drops the slot and with it the
//! worker, which stops the loop.

use crate::config::WorkerConfig;
use crate::error::StepError;
use crate::step::StepAdapter;
use crate::worker::Worker;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Misuse of a worker slot
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("worker slot {slot} is already bound")]
    AlreadyBound { slot: String },
}

/// Lazily bound, write-once worker attached to an owner of type `O`
pub struct WorkerSlot<O> {
    config: WorkerConfig,
    cell: OnceLock<Worker>,
    _owner: PhantomData<fn() -> O>,
}

impl<O> WorkerSlot<O>
where
    O: Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(WorkerConfig::new(name))
    }

    /// Slot whose worker is built with `config`
    pub fn with_config(config: WorkerConfig) -> Self {
        Self {
            config,
            cell: OnceLock::new(),
            _owner: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The bound worker, if the slot has been filled
    pub fn get(&self) -> Option<&Worker> {
        self.cell.get()
    }

    pub fn is_bound(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Return the owner's worker, building it on first access
    ///
    /// `owner` must be the object that holds this slot. `method` is the
    /// suspending step, called with the owner each iteration.
    pub fn get_or_bind<F, Fut, E>(&self, owner: &Arc<O>, method: F) -> &Worker
    where
        F: Fn(Arc<O>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<StepError>,
    {
        self.debug_assert_held_by(owner);
        self.cell.get_or_init(|| {
            let owner = Arc::downgrade(owner);
            let step = StepAdapter::suspending(move || {
                let call = owner.upgrade().map(&method);
                async move {
                    match call {
                        Some(call) => call.await,
                        // Owner released; its slot drop has already stopped the loop
                        None => Ok(()),
                    }
                }
            });
            tracing::debug!(slot = %self.config.name, "worker bound");
            Worker::with_config(step, self.config.clone())
        })
    }

    /// Return the owner's worker, building it on first access
    ///
    /// `owner` must be the object that holds this slot. `method` is an
    /// immediate step, called with the owner each iteration.
    pub fn get_or_bind_immediate<F, E>(&self, owner: &Arc<O>, method: F) -> &Worker
    where
        F: Fn(&O) -> Result<(), E> + Send + Sync + 'static,
        E: Into<StepError>,
    {
        self.debug_assert_held_by(owner);
        self.cell.get_or_init(|| {
            let owner = Arc::downgrade(owner);
            let step = StepAdapter::immediate(move || match owner.upgrade() {
                Some(owner) => method(&*owner),
                None => Ok(()),
            });
            tracing::debug!(slot = %self.config.name, "worker bound");
            Worker::with_config(step, self.config.clone())
        })
    }

    /// Fill the slot with an existing worker
    ///
    /// Fails if the slot already holds a worker; the rejected worker is dropped.
    pub fn bind(&self, worker: Worker) -> Result<(), BindingError> {
        self.cell.set(worker).map_err(|_| BindingError::AlreadyBound {
            slot: self.config.name.clone(),
        })
    }

    /// The slot's address must fall inside the owner's allocation
    fn debug_assert_held_by(&self, owner: &Arc<O>) {
        let start = Arc::as_ptr(owner) as usize;
        let end = start + std::mem::size_of::<O>();
        let slot = self as *const Self as usize;
        debug_assert!(
            (start..end).contains(&slot),
            "worker slot {} must be bound through the object holding it",
            self.config.name
        );
    }
}

impl<O> fmt::Debug for WorkerSlot<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSlot")
            .field("name", &self.config.name)
            .field("worker", &self.cell.get())
            .finish()
    }
}

#[cfg(test)]
#[path = "binding_tests.rs"]
mod tests;
