// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! aw-core: supervised repeating workers
//!
//! This crate provides:
//! - A step contract and an explicit adapter for immediate and suspending step functions
//! - A worker state machine that repeats a step until stopped, with deferred failure reporting
//! - Per-owner worker slots that lazily bind one worker to one owning object
//! - Worker configuration and tracing wrappers

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod binding;
pub mod config;
pub mod error;
pub mod step;
pub mod traced;
pub mod worker;


// Re-exports
pub use binding::{BindingError, WorkerSlot};
pub use config::{ConfigError, WorkerConfig};
pub use error::{StepError, WorkerError};
pub use step::{Step, StepAdapter, StepResult};
pub use traced::TracedStep;
pub use worker::{Worker, WorkerPhase};
