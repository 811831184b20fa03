// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for worker supervision

use thiserror::Error;

/// Failure value returned by a step, carried unchanged to whoever stops the worker
pub type StepError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by a [`Worker`](crate::Worker)
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("step failed: {0}")]
    StepFailed(#[source] StepError),
    #[error("step panicked: {0}")]
    StepPanicked(String),
    #[error("no tokio runtime available to schedule worker {0}")]
    NoRuntime(String),
}

impl WorkerError {
    /// The error the step itself returned, if this is a step failure
    pub fn step_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            WorkerError::StepFailed(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    /// Downcast the step's error to its concrete type
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.step_error()?.downcast_ref::<E>()
    }

    /// Take ownership of the step's error, if this is a step failure
    pub fn into_step_error(self) -> Option<StepError> {
        match self {
            WorkerError::StepFailed(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the step failed or panicked (as opposed to a scheduling problem)
    pub fn is_step_failure(&self) -> bool {
        matches!(
            self,
            WorkerError::StepFailed(_) | WorkerError::StepPanicked(_)
        )
    }
}
