// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step contract and the adapter for plain functions
//!
//! A step is one unit of repeating work. Workers only ever see the
//! [`Step`] trait; [`StepAdapter`] lets callers pick, at construction
//! time, whether their function returns immediately or suspends.

use crate::error::StepError;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Outcome of a single step invocation
pub type StepResult = Result<(), StepError>;

type BoxStepFuture = Pin<Box<dyn Future<Output = StepResult> + Send + 'static>>;

/// One unit of repeating work
///
/// A worker awaits `run` to completion once per loop iteration. Returning
/// `Err` ends the current run; the error is held until the worker is stopped.
#[async_trait]
pub trait Step: Send + Sync + 'static {
    async fn run(&self) -> StepResult;
}

#[async_trait]
impl<S: Step + ?Sized> Step for Arc<S> {
    async fn run(&self) -> StepResult {
        (**self).run().await
    }
}

/// Uniform calling contract over immediate and suspending step functions
#[derive(Clone)]
pub struct StepAdapter {
    kind: StepKind,
}

#[derive(Clone)]
enum StepKind {
    Immediate(Arc<dyn Fn() -> StepResult + Send + Sync>),
    Suspending(Arc<dyn Fn() -> BoxStepFuture + Send + Sync>),
    Erased(Arc<dyn Step>),
}

impl StepAdapter {
    /// Adapt a function that does its work and returns without suspending
    pub fn immediate<F, E>(f: F) -> Self
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
        E: Into<StepError>,
    {
        Self {
            kind: StepKind::Immediate(Arc::new(move || -> StepResult {
                f().map_err(Into::<StepError>::into)
            })),
        }
    }

    /// Adapt a function whose work is a future that may suspend
    pub fn suspending<F, Fut, E>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<StepError>,
    {
        Self {
            kind: StepKind::Suspending(Arc::new(move || -> BoxStepFuture {
                let fut = f();
                Box::pin(async move { fut.await.map_err(Into::<StepError>::into) })
            })),
        }
    }

    /// Erase a [`Step`] implementation behind the adapter
    pub fn from_step<S: Step>(step: S) -> Self {
        Self {
            kind: StepKind::Erased(Arc::new(step)),
        }
    }

    /// Whether invoking this step can suspend before it completes
    pub fn is_suspending(&self) -> bool {
        !matches!(self.kind, StepKind::Immediate(_))
    }
}

impl fmt::Debug for StepAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            StepKind::Immediate(_) => "immediate",
            StepKind::Suspending(_) => "suspending",
            StepKind::Erased(_) => "erased",
        };
        f.debug_struct("StepAdapter").field("kind", &kind).finish()
    }
}

#[async_trait]
impl Step for StepAdapter {
    async fn run(&self) -> StepResult {
        match &self.kind {
            StepKind::Immediate(f) => f(),
            StepKind::Suspending(f) => f().await,
            StepKind::Erased(step) => step.run().await,
        }
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
