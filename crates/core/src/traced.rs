// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced step wrapper for consistent observability

use crate::step::{Step, StepResult};
use async_trait::async_trait;
use std::time::Instant;
use tracing::Instrument;

/// Wrapper that adds a tracing span and timing to every invocation of a step
#[derive(Clone)]
pub struct TracedStep<S> {
    name: String,
    inner: S,
}

impl<S> TracedStep<S> {
    pub fn new(name: impl Into<String>, inner: S) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: Step> Step for TracedStep<S> {
    async fn run(&self) -> StepResult {
        let span = tracing::debug_span!("step.run", worker = %self.name);

        let start = Instant::now();
        let result = self.inner.run().instrument(span.clone()).await;
        let elapsed_us = start.elapsed().as_micros() as u64;

        span.in_scope(|| match &result {
            Ok(()) => tracing::trace!(elapsed_us, "step completed"),
            Err(e) => tracing::error!(elapsed_us, error = %e, "step failed"),
        });

        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
