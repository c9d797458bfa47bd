// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pluggable log sink for send and enrichment diagnostics.
//!
//! The tracer stays silent about per-record outcomes unless a logger is
//! installed via [`Tracer::set_logger`](crate::Tracer::set_logger).
//! Lifecycle events use the `tracing` macros directly.

/// Debug/error sink consulted by the sender.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn error(&self, message: &str);
}

/// A [`Logger`] forwarding to the `tracing` ecosystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}
