// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pluggable sink for assembled payloads.

use async_trait::async_trait;

use crate::model::{ErrorsPayload, TransactionsPayload};

/// Failure of a single send attempt. Any error triggers the worker's
/// timer-based retry; the failed batch is retained.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("send cancelled by tracer shutdown")]
    Cancelled,
}

/// Delivers payloads to the intake server.
///
/// Both methods are called serially from the tracer's worker task; an
/// implementation never sees concurrent calls from the same tracer. An
/// in-flight call is cancelled by dropping its future when the tracer
/// closes, so implementations should be cancel-safe.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_transactions(&self, payload: &TransactionsPayload) -> Result<(), TransportError>;
    async fn send_errors(&self, payload: &ErrorsPayload) -> Result<(), TransportError>;
}

/// A transport that accepts and discards every payload. Useful in tests
/// and benchmarks, and as a stand-in while wiring instrumentation.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

#[async_trait]
impl Transport for Discard {
    async fn send_transactions(&self, _payload: &TransactionsPayload) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_errors(&self, _payload: &ErrorsPayload) -> Result<(), TransportError> {
        Ok(())
    }
}
