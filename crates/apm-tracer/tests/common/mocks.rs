// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock implementations of tracer collaborators for testing

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use apm_tracer::model::{ErrorsPayload, TransactionsPayload};
use apm_tracer::{
    ContextSetter, Frame, Logger, Processor, Transport, TransportError,
};
use async_trait::async_trait;
use tokio::sync::Notify;

/// Transport that records every payload it is handed and always succeeds.
#[derive(Default)]
pub struct RecordingTransport {
    transactions: Mutex<Vec<TransactionsPayload>>,
    errors: Mutex<Vec<ErrorsPayload>>,
}

impl RecordingTransport {
    pub fn transaction_payloads(&self) -> Vec<TransactionsPayload> {
        #[allow(clippy::unwrap_used)]
        self.transactions.lock().unwrap().clone()
    }

    pub fn error_payloads(&self) -> Vec<ErrorsPayload> {
        #[allow(clippy::unwrap_used)]
        self.errors.lock().unwrap().clone()
    }

    pub fn transactions_sent(&self) -> usize {
        self.transaction_payloads()
            .iter()
            .map(|payload| payload.transactions.len())
            .sum()
    }

    pub fn errors_sent(&self) -> usize {
        self.error_payloads()
            .iter()
            .map(|payload| payload.errors.len())
            .sum()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_transactions(&self, payload: &TransactionsPayload) -> Result<(), TransportError> {
        #[allow(clippy::unwrap_used)]
        self.transactions.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn send_errors(&self, payload: &ErrorsPayload) -> Result<(), TransportError> {
        #[allow(clippy::unwrap_used)]
        self.errors.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// Transport that fails every request, counting the attempts.
#[derive(Default)]
pub struct FailingTransport {
    pub transaction_attempts: AtomicUsize,
    pub error_attempts: AtomicUsize,
}

impl FailingTransport {
    pub fn transaction_attempts(&self) -> usize {
        self.transaction_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FailingTransport {
    async fn send_transactions(
        &self,
        _payload: &TransactionsPayload,
    ) -> Result<(), TransportError> {
        self.transaction_attempts.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Request("intake unavailable".to_string()))
    }

    async fn send_errors(&self, _payload: &ErrorsPayload) -> Result<(), TransportError> {
        self.error_attempts.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Request("intake unavailable".to_string()))
    }
}

/// Transport whose first error send blocks until released, then fails.
/// Every later send succeeds, recording the batch size.
pub struct BlockingTransport {
    first_call_pending: AtomicBool,
    in_flight: AtomicBool,
    release: Notify,
    error_batches: Mutex<Vec<usize>>,
}

impl Default for BlockingTransport {
    fn default() -> Self {
        BlockingTransport {
            first_call_pending: AtomicBool::new(true),
            in_flight: AtomicBool::new(false),
            release: Notify::new(),
            error_batches: Mutex::new(Vec::new()),
        }
    }
}

impl BlockingTransport {
    pub fn is_blocked(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Unblock the first send, which then reports failure.
    pub fn release(&self) {
        self.release.notify_one();
    }

    pub fn error_batches(&self) -> Vec<usize> {
        #[allow(clippy::unwrap_used)]
        self.error_batches.lock().unwrap().clone()
    }

    pub fn errors_sent(&self) -> usize {
        self.error_batches().iter().sum()
    }
}

#[async_trait]
impl Transport for BlockingTransport {
    async fn send_transactions(
        &self,
        _payload: &TransactionsPayload,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_errors(&self, payload: &ErrorsPayload) -> Result<(), TransportError> {
        if self.first_call_pending.swap(false, Ordering::SeqCst) {
            self.in_flight.store(true, Ordering::SeqCst);
            self.release.notified().await;
            self.in_flight.store(false, Ordering::SeqCst);
            return Err(TransportError::Request("released with failure".to_string()));
        }
        #[allow(clippy::unwrap_used)]
        self.error_batches.lock().unwrap().push(payload.errors.len());
        Ok(())
    }
}

/// Processor that counts how many records of each kind it saw.
#[derive(Default)]
pub struct CountingProcessor {
    pub transactions: AtomicUsize,
    pub errors: AtomicUsize,
}

impl Processor for CountingProcessor {
    fn process_transaction(&self, _transaction: &mut apm_tracer::model::TransactionData) {
        self.transactions.fetch_add(1, Ordering::SeqCst);
    }

    fn process_error(&self, _error: &mut apm_tracer::model::ErrorData) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

/// Context setter that fails on the first frame it is handed.
pub struct FailingContextSetter;

impl ContextSetter for FailingContextSetter {
    fn set_context(&self, _frame: &mut Frame, _pre: usize, _post: usize) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "source unavailable"))
    }
}

/// Logger that collects everything it is given.
#[derive(Default)]
pub struct CollectingLogger {
    messages: Mutex<Vec<String>>,
}

impl CollectingLogger {
    pub fn messages(&self) -> Vec<String> {
        #[allow(clippy::unwrap_used)]
        self.messages.lock().unwrap().clone()
    }
}

impl Logger for CollectingLogger {
    fn debug(&self, message: &str) {
        #[allow(clippy::unwrap_used)]
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        #[allow(clippy::unwrap_used)]
        self.messages.lock().unwrap().push(message.to_string());
    }
}
