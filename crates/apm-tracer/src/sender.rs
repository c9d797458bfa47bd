// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch assembly and transport invocation.
//!
//! The sender is stateless beyond the configuration it carries. It never
//! touches the queues: the worker hands it a batch, and on failure the
//! records are left exactly as they were so the retry timer can try again.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error_event::ErrorEvent;
use crate::logger::Logger;
use crate::model::{ErrorsPayload, Metadata, TransactionsPayload};
use crate::processor::Processor;
use crate::stacktrace::ContextSetter;
use crate::stats::TracerStats;
use crate::transaction::Transaction;
use crate::transport::{Transport, TransportError};

pub(crate) struct Sender {
    transport: Arc<dyn Transport>,
    metadata: Arc<Metadata>,
    pub(crate) logger: Option<Arc<dyn Logger>>,
    pub(crate) processor: Option<Arc<dyn Processor>>,
    pub(crate) context_setter: Option<Arc<dyn ContextSetter>>,
    pub(crate) pre_context: usize,
    pub(crate) post_context: usize,
}

impl Sender {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        metadata: Arc<Metadata>,
        pre_context: usize,
        post_context: usize,
    ) -> Self {
        Sender {
            transport,
            metadata,
            logger: None,
            processor: None,
            context_setter: None,
            pre_context,
            post_context,
        }
    }

    fn debug(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.debug(message);
        }
    }

    /// Attempt to send the queued transactions, returning whether they were
    /// transmitted. Empty batches short-circuit to `false` without a send.
    pub(crate) async fn send_transactions(
        &self,
        cancel: &CancellationToken,
        transactions: &mut [Transaction],
        stats: &mut TracerStats,
    ) -> bool {
        if transactions.is_empty() {
            return false;
        }
        if let Some(setter) = &self.context_setter {
            let mut failed = None;
            for transaction in transactions.iter_mut() {
                if let Err(error) =
                    transaction.apply_source_context(setter.as_ref(), self.pre_context, self.post_context)
                {
                    failed = Some(error);
                    break;
                }
            }
            if let Some(error) = failed {
                self.debug(&format!("setting source context failed: {error}"));
                stats.errors.set_context += 1;
            }
        }
        let mut payload = TransactionsPayload {
            service: self.metadata.service.clone(),
            process: self.metadata.process.clone(),
            system: self.metadata.system.clone(),
            transactions: Vec::with_capacity(transactions.len()),
        };
        for transaction in transactions.iter_mut() {
            let mut data = transaction.build_data();
            if let Some(processor) = &self.processor {
                processor.process_transaction(&mut data);
            }
            payload.transactions.push(data);
        }
        let result = tokio::select! {
            () = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.transport.send_transactions(&payload) => result,
        };
        match result {
            Ok(()) => {
                stats.transactions_sent += transactions.len() as u64;
                true
            }
            Err(error) => {
                self.debug(&format!("sending transactions failed: {error}"));
                stats.errors.send_transactions += 1;
                false
            }
        }
    }

    /// Attempt to send the queued errors, returning whether they were
    /// transmitted. Empty batches short-circuit to `false` without a send.
    pub(crate) async fn send_errors(
        &self,
        cancel: &CancellationToken,
        errors: &mut [ErrorEvent],
        stats: &mut TracerStats,
    ) -> bool {
        if errors.is_empty() {
            return false;
        }
        if let Some(setter) = &self.context_setter {
            let mut failed = None;
            for event in errors.iter_mut() {
                if let Err(error) =
                    event.apply_source_context(setter.as_ref(), self.pre_context, self.post_context)
                {
                    failed = Some(error);
                    break;
                }
            }
            if let Some(error) = failed {
                self.debug(&format!("setting source context failed: {error}"));
                stats.errors.set_context += 1;
            }
        }
        let mut payload = ErrorsPayload {
            service: self.metadata.service.clone(),
            process: self.metadata.process.clone(),
            system: self.metadata.system.clone(),
            errors: Vec::with_capacity(errors.len()),
        };
        for error in errors.iter() {
            let mut data = error.build_data();
            if let Some(processor) = &self.processor {
                processor.process_error(&mut data);
            }
            payload.errors.push(data);
        }
        let result = tokio::select! {
            () = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.transport.send_errors(&payload) => result,
        };
        match result {
            Ok(()) => {
                stats.errors_sent += errors.len() as u64;
                true
            }
            Err(error) => {
                self.debug(&format!("sending errors failed: {error}"));
                stats.errors.send_errors += 1;
                false
            }
        }
    }
}
