// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The tracer's single-actor event loop.
//!
//! All queue state is owned by one task, so the hot path needs no locks.
//! Each iteration waits for exactly one event (shutdown, a config update,
//! record ingress, timer expiry, or a forced flush), decides whether that
//! event mandates a send attempt, and commits its stats delta.
//!
//! The two queues overflow differently on purpose. Transactions drop the
//! oldest records: the newest data is the most actionable for latency
//! regressions. Errors drop the newest: the loop simply stops reading from
//! the errors channel once its internal queue is full, the channel buffer
//! absorbs what it can, and the facade rejects the rest. The first
//! occurrences of a failure burst are the most diagnostic ones.
//!
//! Send failures never spin the loop. The failed batch is retained and the
//! flush timer re-armed, which bounds the send-attempt frequency while the
//! loop keeps multiplexing ingress.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::error_event::ErrorEvent;
use crate::logger::Logger;
use crate::processor::Processor;
use crate::sender::Sender;
use crate::stacktrace::ContextSetter;
use crate::stats::TracerStats;
use crate::tracer::Shared;
use crate::transaction::Transaction;

pub(crate) struct Worker {
    pub(crate) transactions: mpsc::Receiver<Transaction>,
    pub(crate) errors: mpsc::Receiver<ErrorEvent>,
    pub(crate) force_flush: mpsc::Receiver<oneshot::Sender<()>>,
    pub(crate) set_flush_interval: mpsc::Receiver<Duration>,
    pub(crate) set_max_transaction_queue_size: mpsc::Receiver<usize>,
    pub(crate) set_max_error_queue_size: mpsc::Receiver<usize>,
    pub(crate) set_pre_context: mpsc::Receiver<usize>,
    pub(crate) set_post_context: mpsc::Receiver<usize>,
    pub(crate) set_context_setter: mpsc::Receiver<Option<Arc<dyn ContextSetter>>>,
    pub(crate) set_logger: mpsc::Receiver<Option<Arc<dyn Logger>>>,
    pub(crate) set_processor: mpsc::Receiver<Option<Arc<dyn Processor>>>,
    pub(crate) closing: CancellationToken,
    pub(crate) closed: CancellationToken,
    pub(crate) shared: Arc<Shared>,
    pub(crate) sender: Sender,
    pub(crate) flush_interval: Duration,
    pub(crate) max_transaction_queue_size: usize,
    pub(crate) max_error_queue_size: usize,
}

impl Worker {
    pub(crate) async fn run(mut self) {
        // Cancelled when the task exits, however it exits.
        let _closed = self.closed.clone().drop_guard();
        tracing::debug!("tracer worker started");

        let mut transactions: Vec<Transaction> = Vec::new();
        let mut errors: Vec<ErrorEvent> = Vec::new();
        // Armed while a periodic flush or retry is scheduled.
        let mut flush_deadline: Option<Instant> = None;
        // Present while a flush caller awaits its ack; gates the
        // force-flush branch so flushes never interleave.
        let mut pending_flush: Option<oneshot::Sender<()>> = None;
        // Cleared while the error queue is at capacity.
        let mut errors_open = true;

        loop {
            let mut send_transactions = false;
            let mut delta = TracerStats::default();

            tokio::select! {
                () = self.closing.cancelled() => {
                    tracing::debug!("tracer worker shutting down");
                    return;
                }
                Some(value) = self.set_flush_interval.recv() => {
                    self.flush_interval = value;
                    continue;
                }
                Some(value) = self.set_max_transaction_queue_size.recv() => {
                    self.max_transaction_queue_size = value;
                    if value == 0 || transactions.len() < value {
                        continue;
                    }
                    // The queue is saturated under the new limit.
                    send_transactions = true;
                }
                Some(value) = self.set_max_error_queue_size.recv() => {
                    self.max_error_queue_size = value;
                    if value == 0 || errors.len() < value {
                        errors_open = true;
                    }
                    continue;
                }
                Some(value) = self.set_pre_context.recv() => {
                    self.sender.pre_context = value;
                    continue;
                }
                Some(value) = self.set_post_context.recv() => {
                    self.sender.post_context = value;
                    continue;
                }
                Some(value) = self.set_context_setter.recv() => {
                    self.sender.context_setter = value;
                    continue;
                }
                Some(value) = self.set_logger.recv() => {
                    self.sender.logger = value;
                    continue;
                }
                Some(value) = self.set_processor.recv() => {
                    self.sender.processor = value;
                    continue;
                }
                event = self.errors.recv(), if errors_open => {
                    let Some(event) = event else { return };
                    errors.push(event);
                }
                received = self.transactions.recv() => {
                    let Some(transaction) = received else { return };
                    let before = transactions.len();
                    self.enqueue_transaction(&mut transactions, transaction, &mut delta);
                    if transactions.len() == before && flush_deadline.is_some() {
                        // The queue was already saturated and a retry is
                        // pending; charge the drop and wait for the timer.
                        self.commit(delta);
                        continue;
                    }
                    if self.max_transaction_queue_size == 0
                        || transactions.len() < self.max_transaction_queue_size
                    {
                        if flush_deadline.is_none() {
                            flush_deadline = Some(Instant::now() + self.flush_interval);
                        }
                        continue;
                    }
                    send_transactions = true;
                }
                () = sleep_until(flush_deadline.unwrap_or_else(Instant::now)),
                    if flush_deadline.is_some() =>
                {
                    flush_deadline = None;
                    send_transactions = true;
                }
                request = self.force_flush.recv(), if pending_flush.is_none() => {
                    let Some(ack) = request else { return };
                    // Pull whatever producers managed to enqueue before the
                    // flush call, so the ack covers it.
                    while let Ok(transaction) = self.transactions.try_recv() {
                        self.enqueue_transaction(&mut transactions, transaction, &mut delta);
                    }
                    pending_flush = Some(ack);
                    flush_deadline = None;
                    send_transactions = true;
                }
            }

            // Top the error queue up from the channel before the attempt.
            if self.max_error_queue_size > 0 {
                while errors.len() < self.max_error_queue_size {
                    match self.errors.try_recv() {
                        Ok(event) => errors.push(event),
                        Err(_) => break,
                    }
                }
            }

            if self
                .sender
                .send_errors(&self.closing, &mut errors, &mut delta)
                .await
            {
                for event in errors.drain(..) {
                    self.shared.error_pool.release(event);
                }
                errors_open = true;
            } else if self.max_error_queue_size > 0 && errors.len() == self.max_error_queue_size {
                errors_open = false;
            }

            if send_transactions
                && self
                    .sender
                    .send_transactions(&self.closing, &mut transactions, &mut delta)
                    .await
            {
                for transaction in transactions.drain(..) {
                    self.shared.transaction_pool.release(transaction);
                }
            }

            if !delta.is_zero() {
                let send_failed =
                    delta.errors.send_transactions != 0 || delta.errors.send_errors != 0;
                self.commit(delta);
                if send_failed {
                    // Defer the retry instead of hammering the transport.
                    if flush_deadline.is_none() {
                        flush_deadline = Some(Instant::now() + self.flush_interval);
                    }
                    continue;
                }
            }
            if send_transactions {
                if let Some(ack) = pending_flush.take() {
                    // The caller may have stopped waiting; that is fine.
                    let _ = ack.send(());
                }
            }
        }
    }

    /// Append to the transaction queue, evicting the oldest records when
    /// the configured limit would be exceeded.
    fn enqueue_transaction(
        &self,
        queue: &mut Vec<Transaction>,
        transaction: Transaction,
        stats: &mut TracerStats,
    ) {
        let max = self.max_transaction_queue_size;
        if max > 0 && queue.len() >= max {
            let evict = queue.len() - max + 1;
            for evicted in queue.drain(..evict) {
                self.shared.transaction_pool.release(evicted);
            }
            stats.transactions_dropped += evict as u64;
        }
        queue.push(transaction);
    }

    fn commit(&self, delta: TracerStats) {
        #[allow(clippy::expect_used)]
        self.shared
            .stats
            .lock()
            .expect("lock poisoned")
            .accumulate(delta);
    }
}
