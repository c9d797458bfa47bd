// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Public tracer facade.
//!
//! The facade is a cloneable handle. Everything it does is marshalled onto
//! the worker task's channels: record submission is a non-blocking
//! `try_send` that charges a drop counter on overflow, flushes travel as
//! oneshot acks, and each configuration knob has its own channel so the
//! worker accepts updates at a deterministic point in its cycle. The only
//! state producers read directly is the span limit and the sampler, which
//! sit under a read/write lock and are snapshotted per transaction.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::{
    environment_from_env, service_name_from_env, service_version_from_env, ConfigError,
    TracerOptions, DEFAULT_POST_CONTEXT, DEFAULT_PRE_CONTEXT,
};
use crate::error_event::ErrorEvent;
use crate::logger::Logger;
use crate::model::{Agent, Metadata, Process, Service, System};
use crate::pool::Pool;
use crate::processor::Processor;
use crate::sampler::{RatioSampler, Sampler};
use crate::sender::Sender;
use crate::stacktrace::ContextSetter;
use crate::stats::TracerStats;
use crate::transaction::Transaction;
use crate::transport::Transport;
use crate::worker::Worker;

/// Capacity of the transaction submission channel. Submissions beyond it
/// are dropped without blocking the producer.
pub const TRANSACTIONS_CHANNEL_CAP: usize = 1000;
/// Capacity of the error submission channel.
pub const ERRORS_CHANNEL_CAP: usize = 1000;

/// State shared between the facade and the worker.
pub(crate) struct Shared {
    pub(crate) stats: Mutex<TracerStats>,
    pub(crate) producer: RwLock<ProducerConfig>,
    pub(crate) transaction_pool: Pool<Transaction>,
    pub(crate) error_pool: Pool<ErrorEvent>,
}

/// Configuration read by producers at transaction start, not by the worker.
pub(crate) struct ProducerConfig {
    pub(crate) max_spans: usize,
    pub(crate) sampler: Option<Arc<dyn Sampler>>,
}

struct Inner {
    transactions: mpsc::Sender<Transaction>,
    errors: mpsc::Sender<ErrorEvent>,
    force_flush: mpsc::Sender<oneshot::Sender<()>>,
    set_flush_interval: mpsc::Sender<Duration>,
    set_max_transaction_queue_size: mpsc::Sender<usize>,
    set_max_error_queue_size: mpsc::Sender<usize>,
    set_pre_context: mpsc::Sender<usize>,
    set_post_context: mpsc::Sender<usize>,
    set_context_setter: mpsc::Sender<Option<Arc<dyn ContextSetter>>>,
    set_logger: mpsc::Sender<Option<Arc<dyn Logger>>>,
    set_processor: mpsc::Sender<Option<Arc<dyn Processor>>>,
    closing: CancellationToken,
    closed: CancellationToken,
    shared: Arc<Shared>,
}

/// Buffers transactions and errors and forwards them to an intake server
/// through the configured [`Transport`].
///
/// Transactions are buffered until the flush timer fires, the queue
/// reaches its limit, or [`flush`](Tracer::flush) is called; once the
/// queue limit is reached, new transactions replace the oldest ones.
/// Errors are sent as soon as possible and buffered while the transport
/// is busy or failing; once the error queue limit is reached, new errors
/// are dropped until the queue drains. Failed sends are retried on the
/// flush timer.
///
/// The tracer must be created inside a tokio runtime; its worker runs as
/// a spawned task until [`close`](Tracer::close).
#[derive(Clone)]
pub struct Tracer {
    inner: Arc<Inner>,
}

impl Tracer {
    /// Create a tracer for the named service, reading the remaining
    /// options from the environment and failing on the first invalid
    /// value. An empty `service_name` falls back to `APM_SERVICE_NAME`.
    pub fn new(
        service_name: &str,
        service_version: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let name = if service_name.is_empty() {
            service_name_from_env().ok_or(ConfigError::MissingServiceName)?
        } else {
            service_name.to_string()
        };
        let version = if service_version.is_empty() {
            service_version_from_env()
        } else {
            Some(service_version.to_string())
        };
        let options = TracerOptions::from_env()?;
        Ok(Self::with_options(name, version, transport, options))
    }

    /// Create a tracer from explicit options.
    pub fn with_options(
        service_name: impl Into<String>,
        service_version: Option<String>,
        transport: Arc<dyn Transport>,
        options: TracerOptions,
    ) -> Self {
        let metadata = Arc::new(Metadata {
            service: Service {
                name: service_name.into(),
                version: service_version,
                environment: environment_from_env(),
                agent: Agent::current(),
            },
            process: Process::current(),
            system: System::current(),
        });

        let sampler: Option<Arc<dyn Sampler>> = if options.sample_rate < 1.0 {
            Some(Arc::new(RatioSampler::new(options.sample_rate)))
        } else {
            None
        };
        let shared = Arc::new(Shared {
            stats: Mutex::new(TracerStats::default()),
            producer: RwLock::new(ProducerConfig {
                max_spans: options.max_spans,
                sampler,
            }),
            transaction_pool: Pool::new(TRANSACTIONS_CHANNEL_CAP),
            error_pool: Pool::new(ERRORS_CHANNEL_CAP),
        });

        let (transactions_tx, transactions_rx) = mpsc::channel(TRANSACTIONS_CHANNEL_CAP);
        let (errors_tx, errors_rx) = mpsc::channel(ERRORS_CHANNEL_CAP);
        let (force_flush_tx, force_flush_rx) = mpsc::channel(1);
        let (set_flush_interval_tx, set_flush_interval_rx) = mpsc::channel(1);
        let (set_max_transaction_queue_size_tx, set_max_transaction_queue_size_rx) =
            mpsc::channel(1);
        let (set_max_error_queue_size_tx, set_max_error_queue_size_rx) = mpsc::channel(1);
        let (set_pre_context_tx, set_pre_context_rx) = mpsc::channel(1);
        let (set_post_context_tx, set_post_context_rx) = mpsc::channel(1);
        let (set_context_setter_tx, set_context_setter_rx) = mpsc::channel(1);
        let (set_logger_tx, set_logger_rx) = mpsc::channel(1);
        let (set_processor_tx, set_processor_rx) = mpsc::channel(1);

        let closing = CancellationToken::new();
        let closed = CancellationToken::new();

        let worker = Worker {
            transactions: transactions_rx,
            errors: errors_rx,
            force_flush: force_flush_rx,
            set_flush_interval: set_flush_interval_rx,
            set_max_transaction_queue_size: set_max_transaction_queue_size_rx,
            set_max_error_queue_size: set_max_error_queue_size_rx,
            set_pre_context: set_pre_context_rx,
            set_post_context: set_post_context_rx,
            set_context_setter: set_context_setter_rx,
            set_logger: set_logger_rx,
            set_processor: set_processor_rx,
            closing: closing.clone(),
            closed: closed.clone(),
            shared: Arc::clone(&shared),
            sender: Sender::new(
                transport,
                metadata,
                DEFAULT_PRE_CONTEXT,
                DEFAULT_POST_CONTEXT,
            ),
            flush_interval: options.flush_interval,
            max_transaction_queue_size: options.max_transaction_queue_size,
            max_error_queue_size: options.max_error_queue_size,
        };
        tokio::spawn(worker.run());

        Tracer {
            inner: Arc::new(Inner {
                transactions: transactions_tx,
                errors: errors_tx,
                force_flush: force_flush_tx,
                set_flush_interval: set_flush_interval_tx,
                set_max_transaction_queue_size: set_max_transaction_queue_size_tx,
                set_max_error_queue_size: set_max_error_queue_size_tx,
                set_pre_context: set_pre_context_tx,
                set_post_context: set_post_context_tx,
                set_context_setter: set_context_setter_tx,
                set_logger: set_logger_tx,
                set_processor: set_processor_tx,
                closing,
                closed,
                shared,
            }),
        }
    }

    /// Start a transaction, snapshotting the current span limit and
    /// sampling decision for its whole lifetime.
    pub fn start_transaction(
        &self,
        name: impl Into<String>,
        transaction_type: impl Into<String>,
    ) -> Transaction {
        let (max_spans, sampler) = {
            #[allow(clippy::expect_used)]
            let producer = self.inner.shared.producer.read().expect("lock poisoned");
            (producer.max_spans, producer.sampler.clone())
        };
        let mut transaction = self.inner.shared.transaction_pool.acquire();
        transaction.begin(name.into(), transaction_type.into(), max_spans, true);
        if let Some(sampler) = sampler {
            if !sampler.sample(&transaction) {
                transaction.set_sampled(false);
            }
        }
        transaction
    }

    /// Create an error record.
    pub fn new_error(
        &self,
        message: impl Into<String>,
        error_type: impl Into<String>,
    ) -> ErrorEvent {
        let mut event = self.inner.shared.error_pool.acquire();
        event.begin(message.into(), error_type.into());
        event
    }

    /// Hand a finished transaction to the worker. Best effort and
    /// non-blocking: if the channel is full or the tracer is closed, the
    /// transaction is discarded and `transactions_dropped` incremented.
    pub fn submit_transaction(&self, transaction: Transaction) {
        if self.inner.transactions.try_send(transaction).is_err() {
            #[allow(clippy::expect_used)]
            let mut stats = self.inner.shared.stats.lock().expect("lock poisoned");
            stats.transactions_dropped += 1;
        }
    }

    /// Hand an error record to the worker, with the same best-effort
    /// contract as [`submit_transaction`](Tracer::submit_transaction).
    pub fn submit_error(&self, event: ErrorEvent) {
        if self.inner.errors.try_send(event).is_err() {
            #[allow(clippy::expect_used)]
            let mut stats = self.inner.shared.stats.lock().expect("lock poisoned");
            stats.errors_dropped += 1;
        }
    }

    /// Wait until everything queued before this call has been sent, or the
    /// tracer has closed. Concurrent flushes are serialized by the worker;
    /// cancel the returned future to stop waiting (the worker finishes its
    /// in-progress send either way).
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        tokio::select! {
            result = self.inner.force_flush.send(ack_tx) => {
                if result.is_ok() {
                    tokio::select! {
                        _ = ack_rx => {}
                        () = self.inner.closed.cancelled() => {}
                    }
                }
            }
            () = self.inner.closed.cancelled() => {}
        }
    }

    /// Shut the tracer down and wait for the worker to exit, cancelling
    /// any in-flight transport call. Idempotent; submissions after close
    /// are counted as dropped.
    pub async fn close(&self) {
        self.inner.closing.cancel();
        self.inner.closed.cancelled().await;
    }

    /// Set the period between automatic flushes.
    pub async fn set_flush_interval(&self, interval: Duration) {
        self.configure(&self.inner.set_flush_interval, interval).await;
    }

    /// Cap the in-memory transaction queue; the oldest transactions are
    /// evicted beyond it. Zero means unbounded.
    pub async fn set_max_transaction_queue_size(&self, size: usize) {
        self.configure(&self.inner.set_max_transaction_queue_size, size)
            .await;
    }

    /// Cap the in-memory error queue; new errors are rejected beyond it.
    /// Zero means unbounded.
    pub async fn set_max_error_queue_size(&self, size: usize) {
        self.configure(&self.inner.set_max_error_queue_size, size)
            .await;
    }

    /// Number of source lines captured before each frame location.
    pub async fn set_pre_context(&self, lines: usize) {
        self.configure(&self.inner.set_pre_context, lines).await;
    }

    /// Number of source lines captured after each frame location.
    pub async fn set_post_context(&self, lines: usize) {
        self.configure(&self.inner.set_post_context, lines).await;
    }

    /// Install or remove the stack-frame source-context setter.
    pub async fn set_context_setter(&self, setter: Option<Arc<dyn ContextSetter>>) {
        self.configure(&self.inner.set_context_setter, setter).await;
    }

    /// Install or remove the diagnostics logger.
    pub async fn set_logger(&self, logger: Option<Arc<dyn Logger>>) {
        self.configure(&self.inner.set_logger, logger).await;
    }

    /// Install or remove the pre-send processor.
    pub async fn set_processor(&self, processor: Option<Arc<dyn Processor>>) {
        self.configure(&self.inner.set_processor, processor).await;
    }

    /// Cap the number of spans per transaction. Takes effect for
    /// transactions started after the call; zero means unbounded.
    pub fn set_max_spans(&self, max_spans: usize) {
        #[allow(clippy::expect_used)]
        let mut producer = self.inner.shared.producer.write().expect("lock poisoned");
        producer.max_spans = max_spans;
    }

    /// Install or remove the sampler. Takes effect for transactions
    /// started after the call; `None` samples everything.
    pub fn set_sampler(&self, sampler: Option<Arc<dyn Sampler>>) {
        #[allow(clippy::expect_used)]
        let mut producer = self.inner.shared.producer.write().expect("lock poisoned");
        producer.sampler = sampler;
    }

    /// Snapshot the tracer counters. Remains accurate after close.
    pub fn stats(&self) -> TracerStats {
        #[allow(clippy::expect_used)]
        let stats = self.inner.shared.stats.lock().expect("lock poisoned");
        *stats
    }

    /// Deliver a config value, or return immediately once the tracer is
    /// closing so setters never block across shutdown.
    async fn configure<T>(&self, channel: &mpsc::Sender<T>, value: T) {
        tokio::select! {
            _ = channel.send(value) => {}
            () = self.inner.closing.cancelled() => {}
        }
    }
}
