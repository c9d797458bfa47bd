// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-process APM agent core.
//!
//! The crate buffers transactions (units of work with child spans) and
//! errors produced by application code and forwards them to an intake
//! server through a pluggable [`Transport`]. A single worker task owns all
//! queue state and multiplexes producer ingress, timer-driven flushing,
//! runtime reconfiguration, backpressure, retry and graceful shutdown; the
//! [`Tracer`] facade marshals everything onto its channels.
//!
//! ```no_run
//! use std::sync::Arc;
//! use apm_tracer::{Tracer, transport::Discard};
//!
//! # async fn example() -> Result<(), apm_tracer::ConfigError> {
//! let tracer = Tracer::new("billing", "1.4.2", Arc::new(Discard))?;
//!
//! let mut transaction = tracer.start_transaction("GET /invoices", "request");
//! let span = transaction.start_span("SELECT FROM invoices", "db.sql");
//! transaction.end_span(span);
//! transaction.end();
//! tracer.submit_transaction(transaction);
//!
//! tracer.flush().await;
//! tracer.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod context;
mod error_event;
mod logger;
pub mod model;
mod pool;
mod processor;
mod sampler;
mod sender;
mod stacktrace;
mod stats;
mod tracer;
pub mod transport;
mod transaction;
mod worker;

pub use config::{ConfigError, TracerOptions};
pub use context::Context;
pub use error_event::ErrorEvent;
pub use logger::{Logger, TracingLogger};
pub use processor::Processor;
pub use sampler::{RatioSampler, Sampler};
pub use stacktrace::{ContextSetter, FileContextSetter, Frame};
pub use stats::{TracerStats, TracerStatsErrors};
pub use tracer::{Tracer, ERRORS_CHANNEL_CAP, TRANSACTIONS_CHANNEL_CAP};
pub use transaction::{SpanId, Transaction};
pub use transport::{Transport, TransportError};
