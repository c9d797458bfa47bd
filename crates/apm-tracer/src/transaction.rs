// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Transaction and span records.
//!
//! A transaction is created by the facade, mutated by exactly one producer
//! until submission, then owned by the worker until it is pooled again.
//! The span limit and sampling decision are snapshotted at start time and
//! hold for the transaction's whole lifetime, regardless of later
//! reconfiguration.

use std::io;
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::context::Context;
use crate::model::{
    duration_ms, SpanCountData, SpanData, SpanDroppedCount, TransactionData,
};
use crate::pool::Recyclable;
use crate::stacktrace::{ContextSetter, Frame};

/// Index of a span within its transaction, handed out by
/// [`Transaction::start_span`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanId(usize);

/// A root unit of monitored work.
#[derive(Debug)]
pub struct Transaction {
    pub(crate) id: Option<Uuid>,
    name: String,
    transaction_type: String,
    result: String,
    timestamp: OffsetDateTime,
    anchor: Option<Instant>,
    duration: Option<Duration>,
    sampled: bool,
    max_spans: usize,
    spans: Vec<Span>,
    /// Tags, user identity and custom values; serialized only when sampled.
    pub context: Context,
}

impl Default for Transaction {
    fn default() -> Self {
        Transaction {
            id: None,
            name: String::new(),
            transaction_type: String::new(),
            result: String::new(),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            anchor: None,
            duration: None,
            sampled: true,
            max_spans: 0,
            spans: Vec::new(),
            context: Context::default(),
        }
    }
}

impl Transaction {
    pub(crate) fn begin(
        &mut self,
        name: String,
        transaction_type: String,
        max_spans: usize,
        sampled: bool,
    ) {
        self.name = name;
        self.transaction_type = transaction_type;
        self.timestamp = OffsetDateTime::now_utc();
        self.anchor = Some(Instant::now());
        self.max_spans = max_spans;
        self.sampled = sampled;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transaction_type(&self) -> &str {
        &self.transaction_type
    }

    /// Whether this transaction's details will be transmitted.
    pub fn sampled(&self) -> bool {
        self.sampled
    }

    pub(crate) fn set_sampled(&mut self, sampled: bool) {
        self.sampled = sampled;
    }

    /// Set the transaction result, e.g. an HTTP status class.
    pub fn set_result(&mut self, result: impl Into<String>) {
        self.result = result.into();
    }

    /// Start a child span. Spans started past the limit in force at
    /// transaction start are retained but marked dropped and excluded from
    /// the payload.
    pub fn start_span(
        &mut self,
        name: impl Into<String>,
        span_type: impl Into<String>,
    ) -> SpanId {
        let dropped = self.max_spans > 0 && self.spans.len() >= self.max_spans;
        let start = self
            .anchor
            .map(|anchor| anchor.elapsed())
            .unwrap_or_default();
        self.spans.push(Span {
            name: name.into(),
            span_type: span_type.into(),
            start,
            duration: None,
            dropped,
            stacktrace: Vec::new(),
        });
        SpanId(self.spans.len() - 1)
    }

    /// Record the span's duration as the time elapsed since it started.
    pub fn end_span(&mut self, id: SpanId) {
        if let (Some(anchor), Some(span)) = (self.anchor, self.spans.get_mut(id.0)) {
            span.duration = Some(anchor.elapsed().saturating_sub(span.start));
        }
    }

    /// Attach a stack trace to a span.
    pub fn set_span_stacktrace(&mut self, id: SpanId, stacktrace: Vec<Frame>) {
        if let Some(span) = self.spans.get_mut(id.0) {
            span.stacktrace = stacktrace;
        }
    }

    pub fn is_span_dropped(&self, id: SpanId) -> bool {
        self.spans.get(id.0).is_some_and(|span| span.dropped)
    }

    /// Record the transaction's duration as the time elapsed since start.
    pub fn end(&mut self) {
        if let Some(anchor) = self.anchor {
            self.duration = Some(anchor.elapsed());
        }
    }

    /// Record an explicitly measured duration.
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = Some(duration);
    }

    /// The identifier, assigned at most once and otherwise deferred to
    /// send time.
    pub(crate) fn ensure_id(&mut self) -> Uuid {
        *self.id.get_or_insert_with(Uuid::new_v4)
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub(crate) fn apply_source_context(
        &mut self,
        setter: &dyn ContextSetter,
        pre: usize,
        post: usize,
    ) -> io::Result<()> {
        for span in self.spans.iter_mut().filter(|span| !span.dropped) {
            for frame in &mut span.stacktrace {
                setter.set_context(frame, pre, post)?;
            }
        }
        Ok(())
    }

    pub(crate) fn build_data(&mut self) -> TransactionData {
        let id = self.ensure_id();
        let dropped_total = self.spans.iter().filter(|span| span.dropped).count() as u64;
        let (context, spans, span_count) = if self.sampled {
            (
                self.context.build(),
                self.spans
                    .iter()
                    .filter(|span| !span.dropped)
                    .map(Span::build_data)
                    .collect(),
                (dropped_total > 0).then_some(SpanCountData {
                    dropped: SpanDroppedCount {
                        total: dropped_total,
                    },
                }),
            )
        } else {
            (None, Vec::new(), None)
        };
        TransactionData {
            id,
            name: self.name.clone(),
            transaction_type: self.transaction_type.clone(),
            result: self.result.clone(),
            timestamp: self.timestamp,
            duration: duration_ms(self.duration.unwrap_or_default()),
            sampled: self.sampled,
            context,
            spans,
            span_count,
        }
    }
}

impl Recyclable for Transaction {
    fn reset(&mut self) {
        self.id = None;
        self.name.clear();
        self.transaction_type.clear();
        self.result.clear();
        self.timestamp = OffsetDateTime::UNIX_EPOCH;
        self.anchor = None;
        self.duration = None;
        self.sampled = true;
        self.max_spans = 0;
        self.spans.clear();
        self.context.reset();
    }
}

/// A sub-operation within a transaction.
#[derive(Debug, Clone)]
struct Span {
    name: String,
    span_type: String,
    start: Duration,
    duration: Option<Duration>,
    dropped: bool,
    stacktrace: Vec<Frame>,
}

impl Span {
    fn build_data(&self) -> SpanData {
        SpanData {
            name: self.name.clone(),
            span_type: self.span_type.clone(),
            start: duration_ms(self.start),
            duration: duration_ms(self.duration.unwrap_or_default()),
            stacktrace: self.stacktrace.clone(),
        }
    }
}
