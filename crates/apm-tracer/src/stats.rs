// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process-wide tracer counters.
//!
//! All counters are monotonic. The worker accumulates a per-iteration delta
//! and commits it to the shared stats only when non-zero, so the hot path
//! never touches the lock.

/// Counters describing everything the tracer has sent or dropped since it
/// was created. Obtained via [`Tracer::stats`](crate::Tracer::stats); the
/// snapshot remains valid after the tracer is closed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TracerStats {
    /// Transactions successfully handed to the transport.
    pub transactions_sent: u64,
    /// Transactions discarded: channel overflow, queue eviction, or
    /// submission after close.
    pub transactions_dropped: u64,
    /// Errors successfully handed to the transport.
    pub errors_sent: u64,
    /// Errors discarded at the channel boundary or after close.
    pub errors_dropped: u64,
    /// Failure counters.
    pub errors: TracerStatsErrors,
}

/// Failure counters nested under [`TracerStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TracerStatsErrors {
    /// Failed transaction send attempts.
    pub send_transactions: u64,
    /// Failed error send attempts.
    pub send_errors: u64,
    /// Batches whose source-context enrichment was aborted.
    pub set_context: u64,
}

impl TracerStats {
    pub(crate) fn accumulate(&mut self, delta: TracerStats) {
        self.transactions_sent += delta.transactions_sent;
        self.transactions_dropped += delta.transactions_dropped;
        self.errors_sent += delta.errors_sent;
        self.errors_dropped += delta.errors_dropped;
        self.errors.send_transactions += delta.errors.send_transactions;
        self.errors.send_errors += delta.errors.send_errors;
        self.errors.set_context += delta.errors.set_context;
    }

    pub(crate) fn is_zero(&self) -> bool {
        *self == TracerStats::default()
    }
}
