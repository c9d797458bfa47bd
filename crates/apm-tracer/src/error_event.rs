// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Captured error records.

use std::io;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::context::Context;
use crate::model::{ErrorData, ExceptionData, TransactionReference};
use crate::pool::Recyclable;
use crate::stacktrace::{ContextSetter, Frame};
use crate::transaction::Transaction;

/// A reported failure, independent of any transaction but optionally
/// carrying the id of the transaction it occurred in.
#[derive(Debug)]
pub struct ErrorEvent {
    id: Uuid,
    timestamp: OffsetDateTime,
    message: String,
    error_type: String,
    culprit: String,
    handled: bool,
    stacktrace: Vec<Frame>,
    transaction_id: Option<Uuid>,
    /// Tags, user identity and custom values.
    pub context: Context,
}

impl Default for ErrorEvent {
    fn default() -> Self {
        ErrorEvent {
            id: Uuid::nil(),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            message: String::new(),
            error_type: String::new(),
            culprit: String::new(),
            handled: false,
            stacktrace: Vec::new(),
            transaction_id: None,
            context: Context::default(),
        }
    }
}

impl ErrorEvent {
    pub(crate) fn begin(&mut self, message: String, error_type: String) {
        self.id = Uuid::new_v4();
        self.timestamp = OffsetDateTime::now_utc();
        self.message = message;
        self.error_type = error_type;
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Override the derived culprit.
    pub fn set_culprit(&mut self, culprit: impl Into<String>) {
        self.culprit = culprit.into();
    }

    /// Mark whether the originating error was handled by the application.
    pub fn set_handled(&mut self, handled: bool) {
        self.handled = handled;
    }

    pub fn set_stacktrace(&mut self, stacktrace: Vec<Frame>) {
        self.stacktrace = stacktrace;
    }

    /// Borrow the transaction's identity, forcing assignment of its
    /// deferred id. The transaction itself is left untouched otherwise.
    pub fn set_transaction(&mut self, transaction: &mut Transaction) {
        self.transaction_id = Some(transaction.ensure_id());
    }

    pub(crate) fn apply_source_context(
        &mut self,
        setter: &dyn ContextSetter,
        pre: usize,
        post: usize,
    ) -> io::Result<()> {
        for frame in &mut self.stacktrace {
            setter.set_context(frame, pre, post)?;
        }
        Ok(())
    }

    pub(crate) fn build_data(&self) -> ErrorData {
        let culprit = if self.culprit.is_empty() {
            // The topmost frame is the best guess at where it went wrong.
            self.stacktrace
                .first()
                .map(|frame| frame.function.clone())
                .unwrap_or_default()
        } else {
            self.culprit.clone()
        };
        ErrorData {
            id: self.id,
            timestamp: self.timestamp,
            culprit,
            exception: ExceptionData {
                message: self.message.clone(),
                exception_type: self.error_type.clone(),
                handled: self.handled,
            },
            stacktrace: self.stacktrace.clone(),
            context: self.context.build(),
            transaction: self.transaction_id.map(|id| TransactionReference { id }),
        }
    }
}

impl Recyclable for ErrorEvent {
    fn reset(&mut self) {
        self.id = Uuid::nil();
        self.timestamp = OffsetDateTime::UNIX_EPOCH;
        self.message.clear();
        self.error_type.clear();
        self.culprit.clear();
        self.handled = false;
        self.stacktrace.clear();
        self.transaction_id = None;
        self.context.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn begun(message: &str) -> ErrorEvent {
        let mut event = ErrorEvent::default();
        event.begin(message.to_string(), "io".to_string());
        event
    }

    #[test]
    fn test_culprit_derived_from_top_frame() {
        let mut event = begun("boom");
        event.set_stacktrace(vec![
            Frame::new("handler::run", "handler.rs", 10),
            Frame::new("main", "main.rs", 3),
        ]);
        assert_eq!(event.build_data().culprit, "handler::run");
    }

    #[test]
    fn test_explicit_culprit_wins() {
        let mut event = begun("boom");
        event.set_stacktrace(vec![Frame::new("handler::run", "handler.rs", 10)]);
        event.set_culprit("worker::spin");
        assert_eq!(event.build_data().culprit, "worker::spin");
    }

    #[test]
    fn test_transaction_reference_forces_id() {
        let mut transaction = Transaction::default();
        let mut event = begun("boom");
        event.set_transaction(&mut transaction);

        let transaction_id = transaction.id();
        assert!(transaction_id.is_some());
        assert_eq!(
            event.build_data().transaction.map(|t| t.id),
            transaction_id
        );
    }

    #[test]
    fn test_reset_clears_reference() {
        let mut transaction = Transaction::default();
        let mut event = begun("boom");
        event.set_transaction(&mut transaction);
        event.reset();
        let data = event.build_data();
        assert!(data.transaction.is_none());
        assert!(data.exception.message.is_empty());
        assert_eq!(data.id, Uuid::nil());
    }
}
