// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pre-send record mutation hook.

use crate::model::{ErrorData, TransactionData};

/// Invoked once per record immediately before serialization, on every send
/// attempt. Mutations are included in the transmitted payload.
///
/// Processors are expected not to fail; a panicking processor takes the
/// worker down with it.
pub trait Processor: Send + Sync {
    fn process_transaction(&self, _transaction: &mut TransactionData) {}
    fn process_error(&self, _error: &mut ErrorData) {}
}
