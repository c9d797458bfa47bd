// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded object pools for transaction and error records.
//!
//! Records cycle producer -> worker queue -> sender batch -> pool. A record
//! is released back to the pool only after its batch was transmitted or the
//! record was evicted from a full queue; `reset` must clear every field the
//! serializer reads so nothing leaks between reuses. Heap allocations such
//! as span vectors keep their capacity across reuses, which is what bounds
//! allocation under burst.

use std::sync::Mutex;

/// Implemented by records that can be recycled through a [`Pool`].
pub(crate) trait Recyclable {
    /// Clear all content while retaining allocated capacity.
    fn reset(&mut self);
}

pub(crate) struct Pool<T> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
}

impl<T: Default + Recyclable> Pool<T> {
    pub(crate) fn new(max_idle: usize) -> Self {
        Pool {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Take a reset record from the pool, or allocate a fresh one.
    pub(crate) fn acquire(&self) -> T {
        #[allow(clippy::expect_used)]
        let mut idle = self.idle.lock().expect("lock poisoned");
        idle.pop().unwrap_or_default()
    }

    /// Reset a record and return it to the pool. Records beyond the idle
    /// limit are dropped instead.
    pub(crate) fn release(&self, mut record: T) {
        record.reset();
        #[allow(clippy::expect_used)]
        let mut idle = self.idle.lock().expect("lock poisoned");
        if idle.len() < self.max_idle {
            idle.push(record);
        }
    }
}
