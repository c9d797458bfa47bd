// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub mod mocks;

use std::time::Duration;

/// Poll `condition` until it holds, panicking after ~10 seconds. The
/// sleeps also drive the clock forward under `start_paused` runtimes.
pub async fn wait_for(description: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {description}");
}

/// Give the worker a chance to process everything already enqueued.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
