// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Transaction sampling.

use rand::Rng;

use crate::transaction::Transaction;

/// Decides whether a transaction's details (spans, context) are
/// transmitted. Unsampled transactions are still sent, but stripped down
/// to their timing envelope.
///
/// With no sampler installed, every transaction is sampled.
pub trait Sampler: Send + Sync {
    fn sample(&self, transaction: &Transaction) -> bool;
}

/// Samples a fixed ratio of transactions, chosen uniformly at random.
#[derive(Debug, Clone, Copy)]
pub struct RatioSampler {
    ratio: f64,
}

impl RatioSampler {
    /// Create a sampler keeping `ratio` of transactions. The ratio is
    /// clamped to `0.0..=1.0`.
    pub fn new(ratio: f64) -> Self {
        RatioSampler {
            ratio: ratio.clamp(0.0, 1.0),
        }
    }
}

impl Sampler for RatioSampler {
    fn sample(&self, _transaction: &Transaction) -> bool {
        rand::thread_rng().gen::<f64>() < self.ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_bounds() {
        let all = RatioSampler::new(1.0);
        let none = RatioSampler::new(0.0);
        let transaction = Transaction::default();
        for _ in 0..100 {
            assert!(all.sample(&transaction));
            assert!(!none.sample(&transaction));
        }
    }

    #[test]
    fn test_ratio_is_clamped() {
        assert!(RatioSampler::new(7.5).ratio <= 1.0);
        assert!(RatioSampler::new(-1.0).ratio >= 0.0);
    }
}
