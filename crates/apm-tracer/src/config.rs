// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Environment-driven tracer options.
//!
//! All knobs can also be changed at runtime through the `Tracer` setters;
//! the environment only supplies the initial values.

use std::env;
use std::time::Duration;

/// Default period between automatic flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);
/// Default cap on in-memory transactions; oldest are evicted beyond it.
pub const DEFAULT_MAX_TRANSACTION_QUEUE_SIZE: usize = 500;
/// Default cap on in-memory errors; newest are rejected beyond it.
pub const DEFAULT_MAX_ERROR_QUEUE_SIZE: usize = 1000;
/// Default per-transaction span cap.
pub const DEFAULT_MAX_SPANS: usize = 500;

pub(crate) const DEFAULT_PRE_CONTEXT: usize = 3;
pub(crate) const DEFAULT_POST_CONTEXT: usize = 3;

const ENV_SERVICE_NAME: &str = "APM_SERVICE_NAME";
const ENV_SERVICE_VERSION: &str = "APM_SERVICE_VERSION";
const ENV_ENVIRONMENT: &str = "APM_ENVIRONMENT";
const ENV_FLUSH_INTERVAL: &str = "APM_FLUSH_INTERVAL";
const ENV_MAX_QUEUE_SIZE: &str = "APM_MAX_QUEUE_SIZE";
const ENV_MAX_ERROR_QUEUE_SIZE: &str = "APM_MAX_ERROR_QUEUE_SIZE";
const ENV_MAX_SPANS: &str = "APM_TRANSACTION_MAX_SPANS";
const ENV_SAMPLE_RATE: &str = "APM_TRANSACTION_SAMPLE_RATE";

/// Errors raised while reading options from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {name}={value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("no service name specified, and {ENV_SERVICE_NAME} is not set")]
    MissingServiceName,
}

/// Initial tracer configuration. Zero or non-positive sizes mean
/// unbounded; a sample rate of 1.0 samples everything.
#[derive(Debug, Clone, PartialEq)]
pub struct TracerOptions {
    pub flush_interval: Duration,
    pub max_transaction_queue_size: usize,
    pub max_error_queue_size: usize,
    pub max_spans: usize,
    pub sample_rate: f64,
}

impl Default for TracerOptions {
    fn default() -> Self {
        TracerOptions {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_transaction_queue_size: DEFAULT_MAX_TRANSACTION_QUEUE_SIZE,
            max_error_queue_size: DEFAULT_MAX_ERROR_QUEUE_SIZE,
            max_spans: DEFAULT_MAX_SPANS,
            sample_rate: 1.0,
        }
    }
}

impl TracerOptions {
    /// Read options from the environment, failing on the first invalid
    /// value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let (options, errors) = Self::read_env();
        match errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(options),
        }
    }

    /// Read options from the environment, substituting defaults for
    /// invalid values. Each failure is logged and otherwise ignored.
    pub fn from_env_lenient() -> Self {
        let (options, errors) = Self::read_env();
        for error in errors {
            tracing::warn!("ignoring invalid tracer option: {error}");
        }
        options
    }

    fn read_env() -> (Self, Vec<ConfigError>) {
        let mut options = TracerOptions::default();
        let mut errors = Vec::new();

        match read_parsed(ENV_FLUSH_INTERVAL, parse_duration) {
            Ok(Some(value)) => options.flush_interval = value,
            Ok(None) => {}
            Err(error) => errors.push(error),
        }
        match read_parsed(ENV_MAX_QUEUE_SIZE, parse_size) {
            Ok(Some(value)) => options.max_transaction_queue_size = value,
            Ok(None) => {}
            Err(error) => errors.push(error),
        }
        match read_parsed(ENV_MAX_ERROR_QUEUE_SIZE, parse_size) {
            Ok(Some(value)) => options.max_error_queue_size = value,
            Ok(None) => {}
            Err(error) => errors.push(error),
        }
        match read_parsed(ENV_MAX_SPANS, parse_size) {
            Ok(Some(value)) => options.max_spans = value,
            Ok(None) => {}
            Err(error) => errors.push(error),
        }
        match read_parsed(ENV_SAMPLE_RATE, parse_ratio) {
            Ok(Some(value)) => options.sample_rate = value,
            Ok(None) => {}
            Err(error) => errors.push(error),
        }

        (options, errors)
    }
}

pub(crate) fn service_name_from_env() -> Option<String> {
    env::var(ENV_SERVICE_NAME).ok().filter(|s| !s.is_empty())
}

pub(crate) fn service_version_from_env() -> Option<String> {
    env::var(ENV_SERVICE_VERSION).ok().filter(|s| !s.is_empty())
}

pub(crate) fn environment_from_env() -> Option<String> {
    env::var(ENV_ENVIRONMENT).ok().filter(|s| !s.is_empty())
}

fn read_parsed<T>(
    name: &'static str,
    parse: fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => parse(&raw).map(Some).map_err(|reason| ConfigError::Invalid {
            name,
            value: raw,
            reason,
        }),
        Err(_) => Ok(None),
    }
}

/// Parse a duration with an `ms`, `s` or `m` suffix; a bare number means
/// seconds.
fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let (number, scale_ms) = if let Some(number) = raw.strip_suffix("ms") {
        (number, 1u64)
    } else if let Some(number) = raw.strip_suffix('s') {
        (number, 1_000)
    } else if let Some(number) = raw.strip_suffix('m') {
        (number, 60_000)
    } else {
        (raw, 1_000)
    };
    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| "expected a duration such as 500ms, 10s or 1m".to_string())?;
    Ok(Duration::from_millis(value * scale_ms))
}

/// Parse a queue or span cap; non-positive values mean unbounded.
fn parse_size(raw: &str) -> Result<usize, String> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| "expected an integer".to_string())?;
    Ok(if value <= 0 { 0 } else { value as usize })
}

fn parse_ratio(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| "expected a number between 0 and 1".to_string())?;
    if !(0.0..=1.0).contains(&value) {
        return Err("expected a number between 0 and 1".to_string());
    }
    Ok(value)
}
