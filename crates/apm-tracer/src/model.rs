// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire-level payload types handed to the transport.
//!
//! These are plain serde structs; how they end up on the wire (JSON body,
//! compression, intake routing) is the transport's concern.

use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::stacktrace::Frame;

/// Identity of the monitored service, attached to every payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub agent: Agent,
}

/// The reporting agent itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Agent {
    pub name: String,
    pub version: String,
}

impl Agent {
    pub(crate) fn current() -> Self {
        Agent {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The reporting OS process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Process {
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub argv: Vec<String>,
}

impl Process {
    pub(crate) fn current() -> Self {
        let argv: Vec<String> = std::env::args().collect();
        Process {
            pid: std::process::id(),
            title: argv.first().cloned(),
            argv,
        }
    }
}

/// The reporting host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct System {
    pub architecture: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl System {
    pub(crate) fn current() -> Self {
        System {
            architecture: std::env::consts::ARCH.to_string(),
            platform: std::env::consts::OS.to_string(),
            hostname: std::env::var("HOSTNAME").ok(),
        }
    }
}

/// Service, process and system identity bundled for the sender.
#[derive(Debug, Clone)]
pub(crate) struct Metadata {
    pub(crate) service: Service,
    pub(crate) process: Process,
    pub(crate) system: System,
}

/// A batch of transactions, as delivered to
/// [`Transport::send_transactions`](crate::Transport::send_transactions).
#[derive(Debug, Clone, Serialize)]
pub struct TransactionsPayload {
    pub service: Service,
    pub process: Process,
    pub system: System,
    pub transactions: Vec<TransactionData>,
}

/// A batch of errors, as delivered to
/// [`Transport::send_errors`](crate::Transport::send_errors).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorsPayload {
    pub service: Service,
    pub process: Process,
    pub system: System,
    pub errors: Vec<ErrorData>,
}

/// Serialized form of a transaction record.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionData {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub transaction_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub result: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Milliseconds.
    pub duration: f64,
    pub sampled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextData>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub spans: Vec<SpanData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_count: Option<SpanCountData>,
}

/// Serialized form of a span.
#[derive(Debug, Clone, Serialize)]
pub struct SpanData {
    pub name: String,
    #[serde(rename = "type")]
    pub span_type: String,
    /// Offset from the transaction start, in milliseconds.
    pub start: f64,
    /// Milliseconds.
    pub duration: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stacktrace: Vec<Frame>,
}

/// Count of spans dropped past the per-transaction limit.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SpanCountData {
    pub dropped: SpanDroppedCount,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SpanDroppedCount {
    pub total: u64,
}

/// Serialized form of an error record.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorData {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub culprit: String,
    pub exception: ExceptionData,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stacktrace: Vec<Frame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionReference>,
}

/// Exception detail carried by an error record.
#[derive(Debug, Clone, Serialize)]
pub struct ExceptionData {
    pub message: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub exception_type: String,
    pub handled: bool,
}

/// Link from an error to the transaction it occurred in.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TransactionReference {
    pub id: Uuid,
}

/// Materialized context bag: tags, user identity, custom values.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextData {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserData>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, serde_json::Value>,
}

/// User identity attached to a context bag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

pub(crate) fn duration_ms(duration: std::time::Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_data_shape() {
        let data = TransactionData {
            id: Uuid::nil(),
            name: "GET /".to_string(),
            transaction_type: "request".to_string(),
            result: String::new(),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            duration: 42.5,
            sampled: true,
            context: None,
            spans: Vec::new(),
            span_count: None,
        };
        #[allow(clippy::unwrap_used)]
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["type"], "request");
        assert_eq!(json["duration"], 42.5);
        assert_eq!(json["timestamp"], "1970-01-01T00:00:00Z");
        // Optional sections are omitted, not null.
        assert!(json.get("result").is_none());
        assert!(json.get("context").is_none());
        assert!(json.get("spans").is_none());
    }

    #[test]
    fn test_error_data_shape() {
        let data = ErrorData {
            id: Uuid::nil(),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            culprit: "handler".to_string(),
            exception: ExceptionData {
                message: "boom".to_string(),
                exception_type: "io".to_string(),
                handled: false,
            },
            stacktrace: Vec::new(),
            context: None,
            transaction: Some(TransactionReference { id: Uuid::nil() }),
        };
        #[allow(clippy::unwrap_used)]
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["exception"]["type"], "io");
        assert_eq!(json["exception"]["handled"], false);
        assert_eq!(
            json["transaction"]["id"],
            "00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_duration_ms() {
        assert_eq!(duration_ms(std::time::Duration::from_millis(1500)), 1500.0);
    }
}
