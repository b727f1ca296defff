// SPDX-License-Identifier: MIT

//! Shared error taxonomy (§3, §7) and the config validation error type.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error kind taxonomy shared by the classifier, the retry engine, and every
/// public operation's structured error (§7).
///
/// Marked non-exhaustive: collaborators match on known kinds without the
/// crate breaking semver on additions, mirroring the teacher's tagged DTOs
/// (`StepStatusKind`) that separate the exhaustively-matched internal enum
/// from the wire-stable external one.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Process,
    Auth,
    Resource,
    Timeout,
    Validation,
    Internal,
    Config,
    Dependency,
    Quota,
    Unknown,
}

crate::simple_display! {
    ErrorKind {
        Network => "network",
        Process => "process",
        Auth => "auth",
        Resource => "resource",
        Timeout => "timeout",
        Validation => "validation",
        Internal => "internal",
        Config => "config",
        Dependency => "dependency",
        Quota => "quota",
        Unknown => "unknown",
    }
}

/// Severity tier assigned by the classifier (§3 ErrorClass, §4.9.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    Fatal,
}

crate::simple_display! {
    Severity {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
        Fatal => "fatal",
    }
}

/// The structured error every public operation returns on failure (§7):
/// `{kind, message, retry-after?, underlying}`.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FleetError {
    pub kind: ErrorKind,
    pub message: String,
    pub retry_after: Option<Duration>,
    #[source]
    pub underlying: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FleetError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), retry_after: None, underlying: None }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.underlying = Some(Box::new(cause));
        self
    }
}

/// Configuration/validation errors (§6): every `*Config::validate()` /
/// `try_new()` constructor returns this on an out-of-range or missing field.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be in range {range}, got {value}")]
    OutOfRange { field: &'static str, range: &'static str, value: String },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn out_of_range(field: &'static str, range: &'static str, value: impl std::fmt::Display) -> Self {
        Self::OutOfRange { field, range, value: value.to_string() }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { field, reason: reason.into() }
    }
}
