//! Error types shared across the crate.
//!
//! Probe failures are data, not control flow: a [`ProbeError`] is attached to
//! the data point of the tick it happened in and the loop carries on. The
//! other error enums cover the collaborators around the core (configuration,
//! sensors, the session sink).

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::Timestamp;

/// Which external diagnostic produced a record or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// Multi-network scan listing (`iwlist <if> scan`).
    Scan,
    /// Single-interface association status (`iwconfig <if>`).
    LinkStatus,
    /// Round-trip latency (`ping`).
    Latency,
    /// Bulk throughput (`iperf3 -J`).
    Throughput,
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scan => write!(f, "scan"),
            Self::LinkStatus => write!(f, "link_status"),
            Self::Latency => write!(f, "latency"),
            Self::Throughput => write!(f, "throughput"),
        }
    }
}

/// Failure classes for a single probe.
///
/// Grammar mismatches are not listed here: they degrade to a record with
/// unset fields instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    /// The tool could not be spawned or exited without usable output.
    InvocationError,
    /// The tool did not finish within its time budget.
    Timeout,
    /// The tool produced a structured payload that was not well-formed.
    DecodeError,
}

impl fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvocationError => write!(f, "invocation_error"),
            Self::Timeout => write!(f, "timeout"),
            Self::DecodeError => write!(f, "decode_error"),
        }
    }
}

/// Error marker attached to a tick's data point in place of a probe record.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{probe} probe against {target} failed ({kind}): {message}")]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub probe: ProbeKind,
    /// Host, server, or interface the probe was aimed at.
    pub target: String,
    /// Raw failure text from the tool, or a description of what went wrong.
    pub message: String,
    pub timestamp: Timestamp,
}

impl ProbeError {
    pub fn new(
        kind: ProbeErrorKind,
        probe: ProbeKind,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            probe,
            target: target.into(),
            message: message.into(),
            timestamp: Timestamp::now(),
        }
    }

    pub fn invocation(
        probe: ProbeKind,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ProbeErrorKind::InvocationError, probe, target, message)
    }

    pub fn timeout(
        probe: ProbeKind,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ProbeErrorKind::Timeout, probe, target, message)
    }

    pub fn decode(probe: ProbeKind, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::DecodeError, probe, target, message)
    }
}

/// Errors from the sensor collaborator.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to start sensor helper `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sensor helper exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("sensor helper did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("sensor helper printed an unreadable snapshot: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read sensor helper output: {0}")]
    Io(#[from] std::io::Error),

    #[error("sensor misconfigured: {0}")]
    Config(String),
}

/// Errors loading or validating [`MonitorConfig`](crate::config::MonitorConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors writing a recording session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write CSV row: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}
