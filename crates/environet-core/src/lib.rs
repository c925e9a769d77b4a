//! # environet-core
//!
//! **Watch how the room changes your WiFi.**
//!
//! `environet-core` turns the text printed by wireless diagnostic tools
//! (`iwlist`, `iwconfig`, `ping`, `iperf3`) into typed records, and
//! correlates them with environmental sensor readings. When a sensor flag
//! fires (someone walks past, a door closes) the monitor escalates from
//! cheap per-tick sampling to a full diagnostic battery.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use environet_core::{
//!     CommandProbeRunner, MemorySink, MonitorConfig, SimulatedSensor, TelemetryCorrelator,
//! };
//!
//! # async fn demo() {
//! let config = MonitorConfig::default();
//! let monitor = TelemetryCorrelator::new(
//!     config,
//!     Arc::new(CommandProbeRunner::new()),
//!     Arc::new(SimulatedSensor::new()),
//!     MemorySink::default(),
//! );
//! let handle = monitor.spawn();
//! // ... later
//! let sink = handle.stop().await.unwrap();
//! println!("{} data points", sink.points.len());
//! # }
//! ```
//!
//! ## Architecture
//!
//! Tool output → Parser → Record → Correlator (one tick) → DataSink
//!
//! Parsers never panic: unrecognised text yields records with unset fields,
//! and failed invocations yield a [`ProbeError`] that travels inside the
//! tick's [`CorrelatedDataPoint`].

pub mod config;
pub mod correlator;
pub mod datapoint;
pub mod diagnostics;
pub mod error;
pub mod parse;
pub mod probe;
pub mod record;
pub mod sensor;
pub mod session;
pub mod time;

pub use config::{MonitorConfig, SensorConfig};
pub use correlator::{CorrelatorStatus, MonitorHandle, TelemetryCorrelator, TickReport};
pub use datapoint::{
    ConsolidatedRow, CorrelatedDataPoint, LatencySample, NetworkRow, NetworkSnapshot,
    read_scan_csv, write_scan_csv,
};
pub use diagnostics::NetworkDiagnostics;
pub use error::{ConfigError, ProbeError, ProbeErrorKind, ProbeKind, SensorError, SessionError};
pub use parse::{
    ScanOutcome, parse_latency, parse_link_status, parse_scan_output, parse_scan_probe,
    parse_throughput,
};
pub use probe::{
    CommandProbeRunner, ProbeCommand, ProbeOutput, ProbeRunner, ProbeStatus, run_with_timeout,
};
pub use record::{
    Direction, Encryption, LatencyStatistics, LinkStatus, ThroughputResult, WirelessNetworkRecord,
};
pub use sensor::{
    LiveSensor, SensorSnapshot, SensorSource, SensorValue, SimulatedSensor, sensor_from_config,
};
pub use session::{DataSink, MemorySink, SessionConfig, SessionMeta, SessionWriter};
pub use time::Timestamp;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
