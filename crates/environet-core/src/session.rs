//! Session recording for monitor runs.
//!
//! Records every tick's data point and every escalated scan batch, so a run
//! can be analysed offline to see how the room affected the link.
//!
//! # Storage Format
//!
//! Each session is a directory containing:
//! - `session.json`: metadata (interface, timing, machine info, tags)
//! - `datapoints.csv`: one consolidated row per data point
//! - `datapoints.jsonl`: the full data points, one JSON object per line
//! - `scan-NNNN.csv`: one file per escalated scan batch

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datapoint::{CONSOLIDATED_HEADER, CorrelatedDataPoint, write_scan_csv};
use crate::error::SessionError;
use crate::record::WirelessNetworkRecord;
use crate::time::Timestamp;

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// Destination for the monitor's output.
///
/// Errors are reported to the caller, which logs them and keeps going; a
/// sink must stay usable after a failed write.
pub trait DataSink: Send + 'static {
    fn record_point(&mut self, point: &CorrelatedDataPoint) -> Result<(), SessionError>;

    fn record_scan(
        &mut self,
        timestamp: Timestamp,
        networks: &[WirelessNetworkRecord],
    ) -> Result<(), SessionError>;
}

/// Keeps everything in memory. Useful for tests and one-shot commands.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub points: Vec<CorrelatedDataPoint>,
    pub scans: Vec<(Timestamp, Vec<WirelessNetworkRecord>)>,
}

impl DataSink for MemorySink {
    fn record_point(&mut self, point: &CorrelatedDataPoint) -> Result<(), SessionError> {
        self.points.push(point.clone());
        Ok(())
    }

    fn record_scan(
        &mut self,
        timestamp: Timestamp,
        networks: &[WirelessNetworkRecord],
    ) -> Result<(), SessionError> {
        self.scans.push((timestamp, networks.to_vec()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Machine info
// ---------------------------------------------------------------------------

/// Machine information captured at session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineInfo {
    pub os: String,
    pub arch: String,
    pub hostname: String,
    pub cores: usize,
}

/// Detect machine information (best-effort).
pub fn detect_machine_info() -> MachineInfo {
    let os = match os_version() {
        Some(v) => format!("{} {}", std::env::consts::OS, v),
        None => std::env::consts::OS.to_string(),
    };
    let hostname = fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    MachineInfo {
        os,
        arch: std::env::consts::ARCH.to_string(),
        hostname,
        cores,
    }
}

fn os_version() -> Option<String> {
    fs::read_to_string("/etc/os-release").ok().and_then(|s| {
        s.lines()
            .find(|l| l.starts_with("PRETTY_NAME="))
            .map(|l| l.trim_start_matches("PRETTY_NAME=").trim_matches('"').to_string())
    })
}

// ---------------------------------------------------------------------------
// Session metadata (session.json)
// ---------------------------------------------------------------------------

/// Session metadata written to session.json at the end of recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub version: u32,
    pub id: String,
    pub started_at: Timestamp,
    pub ended_at: Timestamp,
    pub duration_ms: u64,
    pub interface: String,
    pub sensor: String,
    pub scan_interval_secs: u64,
    pub total_points: u64,
    pub escalated_points: u64,
    pub scan_batches: u64,
    pub networks_seen: u64,
    pub machine: MachineInfo,
    pub tags: BTreeMap<String, String>,
    pub note: Option<String>,
    pub environet_version: String,
}

// ---------------------------------------------------------------------------
// Session config
// ---------------------------------------------------------------------------

/// Configuration for a recording session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub interface: String,
    pub sensor: String,
    pub scan_interval: Duration,
    pub output_dir: PathBuf,
    pub tags: BTreeMap<String, String>,
    pub note: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interface: "wlan0".to_string(),
            sensor: "simulated".to_string(),
            scan_interval: Duration::from_secs(60),
            output_dir: PathBuf::from("logs"),
            tags: BTreeMap::new(),
            note: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Session writer
// ---------------------------------------------------------------------------

/// Handles incremental file I/O for a recording session.
pub struct SessionWriter {
    session_dir: PathBuf,
    csv_writer: csv::Writer<File>,
    jsonl_writer: BufWriter<File>,
    total_points: u64,
    escalated_points: u64,
    scan_batches: u64,
    networks_seen: u64,
    started_at: Timestamp,
    started_instant: Instant,
    session_id: String,
    config: SessionConfig,
    machine: MachineInfo,
}

impl SessionWriter {
    /// Create a new session writer, creating the session directory and files.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let machine = detect_machine_info();
        let session_id = Uuid::new_v4().to_string();
        let started_at = Timestamp::now();

        // {timestamp}-{interface}
        let dir_name = format!("{}-{}", started_at.to_compact(), config.interface);
        let session_dir = config.output_dir.join(&dir_name);
        fs::create_dir_all(&session_dir)?;

        // Header is written explicitly so an empty session still has one.
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(session_dir.join("datapoints.csv"))?;
        csv_writer.write_record(CONSOLIDATED_HEADER)?;
        csv_writer.flush()?;

        let jsonl_writer = BufWriter::new(File::create(session_dir.join("datapoints.jsonl"))?);

        Ok(Self {
            session_dir,
            csv_writer,
            jsonl_writer,
            total_points: 0,
            escalated_points: 0,
            scan_batches: 0,
            networks_seen: 0,
            started_at,
            started_instant: Instant::now(),
            session_id,
            config,
            machine,
        })
    }

    /// Finalize the session, writing session.json. Call this on graceful shutdown.
    pub fn finish(mut self) -> Result<PathBuf, SessionError> {
        self.csv_writer.flush()?;
        self.jsonl_writer.flush()?;

        let meta = SessionMeta {
            version: 1,
            id: self.session_id,
            started_at: self.started_at,
            ended_at: Timestamp::now(),
            duration_ms: self.started_instant.elapsed().as_millis() as u64,
            interface: self.config.interface.clone(),
            sensor: self.config.sensor.clone(),
            scan_interval_secs: self.config.scan_interval.as_secs(),
            total_points: self.total_points,
            escalated_points: self.escalated_points,
            scan_batches: self.scan_batches,
            networks_seen: self.networks_seen,
            machine: self.machine,
            tags: self.config.tags.clone(),
            note: self.config.note.clone(),
            environet_version: crate::VERSION.to_string(),
        };

        let json = serde_json::to_string_pretty(&meta)?;
        fs::write(self.session_dir.join("session.json"), json)?;

        Ok(self.session_dir)
    }

    /// Get the session directory path.
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Get total data points recorded so far.
    pub fn total_points(&self) -> u64 {
        self.total_points
    }

    /// Get elapsed time since recording started.
    pub fn elapsed(&self) -> Duration {
        self.started_instant.elapsed()
    }
}

impl DataSink for SessionWriter {
    fn record_point(&mut self, point: &CorrelatedDataPoint) -> Result<(), SessionError> {
        self.csv_writer.serialize(point.to_row())?;
        self.csv_writer.flush()?;

        serde_json::to_writer(&mut self.jsonl_writer, point)?;
        self.jsonl_writer.write_all(b"\n")?;
        self.jsonl_writer.flush()?;

        self.total_points += 1;
        if point.escalated {
            self.escalated_points += 1;
        }
        Ok(())
    }

    fn record_scan(
        &mut self,
        timestamp: Timestamp,
        networks: &[WirelessNetworkRecord],
    ) -> Result<(), SessionError> {
        self.scan_batches += 1;
        let path = self
            .session_dir
            .join(format!("scan-{:04}.csv", self.scan_batches));
        write_scan_csv(File::create(path)?, timestamp, networks)?;
        self.networks_seen += networks.len() as u64;
        Ok(())
    }
}

/// Load metadata of a finished session.
pub fn load_session_meta(session_dir: &Path) -> Result<SessionMeta, SessionError> {
    let text = fs::read_to_string(session_dir.join("session.json"))?;
    Ok(serde_json::from_str(&text)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
