//! Multi-network scan listings (`iwlist <if> scan`).
//!
//! The listing is a sequence of `Cell NN - Address: ...` blocks. Lines are
//! consumed in a single forward pass; a new `Cell` line flushes the block
//! being accumulated.

use std::sync::OnceLock;

use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::cached;
use crate::error::{ProbeError, ProbeKind};
use crate::probe::ProbeOutput;
use crate::record::{Encryption, UNKNOWN_BSSID, UNKNOWN_SSID, WirelessNetworkRecord};

fn address_re() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached(&PATTERN, r"Address:\s*([0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5})")
}

fn essid_re() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached(&PATTERN, r#"^ESSID:"(.*)"$"#)
}

fn signal_re() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached(&PATTERN, r"Signal level[=:]\s*(-?\d+)\s*dBm")
}

fn frequency_re() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached(&PATTERN, r"^Frequency[=:]\s*([0-9.]+)\s*GHz")
}

fn paren_channel_re() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached(&PATTERN, r"\(Channel\s+(\d+)\)")
}

fn channel_line_re() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached(&PATTERN, r"^Channel[=:]\s*(\d+)")
}

fn encryption_re() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached(&PATTERN, r"^Encryption key:\s*(on|off)")
}

/// Fields collected for one `Cell` block before it is emitted.
#[derive(Default)]
struct CellBlock {
    bssid: Option<String>,
    ssid: Option<String>,
    signal: Option<i32>,
    channel: Option<u32>,
    frequency: Option<String>,
    encryption: Option<Encryption>,
}

impl CellBlock {
    /// Read at most one field from `line`, chosen by its leading keyword.
    fn absorb(&mut self, line: &str) {
        if line.starts_with("Cell") || line.starts_with("Address:") {
            if let Some(c) = address_re().captures(line) {
                self.bssid = Some(c[1].to_ascii_uppercase());
            }
        } else if line.starts_with("ESSID:") {
            if let Some(c) = essid_re().captures(line) {
                // An empty quoted name is a hidden network.
                let name = &c[1];
                self.ssid = (!name.is_empty()).then(|| name.to_string());
            }
        } else if line.starts_with("Frequency") {
            if let Some(c) = frequency_re().captures(line) {
                self.frequency = Some(format!("{} GHz", &c[1]));
            }
            if let Some(c) = paren_channel_re().captures(line)
                && let Ok(v) = c[1].parse()
            {
                self.channel = Some(v);
            }
        } else if line.starts_with("Channel") {
            if let Some(c) = channel_line_re().captures(line)
                && let Ok(v) = c[1].parse()
            {
                self.channel = Some(v);
            }
        } else if line.starts_with("Quality") || line.starts_with("Signal level") {
            if let Some(c) = signal_re().captures(line)
                && let Ok(v) = c[1].parse()
            {
                self.signal = Some(v);
            }
        } else if line.starts_with("Encryption key") {
            if let Some(c) = encryption_re().captures(line) {
                self.encryption = Some(if &c[1] == "on" {
                    Encryption::Encrypted
                } else {
                    Encryption::Open
                });
            }
        }
    }

    /// Emit the block if it identified a network at all.
    fn flush(self) -> Option<WirelessNetworkRecord> {
        if self.bssid.is_none() && self.ssid.is_none() {
            return None;
        }
        Some(WirelessNetworkRecord {
            ssid: self.ssid.unwrap_or_else(|| UNKNOWN_SSID.to_string()),
            bssid: self.bssid.unwrap_or_else(|| UNKNOWN_BSSID.to_string()),
            signal_strength_dbm: self.signal.unwrap_or(0),
            channel: self.channel.unwrap_or(0),
            frequency: self.frequency.unwrap_or_default(),
            encryption: self.encryption.unwrap_or_default(),
        })
    }
}

/// Parse a scan listing into records, in input order.
///
/// Text before the first `Cell` line is ignored, as are lines that do not
/// start with a known field keyword. Each line sets at most one field; when
/// a field occurs twice in one block the last occurrence wins.
pub fn parse_scan_output(text: &str) -> Vec<WirelessNetworkRecord> {
    let mut networks = Vec::new();
    let mut current: Option<CellBlock> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("Cell ") || trimmed == "Cell" {
            if let Some(block) = current.take() {
                networks.extend(block.flush());
            }
            current = Some(CellBlock::default());
        }
        if let Some(block) = current.as_mut() {
            block.absorb(trimmed);
        }
    }
    if let Some(block) = current {
        networks.extend(block.flush());
    }
    networks
}

/// Result of one scan probe: the networks found plus the reason the listing
/// is empty, if the tool failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub networks: Vec<WirelessNetworkRecord>,
    pub error: Option<ProbeError>,
}

impl ScanOutcome {
    pub fn failed(error: ProbeError) -> Self {
        Self {
            networks: Vec::new(),
            error: Some(error),
        }
    }
}

/// Interpret a finished scan invocation against `interface`.
///
/// A non-zero exit or an empty listing yields no networks and an
/// invocation error carrying the tool's own failure text.
pub fn parse_scan_probe(output: &ProbeOutput, interface: &str) -> ScanOutcome {
    if !output.status.success() {
        let err = ProbeError::invocation(ProbeKind::Scan, interface, output.failure_text());
        warn!("{err}");
        return ScanOutcome::failed(err);
    }
    if output.stdout.trim().is_empty() {
        let err = ProbeError::invocation(ProbeKind::Scan, interface, "scan produced no output");
        warn!("{err}");
        return ScanOutcome::failed(err);
    }
    ScanOutcome {
        networks: parse_scan_output(&output.stdout),
        error: None,
    }
}
