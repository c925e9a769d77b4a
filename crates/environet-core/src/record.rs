//! Typed records produced by the probe parsers.
//!
//! Every record is immutable once built. Optional fields stay `None` when the
//! tool output did not contain them; nothing here fabricates a zero reading.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder name for a scan cell that reported an address but no SSID.
pub const UNKNOWN_SSID: &str = "Unknown";

/// Placeholder BSSID for a scan cell whose address line was missing.
pub const UNKNOWN_BSSID: &str = "00:00:00:00:00:00";

/// Encryption capability advertised by a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encryption {
    Open,
    Encrypted,
    #[default]
    Unknown,
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Encrypted => write!(f, "encrypted"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One network seen in a scan listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirelessNetworkRecord {
    pub ssid: String,
    /// MAC-style identifier, `AA:BB:CC:DD:EE:FF`.
    pub bssid: String,
    pub signal_strength_dbm: i32,
    pub channel: u32,
    /// Carrier frequency as printed by the tool, e.g. `"2.412 GHz"`.
    pub frequency: String,
    pub encryption: Encryption,
}

/// Association status of the monitored interface.
///
/// Produced only when the interface is associated; "not associated" is
/// represented by the absence of a `LinkStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub ssid: String,
    pub signal_strength_dbm: Option<i32>,
    /// Negotiated bit rate as printed by the tool, e.g. `"72.2 Mb/s"`.
    pub bit_rate: Option<String>,
}

/// Round-trip statistics from one latency probe.
///
/// All fields are independently optional: a total-loss run reports
/// `packet_loss_percent` with no timing line.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatencyStatistics {
    pub min_ms: Option<f64>,
    pub avg_ms: Option<f64>,
    pub max_ms: Option<f64>,
    /// Mean deviation, used as the jitter figure.
    pub mdev_ms: Option<f64>,
    pub packet_loss_percent: Option<f64>,
}

impl LatencyStatistics {
    /// True when neither the timing line nor the loss line was found.
    pub fn is_empty(&self) -> bool {
        self.min_ms.is_none()
            && self.avg_ms.is_none()
            && self.max_ms.is_none()
            && self.mdev_ms.is_none()
            && self.packet_loss_percent.is_none()
    }
}

/// Direction of a throughput test, from the monitored host's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Download,
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => write!(f, "download"),
            Self::Upload => write!(f, "upload"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "download" | "down" | "dl" => Ok(Self::Download),
            "upload" | "up" | "ul" => Ok(Self::Upload),
            other => Err(format!("unknown direction '{other}' (expected download|upload)")),
        }
    }
}

/// Result of one throughput test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThroughputResult {
    pub direction: Direction,
    /// Decimal megabits per second (bits per second / 1,000,000).
    pub bitrate_mbps: f64,
    pub bytes_transferred: u64,
    pub duration_seconds: f64,
}
