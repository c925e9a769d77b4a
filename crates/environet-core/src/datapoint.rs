//! Consolidated per-tick data points and their flat row forms.
//!
//! A [`CorrelatedDataPoint`] is the full record of one tick. For
//! spreadsheets it is flattened into a [`ConsolidatedRow`]; scan batches are
//! flattened into [`NetworkRow`]s. Both go through the `csv` crate, so an
//! absent value becomes an empty field and quoting of SSIDs is handled.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, SessionError};
use crate::record::{
    Direction, Encryption, LatencyStatistics, LinkStatus, ThroughputResult, WirelessNetworkRecord,
};
use crate::sensor::SensorSnapshot;
use crate::time::Timestamp;

/// Latency statistics for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySample {
    pub target: String,
    pub stats: LatencyStatistics,
}

/// Network measurements taken during one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub link: Option<LinkStatus>,
    pub latency: Vec<LatencySample>,
    pub throughput: Vec<ThroughputResult>,
    /// Probes that produced no record this tick.
    pub errors: Vec<ProbeError>,
}

impl NetworkSnapshot {
    pub fn throughput_for(&self, direction: Direction) -> Option<&ThroughputResult> {
        self.throughput.iter().find(|t| t.direction == direction)
    }

    pub fn primary_latency(&self) -> Option<&LatencyStatistics> {
        self.latency.first().map(|s| &s.stats)
    }
}

/// Everything observed in one tick. Built once, then handed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedDataPoint {
    pub timestamp: Timestamp,
    pub sensor_snapshot: SensorSnapshot,
    pub network_snapshot: NetworkSnapshot,
    pub escalated: bool,
}

impl CorrelatedDataPoint {
    pub fn to_row(&self) -> ConsolidatedRow {
        let net = &self.network_snapshot;
        let latency = net.primary_latency();
        ConsolidatedRow {
            timestamp: self.timestamp.to_iso8601(),
            distance_cm: self.sensor_snapshot.distance_cm(),
            motion_detected: self.sensor_snapshot.motion_detected(),
            signal_strength_dbm: net.link.as_ref().and_then(|l| l.signal_strength_dbm),
            ssid: net.link.as_ref().map(|l| l.ssid.clone()),
            avg_latency_ms: latency.and_then(|l| l.avg_ms),
            packet_loss_percent: latency.and_then(|l| l.packet_loss_percent),
            download_mbps: net.throughput_for(Direction::Download).map(|t| t.bitrate_mbps),
            upload_mbps: net.throughput_for(Direction::Upload).map(|t| t.bitrate_mbps),
            escalated: self.escalated,
        }
    }
}

// ---------------------------------------------------------------------------
// Flat rows
// ---------------------------------------------------------------------------

/// Column order of `datapoints.csv`.
pub const CONSOLIDATED_HEADER: [&str; 10] = [
    "timestamp",
    "distance_cm",
    "motion_detected",
    "signal_strength_dbm",
    "ssid",
    "avg_latency_ms",
    "packet_loss_percent",
    "download_mbps",
    "upload_mbps",
    "escalated",
];

/// One line of `datapoints.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedRow {
    pub timestamp: String,
    pub distance_cm: Option<f64>,
    pub motion_detected: Option<bool>,
    pub signal_strength_dbm: Option<i32>,
    pub ssid: Option<String>,
    pub avg_latency_ms: Option<f64>,
    pub packet_loss_percent: Option<f64>,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub escalated: bool,
}

/// One line of a `scan-NNNN.csv` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRow {
    pub timestamp: String,
    pub ssid: String,
    pub bssid: String,
    pub signal_strength_dbm: i32,
    pub channel: u32,
    pub frequency: String,
    pub encryption: Encryption,
}

impl NetworkRow {
    pub fn new(timestamp: Timestamp, net: &WirelessNetworkRecord) -> Self {
        Self {
            timestamp: timestamp.to_iso8601(),
            ssid: net.ssid.clone(),
            bssid: net.bssid.clone(),
            signal_strength_dbm: net.signal_strength_dbm,
            channel: net.channel,
            frequency: net.frequency.clone(),
            encryption: net.encryption,
        }
    }

    pub fn into_record(self) -> WirelessNetworkRecord {
        WirelessNetworkRecord {
            ssid: self.ssid,
            bssid: self.bssid,
            signal_strength_dbm: self.signal_strength_dbm,
            channel: self.channel,
            frequency: self.frequency,
            encryption: self.encryption,
        }
    }
}

/// Write a scan batch as CSV with a header row.
pub fn write_scan_csv<W: Write>(
    writer: W,
    timestamp: Timestamp,
    networks: &[WirelessNetworkRecord],
) -> Result<(), SessionError> {
    let mut csv = csv::Writer::from_writer(writer);
    for net in networks {
        csv.serialize(NetworkRow::new(timestamp, net))?;
    }
    csv.flush()?;
    Ok(())
}

/// Read back a scan batch written by [`write_scan_csv`].
pub fn read_scan_csv<R: Read>(reader: R) -> Result<Vec<WirelessNetworkRecord>, SessionError> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut out = Vec::new();
    for row in csv.deserialize::<NetworkRow>() {
        out.push(row?.into_record());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{DISTANCE_KEY, MOTION_KEY};

    fn point() -> CorrelatedDataPoint {
        CorrelatedDataPoint {
            timestamp: Timestamp::from_millis(946_684_800_000),
            sensor_snapshot: SensorSnapshot::new()
                .with(DISTANCE_KEY, 120.5)
                .with(MOTION_KEY, false),
            network_snapshot: NetworkSnapshot {
                link: Some(LinkStatus {
                    ssid: "HomeNet".into(),
                    signal_strength_dbm: Some(-55),
                    bit_rate: None,
                }),
                latency: vec![LatencySample {
                    target: "8.8.8.8".into(),
                    stats: LatencyStatistics {
                        avg_ms: Some(15.1),
                        packet_loss_percent: Some(0.0),
                        ..Default::default()
                    },
                }],
                throughput: vec![ThroughputResult {
                    direction: Direction::Download,
                    bitrate_mbps: 50.0,
                    bytes_transferred: 31_250_000,
                    duration_seconds: 5.0,
                }],
                errors: vec![],
            },
            escalated: false,
        }
    }

    fn to_csv(rows: &[ConsolidatedRow]) -> String {
        let mut w = csv::Writer::from_writer(Vec::new());
        for r in rows {
            w.serialize(r).unwrap();
        }
        String::from_utf8(w.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn row_flattens_point() {
        let row = point().to_row();
        assert_eq!(row.timestamp, "2000-01-01T00:00:00.000Z");
        assert_eq!(row.distance_cm, Some(120.5));
        assert_eq!(row.motion_detected, Some(false));
        assert_eq!(row.signal_strength_dbm, Some(-55));
        assert_eq!(row.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(row.avg_latency_ms, Some(15.1));
        assert_eq!(row.download_mbps, Some(50.0));
        assert_eq!(row.upload_mbps, None);
    }

    #[test]
    fn header_matches_row_fields() {
        let text = to_csv(&[point().to_row()]);
        let header = text.lines().next().unwrap();
        assert_eq!(header, CONSOLIDATED_HEADER.join(","));
    }

    #[test]
    fn absent_values_are_empty_fields() {
        let mut p = point();
        p.sensor_snapshot = SensorSnapshot::new();
        p.network_snapshot = NetworkSnapshot::default();
        let text = to_csv(&[p.to_row()]);
        let line = text.lines().nth(1).unwrap();
        assert_eq!(line, "2000-01-01T00:00:00.000Z,,,,,,,,,false");
    }

    #[test]
    fn scan_rows_preserve_fields() {
        let nets = vec![
            WirelessNetworkRecord {
                ssid: "Cafe, \"Guest\"".into(),
                bssid: "AA:BB:CC:DD:EE:02".into(),
                signal_strength_dbm: -71,
                channel: 36,
                frequency: "5.18 GHz".into(),
                encryption: Encryption::Open,
            },
            WirelessNetworkRecord {
                ssid: "HomeNet".into(),
                bssid: "AA:BB:CC:DD:EE:01".into(),
                signal_strength_dbm: -50,
                channel: 6,
                frequency: "2.437 GHz".into(),
                encryption: Encryption::Encrypted,
            },
        ];
        let mut buf = Vec::new();
        write_scan_csv(&mut buf, Timestamp::from_millis(0), &nets).unwrap();
        let back = read_scan_csv(buf.as_slice()).unwrap();
        assert_eq!(back.len(), 2);
        for (a, b) in nets.iter().zip(&back) {
            assert_eq!(a.ssid, b.ssid);
            assert_eq!(a.signal_strength_dbm, b.signal_strength_dbm);
            assert_eq!(a.channel, b.channel);
        }
        assert_eq!(back[1].encryption, Encryption::Encrypted);
    }
}
