//! Parsers for diagnostic tool output.
//!
//! Each parser is total: malformed or partial text yields a record with unset
//! fields, and only a failed invocation or an undecodable payload becomes a
//! [`ProbeError`](crate::error::ProbeError). Nothing here panics on input.
//!
//! | Parser | Tool | Output |
//! |--------|------|--------|
//! | [`parse_scan_output`] | `iwlist <if> scan` | `Vec<WirelessNetworkRecord>` |
//! | [`parse_link_status`] | `iwconfig <if>` | `Option<LinkStatus>` |
//! | [`parse_latency`] | `ping` | `LatencyStatistics` |
//! | [`parse_throughput`] | `iperf3 -J` | `ThroughputResult` |

mod latency;
mod link;
mod scan;
mod throughput;

pub use latency::parse_latency;
pub use link::parse_link_status;
pub use scan::{ScanOutcome, parse_scan_output, parse_scan_probe};
pub use throughput::parse_throughput;

use std::sync::OnceLock;

use regex::Regex;

/// Compile a fixed pattern once and hand out the shared instance.
pub(crate) fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("built-in pattern is valid"))
}
