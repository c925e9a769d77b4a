//! Round-trip latency output (`ping`).

use std::sync::OnceLock;

use regex::Regex;

use super::cached;
use crate::error::{ProbeError, ProbeKind};
use crate::probe::ProbeOutput;
use crate::record::LatencyStatistics;

fn rtt_re() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // iputils prints mdev, BSD ping prints stddev.
    cached(
        &PATTERN,
        r"min/avg/max/(?:mdev|stddev)\s*=\s*([0-9.]+)/([0-9.]+)/([0-9.]+)/([0-9.]+)",
    )
}

fn loss_re() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached(&PATTERN, r"([0-9.]+)% packet loss")
}

/// Parse a finished latency probe against `target`.
///
/// The timing line and the loss line are matched independently. A run that
/// exits non-zero but still printed either line (e.g. 100% loss) is a valid
/// record. A failed run with neither line is an invocation error carrying
/// the tool's failure text.
pub fn parse_latency(output: &ProbeOutput, target: &str) -> Result<LatencyStatistics, ProbeError> {
    let mut stats = LatencyStatistics::default();

    if let Some(c) = rtt_re().captures(&output.stdout) {
        stats.min_ms = c[1].parse().ok();
        stats.avg_ms = c[2].parse().ok();
        stats.max_ms = c[3].parse().ok();
        stats.mdev_ms = c[4].parse().ok();
    }
    if let Some(c) = loss_re().captures(&output.stdout) {
        stats.packet_loss_percent = c[1].parse().ok();
    }

    if stats.is_empty() && !output.status.success() {
        return Err(ProbeError::invocation(
            ProbeKind::Latency,
            target,
            output.failure_text(),
        ));
    }
    Ok(stats)
}
