//! Throughput test reports (`iperf3 -J`).

use serde::Deserialize;

use crate::error::{ProbeError, ProbeKind};
use crate::probe::ProbeOutput;
use crate::record::{Direction, ThroughputResult};

/// The subset of the iperf3 JSON report this crate reads.
#[derive(Debug, Deserialize)]
struct IperfReport {
    #[serde(default)]
    end: Option<IperfEnd>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IperfEnd {
    #[serde(default)]
    sum_received: Option<IperfSum>,
    #[serde(default)]
    sum_sent: Option<IperfSum>,
}

#[derive(Debug, Deserialize)]
struct IperfSum {
    #[serde(default)]
    bits_per_second: f64,
    #[serde(default)]
    bytes: f64,
    #[serde(default)]
    seconds: Option<f64>,
}

/// Parse a finished throughput probe against `server`.
///
/// Bitrate and bytes come from `end.sum_received`, then `end.sum_sent`, and
/// are zero when neither is present. `duration_secs` is the configured test
/// length; when it is zero the payload's own `seconds` is used instead.
///
/// A non-zero exit is an invocation error (iperf3 still prints a JSON body
/// whose `error` member is preferred as the message). Output that is not a
/// JSON object is a decode error.
pub fn parse_throughput(
    output: &ProbeOutput,
    direction: Direction,
    server: &str,
    duration_secs: f64,
) -> Result<ThroughputResult, ProbeError> {
    let decoded = serde_json::from_str::<IperfReport>(&output.stdout);

    if !output.status.success() {
        let message = decoded
            .ok()
            .and_then(|r| r.error)
            .unwrap_or_else(|| output.failure_text());
        return Err(ProbeError::invocation(ProbeKind::Throughput, server, message));
    }

    let report = decoded.map_err(|e| {
        ProbeError::decode(
            ProbeKind::Throughput,
            server,
            format!("invalid iperf3 JSON: {e}"),
        )
    })?;

    let sum = report
        .end
        .and_then(|end| end.sum_received.or(end.sum_sent));

    let (bits_per_second, bytes, seconds) = match sum {
        Some(s) => (s.bits_per_second, s.bytes, s.seconds),
        None => (0.0, 0.0, None),
    };

    let duration_seconds = if duration_secs > 0.0 {
        duration_secs
    } else {
        seconds.unwrap_or(0.0)
    };

    Ok(ThroughputResult {
        direction,
        bitrate_mbps: bits_per_second / 1_000_000.0,
        bytes_transferred: bytes.max(0.0) as u64,
        duration_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeErrorKind;

    fn ok(json: &str) -> ProbeOutput {
        ProbeOutput::ok(json)
    }

    #[test]
    fn download_uses_sum_received() {
        let json = r#"{"start":{},"end":{
            "sum_sent":{"seconds":5.0,"bytes":40000000,"bits_per_second":64000000},
            "sum_received":{"seconds":5.0,"bytes":31250000,"bits_per_second":50000000}}}"#;
        let r = parse_throughput(&ok(json), Direction::Download, "srv", 5.0).unwrap();
        assert_eq!(r.direction, Direction::Download);
        assert!((r.bitrate_mbps - 50.0).abs() < 1e-9);
        assert_eq!(r.bytes_transferred, 31_250_000);
        assert_eq!(r.duration_seconds, 5.0);
    }

    #[test]
    fn upload_falls_back_to_sum_sent() {
        let json =
            r#"{"end":{"sum_sent":{"seconds":10.0,"bytes":12500000,"bits_per_second":10000000}}}"#;
        let r = parse_throughput(&ok(json), Direction::Upload, "srv", 10.0).unwrap();
        assert_eq!(r.direction, Direction::Upload);
        assert!((r.bitrate_mbps - 10.0).abs() < 1e-9);
        assert_eq!(r.bytes_transferred, 12_500_000);
    }

    #[test]
    fn missing_end_is_zero() {
        let r = parse_throughput(&ok(r#"{"start":{}}"#), Direction::Download, "srv", 5.0).unwrap();
        assert_eq!(r.bitrate_mbps, 0.0);
        assert_eq!(r.bytes_transferred, 0);

        let r = parse_throughput(&ok(r#"{"end":{}}"#), Direction::Download, "srv", 5.0).unwrap();
        assert_eq!(r.bitrate_mbps, 0.0);
    }

    #[test]
    fn duration_falls_back_to_payload() {
        let json = r#"{"end":{"sum_received":{"seconds":4.98,"bytes":1,"bits_per_second":8}}}"#;
        let r = parse_throughput(&ok(json), Direction::Download, "srv", 0.0).unwrap();
        assert_eq!(r.duration_seconds, 4.98);
    }

    #[test]
    fn undecodable_is_decode_error() {
        let err = parse_throughput(&ok("iperf3: not json"), Direction::Upload, "srv", 5.0)
            .unwrap_err();
        assert_eq!(err.kind, ProbeErrorKind::DecodeError);
        assert_eq!(err.probe, ProbeKind::Throughput);
        assert_eq!(err.target, "srv");
    }

    #[test]
    fn failed_run_prefers_json_error() {
        let out = ProbeOutput::failed(1, "").with_stdout(
            r#"{"start":{},"end":{},"error":"unable to connect to server: Connection refused"}"#,
        );
        let err = parse_throughput(&out, Direction::Download, "srv", 5.0).unwrap_err();
        assert_eq!(err.kind, ProbeErrorKind::InvocationError);
        assert!(err.message.contains("Connection refused"));

        let out = ProbeOutput::failed(1, "iperf3: error - no route");
        let err = parse_throughput(&out, Direction::Download, "srv", 5.0).unwrap_err();
        assert_eq!(err.kind, ProbeErrorKind::InvocationError);
        assert_eq!(err.message, "iperf3: error - no route");
    }
}
