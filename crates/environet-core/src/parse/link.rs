//! Single-interface link status (`iwconfig <if>`).

use std::sync::OnceLock;

use regex::Regex;

use super::cached;
use crate::record::LinkStatus;

fn essid_re() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached(&PATTERN, r#"ESSID:"([^"]*)""#)
}

fn signal_re() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached(&PATTERN, r"Signal level[=:]\s*(-?\d+)\s*dBm")
}

fn bit_rate_re() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached(&PATTERN, r"Bit Rate[=:]\s*([0-9.]+\s*[kMG]b/s)")
}

/// Parse the status of one interface.
///
/// Returns `None` when no quoted network name is present, which is how the
/// tool reports an unassociated interface (`ESSID:off/any`). Signal level and
/// bit rate are extracted independently of each other.
pub fn parse_link_status(text: &str) -> Option<LinkStatus> {
    let ssid = essid_re().captures(text)?[1].to_string();

    let signal_strength_dbm = signal_re()
        .captures(text)
        .and_then(|c| c[1].parse().ok());
    let bit_rate = bit_rate_re().captures(text).map(|c| c[1].to_string());

    Some(LinkStatus {
        ssid,
        signal_strength_dbm,
        bit_rate,
    })
}
