//! Monitor configuration.
//!
//! Loaded from a JSON file in which every field is optional. A missing file
//! means "use the defaults"; a file that exists but does not parse is an
//! error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which sensor collaborator to construct at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorConfig {
    /// Random-walk distance plus toggling presence flag.
    Simulated {
        /// Fixed seed for reproducible runs; random when absent.
        #[serde(default)]
        seed: Option<u64>,
        /// Readings closer than this set the `obstruction` flag.
        #[serde(default)]
        obstruction_threshold_cm: Option<f64>,
    },
    /// External helper that prints one JSON object per invocation.
    Live {
        command: Vec<String>,
        #[serde(default = "default_sensor_timeout_secs")]
        timeout_secs: u64,
    },
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::Simulated {
            seed: None,
            obstruction_threshold_cm: None,
        }
    }
}

fn default_sensor_timeout_secs() -> u64 {
    2
}

/// Everything the monitor needs to know about its environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Wireless interface probed by every command.
    pub interface: String,
    /// Seconds between tick starts.
    #[serde(alias = "scan_interval")]
    pub scan_interval_secs: u64,
    /// Latency targets; ordinary ticks use only the first.
    pub targets: Vec<String>,
    /// iperf3 server. Throughput probes are skipped when unset.
    pub iperf_server: Option<String>,
    pub iperf_port: u16,
    /// Root directory for session recordings and log files.
    pub log_directory: PathBuf,
    /// Grace period added to each probe's expected run time.
    pub probe_timeout_secs: u64,
    pub ping_count: u32,
    pub full_ping_count: u32,
    pub iperf_duration_secs: u32,
    pub full_iperf_duration_secs: u32,
    /// Run the scan through `sudo -n`.
    pub use_sudo_for_scan: bool,
    /// Snapshot flag that triggers the full battery.
    pub escalation_flag: String,
    pub sensor: SensorConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interface: "wlan0".to_string(),
            scan_interval_secs: 60,
            targets: vec!["8.8.8.8".to_string(), "google.com".to_string()],
            iperf_server: None,
            iperf_port: 5201,
            log_directory: PathBuf::from("logs"),
            probe_timeout_secs: 5,
            ping_count: 5,
            full_ping_count: 10,
            iperf_duration_secs: 5,
            full_iperf_duration_secs: 10,
            use_sudo_for_scan: false,
            escalation_flag: "motion_detected".to_string(),
            sensor: SensorConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "config file {} not found, using defaults",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_json(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interface.trim().is_empty() {
            return Err(ConfigError::Invalid("interface must not be empty".into()));
        }
        if self.scan_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "scan_interval_secs must be at least 1".into(),
            ));
        }
        if self.escalation_flag.trim().is_empty() {
            return Err(ConfigError::Invalid("escalation_flag must not be empty".into()));
        }
        if self.ping_count == 0 || self.full_ping_count == 0 {
            return Err(ConfigError::Invalid("ping counts must be at least 1".into()));
        }
        match &self.sensor {
            SensorConfig::Live { command, .. } if command.is_empty() => {
                return Err(ConfigError::Invalid("live sensor needs a command".into()));
            }
            SensorConfig::Simulated {
                obstruction_threshold_cm: Some(t),
                ..
            } if !(t.is_finite() && *t > 0.0) => {
                return Err(ConfigError::Invalid(
                    "obstruction_threshold_cm must be a positive number".into(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// First latency target, used by ordinary ticks.
    pub fn primary_target(&self) -> Option<&str> {
        self.targets.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let c = MonitorConfig::default();
        assert_eq!(c.interface, "wlan0");
        assert_eq!(c.scan_interval_secs, 60);
        assert_eq!(c.targets, vec!["8.8.8.8", "google.com"]);
        assert_eq!(c.iperf_server, None);
        assert_eq!(c.iperf_port, 5201);
        assert_eq!(c.log_directory, PathBuf::from("logs"));
        assert_eq!(c.primary_target(), Some("8.8.8.8"));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let c = MonitorConfig::from_json(r#"{"interface":"wlp2s0","iperf_server":"10.0.0.2"}"#)
            .unwrap();
        assert_eq!(c.interface, "wlp2s0");
        assert_eq!(c.iperf_server.as_deref(), Some("10.0.0.2"));
        assert_eq!(c.scan_interval_secs, 60);
        assert_eq!(c.ping_count, 5);
    }

    #[test]
    fn sensor_variants_parse() {
        let c = MonitorConfig::from_json(r#"{"sensor":{"kind":"simulated","seed":7}}"#).unwrap();
        assert_eq!(
            c.sensor,
            SensorConfig::Simulated {
                seed: Some(7),
                obstruction_threshold_cm: None,
            }
        );

        let c = MonitorConfig::from_json(
            r#"{"escalation_flag":"obstruction",
                "sensor":{"kind":"simulated","obstruction_threshold_cm":30.0}}"#,
        )
        .unwrap();
        assert_eq!(c.escalation_flag, "obstruction");
        assert_eq!(
            c.sensor,
            SensorConfig::Simulated {
                seed: None,
                obstruction_threshold_cm: Some(30.0),
            }
        );

        let c = MonitorConfig::from_json(
            r#"{"sensor":{"kind":"live","command":["gpio-read","--json"]}}"#,
        )
        .unwrap();
        assert_eq!(
            c.sensor,
            SensorConfig::Live {
                command: vec!["gpio-read".into(), "--json".into()],
                timeout_secs: 2,
            }
        );
    }

    #[test]
    fn legacy_scan_interval_key_is_honoured() {
        let c = MonitorConfig::from_json(r#"{"scan_interval":15,"interface":"wlan1"}"#).unwrap();
        assert_eq!(c.scan_interval_secs, 15);
        assert_eq!(c.scan_interval(), Duration::from_secs(15));
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(
            MonitorConfig::from_json(r#"{"scan_interval_secs":0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MonitorConfig::from_json(r#"{"sensor":{"kind":"live","command":[]}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MonitorConfig::from_json(
                r#"{"sensor":{"kind":"simulated","obstruction_threshold_cm":-1.0}}"#
            ),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = MonitorConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(c, MonitorConfig::default());
    }

    #[test]
    fn malformed_file_is_parse_error_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"{ not json").unwrap();

        match MonitorConfig::load(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
