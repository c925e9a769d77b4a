pub mod analyze;
pub mod link;
pub mod monitor;
pub mod ping;
pub mod scan;
pub mod sensors;
pub mod throughput;

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use environet_core::{CommandProbeRunner, MonitorConfig, NetworkDiagnostics, SensorSource};
use serde::Serialize;

/// Command-line values that win over the config file.
pub struct Overrides {
    pub interface: Option<String>,
    pub iperf_server: Option<String>,
}

/// Initialise the global logger. Called once, from `main`.
pub fn init_logging(level: &str, log_file: Option<&Path>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    builder.format_timestamp_millis();

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let _ = std::fs::create_dir_all(parent);
        }
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
            }
            Err(e) => eprintln!("Warning: cannot open log file {}: {e}", path.display()),
        }
    }

    builder.init();
}

/// Copies log output to stderr and a file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Load the config file and apply overrides; exits on error.
pub fn load_config(path: &Path, overrides: Overrides) -> MonitorConfig {
    let mut config = match MonitorConfig::load(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(interface) = overrides.interface {
        config.interface = interface;
    }
    if let Some(server) = overrides.iperf_server {
        config.iperf_server = Some(server);
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    config
}

/// Tokio runtime for one command; exits if it cannot be built.
pub fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting async runtime: {e}");
            std::process::exit(1);
        }
    }
}

pub fn diagnostics(config: MonitorConfig) -> NetworkDiagnostics {
    NetworkDiagnostics::new(Arc::new(CommandProbeRunner::new()), Arc::new(config))
}

/// Build the configured sensor; exits on error.
pub fn make_sensor(config: &MonitorConfig) -> Arc<dyn SensorSource> {
    match environet_core::sensor_from_config(&config.sensor) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error encoding JSON: {e}");
            std::process::exit(1);
        }
    }
}

/// Parse a duration string like "5m", "30s", "1h", "100ms".
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    let (numeric, multiplier) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 1u64)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1000)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60_000)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3_600_000)
    } else {
        // Assume seconds
        (s, 1000)
    };

    let value: u64 = numeric
        .trim()
        .parse()
        .map_err(|_| format!("Invalid duration: {s}"))?;
    Ok(Duration::from_millis(value * multiplier))
}

/// `parse_duration` for command handlers: exits on error.
pub fn duration_or_exit(s: &str) -> Duration {
    parse_duration(s).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    })
}

/// Parse `key:value` tags, warning about malformed ones.
pub fn parse_tags(tags: &[String]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for tag in tags {
        if let Some((k, v)) = tag.split_once(':') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        } else {
            eprintln!("Warning: ignoring malformed tag '{tag}' (expected key:value)");
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // parse_duration tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("100ms"), Ok(Duration::from_millis(100)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn test_parse_duration_bare_number_is_seconds() {
        assert_eq!(parse_duration("45"), Ok(Duration::from_secs(45)));
        assert_eq!(parse_duration(" 2 "), Ok(Duration::from_secs(2)));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    // -----------------------------------------------------------------------
    // parse_tags tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_tags() {
        let tags = parse_tags(&[
            "room:kitchen".to_string(),
            "broken".to_string(),
            "door: open".to_string(),
        ]);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["room"], "kitchen");
        assert_eq!(tags["door"], "open");
    }

    // -----------------------------------------------------------------------
    // load_config tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_overrides_win() {
        let config = load_config(
            Path::new("/nonexistent/environet-config.json"),
            Overrides {
                interface: Some("wlp3s0".to_string()),
                iperf_server: Some("10.0.0.5".to_string()),
            },
        );
        assert_eq!(config.interface, "wlp3s0");
        assert_eq!(config.iperf_server.as_deref(), Some("10.0.0.5"));
        assert_eq!(config.scan_interval_secs, 60);
    }
}
