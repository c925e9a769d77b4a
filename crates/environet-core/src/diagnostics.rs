//! One call per diagnostic: build the command, run it under its timeout,
//! and parse what came back.

use std::sync::Arc;

use log::warn;

use crate::config::MonitorConfig;
use crate::datapoint::{LatencySample, NetworkSnapshot};
use crate::error::ProbeError;
use crate::parse::{
    ScanOutcome, parse_latency, parse_link_status, parse_scan_probe, parse_throughput,
};
use crate::probe::{ProbeCommand, ProbeRunner, run_with_timeout};
use crate::record::{Direction, LatencyStatistics, LinkStatus, ThroughputResult};

/// Runs probes for the configured interface through a shared runner.
#[derive(Clone)]
pub struct NetworkDiagnostics {
    runner: Arc<dyn ProbeRunner>,
    config: Arc<MonitorConfig>,
}

impl NetworkDiagnostics {
    pub fn new(runner: Arc<dyn ProbeRunner>, config: Arc<MonitorConfig>) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    async fn invoke(
        &self,
        command: &ProbeCommand,
    ) -> Result<crate::probe::ProbeOutput, ProbeError> {
        run_with_timeout(self.runner.as_ref(), command, self.config.probe_timeout()).await
    }

    /// List visible networks. Never fails; a broken scan is reported inside
    /// the outcome.
    pub async fn scan_networks(&self) -> ScanOutcome {
        let command = ProbeCommand::Scan {
            interface: self.config.interface.clone(),
            use_sudo: self.config.use_sudo_for_scan,
        };
        match self.invoke(&command).await {
            Ok(output) => parse_scan_probe(&output, &self.config.interface),
            Err(err) => {
                warn!("{err}");
                ScanOutcome::failed(err)
            }
        }
    }

    /// Current association. `Ok(None)` means the interface is not associated.
    pub async fn link_status(&self) -> Result<Option<LinkStatus>, ProbeError> {
        let command = ProbeCommand::LinkStatus {
            interface: self.config.interface.clone(),
        };
        let output = self.invoke(&command).await?;
        if !output.status.success() {
            return Err(ProbeError::invocation(
                command.kind(),
                command.target(),
                output.failure_text(),
            ));
        }
        Ok(parse_link_status(&output.stdout))
    }

    pub async fn ping(&self, target: &str, count: u32) -> Result<LatencyStatistics, ProbeError> {
        let command = ProbeCommand::Ping {
            interface: self.config.interface.clone(),
            target: target.to_string(),
            count,
        };
        let output = self.invoke(&command).await?;
        parse_latency(&output, target)
    }

    /// Throughput against the configured server. `None` when no server is
    /// configured.
    pub async fn throughput(
        &self,
        direction: Direction,
        duration_secs: u32,
    ) -> Option<Result<ThroughputResult, ProbeError>> {
        let server = self.config.iperf_server.as_deref()?;
        let command = ProbeCommand::Throughput {
            server: server.to_string(),
            port: self.config.iperf_port,
            duration_secs,
            direction,
        };
        let result = match self.invoke(&command).await {
            Ok(output) => parse_throughput(&output, direction, server, f64::from(duration_secs)),
            Err(err) => Err(err),
        };
        Some(result)
    }

    /// Cheap per-tick measurements: link status, latency to the first
    /// target, and a short download test when a server is configured.
    pub async fn ordinary_sample(&self) -> NetworkSnapshot {
        let mut snap = NetworkSnapshot::default();

        match self.link_status().await {
            Ok(link) => snap.link = link,
            Err(err) => push_error(&mut snap, err),
        }

        if let Some(target) = self.config.primary_target() {
            let target = target.to_string();
            self.collect_latency(&mut snap, &target, self.config.ping_count)
                .await;
        }

        if let Some(result) = self
            .throughput(Direction::Download, self.config.iperf_duration_secs)
            .await
        {
            collect_throughput(&mut snap, result);
        }

        snap
    }

    /// Full battery: latency to every target and both throughput directions.
    /// Link status is included so the escalated point stands on its own.
    pub async fn full_battery(&self) -> NetworkSnapshot {
        let mut snap = NetworkSnapshot::default();

        match self.link_status().await {
            Ok(link) => snap.link = link,
            Err(err) => push_error(&mut snap, err),
        }

        for target in self.config.targets.clone() {
            self.collect_latency(&mut snap, &target, self.config.full_ping_count)
                .await;
        }

        for direction in [Direction::Download, Direction::Upload] {
            if let Some(result) = self
                .throughput(direction, self.config.full_iperf_duration_secs)
                .await
            {
                collect_throughput(&mut snap, result);
            }
        }

        snap
    }

    async fn collect_latency(&self, snap: &mut NetworkSnapshot, target: &str, count: u32) {
        match self.ping(target, count).await {
            Ok(stats) => snap.latency.push(LatencySample {
                target: target.to_string(),
                stats,
            }),
            Err(err) => push_error(snap, err),
        }
    }
}

fn collect_throughput(snap: &mut NetworkSnapshot, result: Result<ThroughputResult, ProbeError>) {
    match result {
        Ok(t) => snap.throughput.push(t),
        Err(err) => push_error(snap, err),
    }
}

fn push_error(snap: &mut NetworkSnapshot, err: ProbeError) {
    warn!("{err} at {}", err.timestamp);
    snap.errors.push(err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProbeErrorKind, ProbeKind};
    use crate::probe::ProbeOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers by probe kind and records every command it was given.
    #[derive(Default)]
    struct CannedRunner {
        seen: Mutex<Vec<ProbeCommand>>,
    }

    #[async_trait]
    impl ProbeRunner for CannedRunner {
        async fn run(&self, command: &ProbeCommand) -> Result<ProbeOutput, ProbeError> {
            self.seen.lock().unwrap().push(command.clone());
            Ok(match command {
                ProbeCommand::Scan { .. } => ProbeOutput::ok(
                    "Cell 01 - Address: AA:BB:CC:DD:EE:01\n ESSID:\"HomeNet\"\n",
                ),
                ProbeCommand::LinkStatus { .. } => {
                    ProbeOutput::ok("wlan0 ESSID:\"HomeNet\"\n Signal level=-50 dBm\n")
                }
                ProbeCommand::Ping { target, .. } if target == "down.example" => {
                    ProbeOutput::failed(2, "ping: down.example: Name or service not known")
                }
                ProbeCommand::Ping { .. } => ProbeOutput::ok(
                    "0% packet loss\nrtt min/avg/max/mdev = 1.0/2.0/3.0/0.5 ms\n",
                ),
                ProbeCommand::Throughput { direction, .. } => {
                    let bps = match direction {
                        Direction::Download => 50_000_000,
                        Direction::Upload => 10_000_000,
                    };
                    ProbeOutput::ok(format!(
                        concat!(
                            r#"{{"end":{{"sum_received":"#,
                            r#"{{"bits_per_second":{},"bytes":1000,"seconds":5.0}}}}}}"#,
                        ),
                        bps
                    ))
                }
            })
        }
    }

    fn diagnostics(config: MonitorConfig) -> (NetworkDiagnostics, Arc<CannedRunner>) {
        let runner = Arc::new(CannedRunner::default());
        (
            NetworkDiagnostics::new(runner.clone(), Arc::new(config)),
            runner,
        )
    }

    #[tokio::test]
    async fn ordinary_sample_without_server() {
        let (diag, runner) = diagnostics(MonitorConfig::default());
        let snap = diag.ordinary_sample().await;

        assert_eq!(snap.link.as_ref().unwrap().ssid, "HomeNet");
        assert_eq!(snap.latency.len(), 1);
        assert_eq!(snap.latency[0].target, "8.8.8.8");
        assert!(snap.throughput.is_empty());
        assert!(snap.errors.is_empty());
        assert_eq!(runner.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn ordinary_sample_downloads_when_server_set() {
        let config = MonitorConfig {
            iperf_server: Some("iperf.local".into()),
            ..Default::default()
        };
        let (diag, runner) = diagnostics(config);
        let snap = diag.ordinary_sample().await;

        assert_eq!(snap.throughput.len(), 1);
        assert_eq!(snap.throughput[0].direction, Direction::Download);
        assert_eq!(snap.throughput[0].duration_seconds, 5.0);
        let seen = runner.seen.lock().unwrap();
        assert!(matches!(
            seen.last(),
            Some(ProbeCommand::Throughput { duration_secs: 5, .. })
        ));
    }

    #[tokio::test]
    async fn full_battery_covers_all_targets_and_directions() {
        let config = MonitorConfig {
            iperf_server: Some("iperf.local".into()),
            targets: vec!["8.8.8.8".into(), "down.example".into(), "1.1.1.1".into()],
            ..Default::default()
        };
        let (diag, runner) = diagnostics(config);
        let snap = diag.full_battery().await;

        assert_eq!(snap.latency.len(), 2);
        assert_eq!(snap.errors.len(), 1);
        assert_eq!(snap.errors[0].kind, ProbeErrorKind::InvocationError);
        assert_eq!(snap.errors[0].target, "down.example");
        assert!(snap.throughput_for(Direction::Download).is_some());
        assert!((snap.throughput_for(Direction::Upload).unwrap().bitrate_mbps - 10.0).abs() < 1e-9);

        let seen = runner.seen.lock().unwrap();
        assert!(seen
            .iter()
            .filter_map(|c| match c {
                ProbeCommand::Ping { count, .. } => Some(*count),
                _ => None,
            })
            .all(|c| c == 10));
    }

    #[tokio::test]
    async fn scan_networks_parses() {
        let (diag, _) = diagnostics(MonitorConfig::default());
        let outcome = diag.scan_networks().await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.networks.len(), 1);
    }

    #[tokio::test]
    async fn link_failure_is_recorded() {
        struct Broken;
        #[async_trait]
        impl ProbeRunner for Broken {
            async fn run(&self, command: &ProbeCommand) -> Result<ProbeOutput, ProbeError> {
                Err(ProbeError::invocation(command.kind(), command.target(), "no such file"))
            }
        }
        let diag = NetworkDiagnostics::new(Arc::new(Broken), Arc::new(MonitorConfig::default()));
        let snap = diag.ordinary_sample().await;
        assert!(snap.link.is_none());
        assert_eq!(snap.errors.len(), 2);
        assert_eq!(snap.errors[0].probe, ProbeKind::LinkStatus);
        assert_eq!(snap.errors[1].probe, ProbeKind::Latency);

        let outcome = diag.scan_networks().await;
        assert!(outcome.networks.is_empty());
        assert_eq!(outcome.error.unwrap().probe, ProbeKind::Scan);
    }
}
