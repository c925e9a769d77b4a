//! The monitoring loop.
//!
//! Each tick reads the sensors, runs the cheap network probes, persists the
//! ordinary data point, and, when the snapshot's escalation flag is set,
//! runs the full battery and persists a second, escalated point together
//! with the raw scan batch.
//!
//! ```text
//! Idle ──run──▶ Running ──stop──▶ Idle
//!
//! tick: Sampling ──▶ Deciding ──flag──▶ Escalating
//!                       │                    │
//!                       └──────▶ sleep ◀─────┘
//! ```
//!
//! Probes within a tick are sequential. Stop is observed at tick
//! boundaries and during the inter-tick sleep; an in-flight probe is never
//! interrupted.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::datapoint::CorrelatedDataPoint;
use crate::diagnostics::NetworkDiagnostics;
use crate::probe::ProbeRunner;
use crate::sensor::{ERROR_KEY, SensorSnapshot, SensorSource};
use crate::session::DataSink;
use crate::time::Timestamp;

/// Observable state of a correlator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrelatorStatus {
    pub running: bool,
    pub ticks: u64,
    pub escalations: u64,
    pub last_tick: Option<Timestamp>,
    pub last_escalation: Option<Timestamp>,
}

/// Data points produced by one tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub ordinary: CorrelatedDataPoint,
    pub escalated: Option<CorrelatedDataPoint>,
}

/// Sequences sampling, applies the escalation policy, and hands the
/// resulting data points to a sink.
pub struct TelemetryCorrelator<K: DataSink> {
    diagnostics: NetworkDiagnostics,
    sensor: Arc<dyn SensorSource>,
    sink: K,
    interval: Duration,
    escalation_flag: String,
    status: watch::Sender<CorrelatorStatus>,
}

impl<K: DataSink> TelemetryCorrelator<K> {
    pub fn new(
        config: MonitorConfig,
        runner: Arc<dyn ProbeRunner>,
        sensor: Arc<dyn SensorSource>,
        sink: K,
    ) -> Self {
        let interval = config.scan_interval();
        let escalation_flag = config.escalation_flag.clone();
        let (status, _) = watch::channel(CorrelatorStatus::default());
        Self {
            diagnostics: NetworkDiagnostics::new(runner, Arc::new(config)),
            sensor,
            sink,
            interval,
            escalation_flag,
            status,
        }
    }

    /// Follow status updates.
    pub fn subscribe(&self) -> watch::Receiver<CorrelatorStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> CorrelatorStatus {
        self.status.borrow().clone()
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Run one complete tick.
    pub async fn tick(&mut self) -> TickReport {
        let started = Timestamp::now();

        // Sampling
        let sensor_snapshot = read_sensor(Arc::clone(&self.sensor)).await;
        let network_snapshot = self.diagnostics.ordinary_sample().await;

        // Deciding
        let escalate = sensor_snapshot.escalation_requested(&self.escalation_flag);
        let ordinary = CorrelatedDataPoint {
            timestamp: started,
            sensor_snapshot,
            network_snapshot,
            escalated: false,
        };
        self.persist(&ordinary);
        self.status.send_modify(|s| {
            s.ticks += 1;
            s.last_tick = Some(started);
        });

        if !escalate {
            return TickReport {
                ordinary,
                escalated: None,
            };
        }

        // Escalating
        let escalated_at = Timestamp::now();
        info!(
            "'{}' set at {escalated_at}, running full diagnostic battery",
            self.escalation_flag
        );
        let scan = self.diagnostics.scan_networks().await;
        let mut network_snapshot = self.diagnostics.full_battery().await;
        match scan.error {
            Some(err) => network_snapshot.errors.insert(0, err),
            None => {
                info!("scan found {} networks", scan.networks.len());
                if let Err(e) = self.sink.record_scan(escalated_at, &scan.networks) {
                    error!("failed to persist scan batch: {e}");
                }
            }
        }

        let escalated = CorrelatedDataPoint {
            timestamp: escalated_at,
            sensor_snapshot: ordinary.sensor_snapshot.clone(),
            network_snapshot,
            escalated: true,
        };
        self.persist(&escalated);
        self.status.send_modify(|s| {
            s.escalations += 1;
            s.last_escalation = Some(escalated_at);
        });

        TickReport {
            ordinary,
            escalated: Some(escalated),
        }
    }

    /// Tick until `shutdown` is cancelled, then hand back the sink.
    pub async fn run(mut self, shutdown: CancellationToken) -> K {
        info!(
            "monitoring {} every {}s",
            self.diagnostics.config().interface,
            self.interval.as_secs()
        );
        self.status.send_modify(|s| s.running = true);

        loop {
            if shutdown.is_cancelled() {
                break;
            }
            let tick_start = tokio::time::Instant::now();
            let report = self.tick().await;
            debug!(
                "tick done in {:.1}s (escalated: {})",
                tick_start.elapsed().as_secs_f64(),
                report.escalated.is_some()
            );

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep_until(tick_start + self.interval) => {}
            }
        }

        self.status.send_modify(|s| s.running = false);
        info!("monitoring stopped");
        self.sink
    }

    /// Start the loop on its own task.
    pub fn spawn(self) -> MonitorHandle<K> {
        let shutdown = CancellationToken::new();
        let status = self.subscribe();
        let task = tokio::spawn(self.run(shutdown.clone()));
        MonitorHandle {
            shutdown,
            status,
            task,
        }
    }

    fn persist(&mut self, point: &CorrelatedDataPoint) {
        if let Err(e) = self.sink.record_point(point) {
            error!(
                "failed to persist data point from {}: {e}",
                point.timestamp
            );
        }
    }
}

/// Read the sensor on the blocking pool. A failed read becomes a snapshot
/// carrying only the `error` key, so network sampling still happens.
async fn read_sensor(sensor: Arc<dyn SensorSource>) -> SensorSnapshot {
    match tokio::task::spawn_blocking(move || sensor.read()).await {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(e)) => {
            warn!("sensor read failed: {e}");
            SensorSnapshot::from_error(&e)
        }
        Err(e) => {
            warn!("sensor task failed: {e}");
            SensorSnapshot::new().with(ERROR_KEY, e.to_string().as_str())
        }
    }
}

/// A correlator running on a background task.
pub struct MonitorHandle<K> {
    shutdown: CancellationToken,
    status: watch::Receiver<CorrelatorStatus>,
    task: JoinHandle<K>,
}

impl<K> MonitorHandle<K> {
    pub fn status(&self) -> CorrelatorStatus {
        self.status.borrow().clone()
    }

    /// Token that stops the loop when cancelled, e.g. from a signal handler.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal stop and wait for the current tick to finish.
    pub async fn stop(self) -> Result<K, tokio::task::JoinError> {
        self.shutdown.cancel();
        self.task.await
    }

    /// Wait for the loop to end without signalling it.
    pub async fn join(self) -> Result<K, tokio::task::JoinError> {
        self.task.await
    }
}
