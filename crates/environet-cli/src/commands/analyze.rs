//! `environet analyze`: one full diagnostic pass saved as a JSON report.

use std::path::PathBuf;
use std::time::Duration;

use environet_core::{
    MonitorConfig, NetworkSnapshot, ScanOutcome, SensorSnapshot, SensorSource, Timestamp,
};
use serde::Serialize;

#[derive(Serialize)]
struct SensorReading {
    timestamp: Timestamp,
    snapshot: SensorSnapshot,
}

#[derive(Serialize)]
struct FullAnalysis {
    timestamp: Timestamp,
    interface: String,
    sensor: &'static str,
    sensor_readings: Vec<SensorReading>,
    scan: ScanOutcome,
    network: NetworkSnapshot,
}

pub fn run(config: MonitorConfig, readings: usize, spacing: &str, output: Option<&str>) {
    let spacing = super::duration_or_exit(spacing);
    let sensor = super::make_sensor(&config);

    let output_path = output.map_or_else(
        || {
            config
                .log_directory
                .join(format!("full_analysis_{}.json", Timestamp::now().to_compact()))
        },
        PathBuf::from,
    );

    println!("Running full analysis on {}", config.interface);
    println!("  Sensor readings: {readings} ({}ms apart)", spacing.as_millis());

    let sensor_readings = collect_readings(sensor.as_ref(), readings, spacing);
    for (i, r) in sensor_readings.iter().enumerate() {
        println!(
            "  Reading {}: distance {} motion {}",
            i + 1,
            r.snapshot
                .distance_cm()
                .map_or_else(|| "N/A".to_string(), |d| format!("{d:.2}cm")),
            r.snapshot
                .motion_detected()
                .map_or_else(|| "N/A".to_string(), |m| m.to_string()),
        );
    }

    let interface = config.interface.clone();
    let diag = super::diagnostics(config);
    let rt = super::runtime();
    println!("  Scanning and running the full battery...");
    let (scan, network) = rt.block_on(async {
        let scan = diag.scan_networks().await;
        let network = diag.full_battery().await;
        (scan, network)
    });

    println!("  Networks found: {}", scan.networks.len());
    for sample in &network.latency {
        println!(
            "  Latency {:<16} avg {} loss {}",
            sample.target,
            fmt_opt(sample.stats.avg_ms, "ms"),
            fmt_opt(sample.stats.packet_loss_percent, "%"),
        );
    }
    for t in &network.throughput {
        println!("  Throughput {:<9} {:.2} Mbps", t.direction, t.bitrate_mbps);
    }
    for err in scan.error.iter().chain(&network.errors) {
        println!("  ! {err}");
    }

    let report = FullAnalysis {
        timestamp: Timestamp::now(),
        interface,
        sensor: sensor.name(),
        sensor_readings,
        scan,
        network,
    };

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty())
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Error creating {}: {e}", parent.display());
        std::process::exit(1);
    }
    let json = match serde_json::to_string_pretty(&report) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error encoding report: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::write(&output_path, json) {
        eprintln!("Error writing {}: {e}", output_path.display());
        std::process::exit(1);
    }
    println!("\nFull analysis saved to {}", output_path.display());
}

fn collect_readings(
    sensor: &dyn SensorSource,
    count: usize,
    spacing: Duration,
) -> Vec<SensorReading> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let snapshot = sensor.read().unwrap_or_else(|e| SensorSnapshot::from_error(&e));
        out.push(SensorReading {
            timestamp: Timestamp::now(),
            snapshot,
        });
        if i + 1 < count {
            std::thread::sleep(spacing);
        }
    }
    out
}

fn fmt_opt(v: Option<f64>, unit: &str) -> String {
    v.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}{unit}"))
}
