//! `environet monitor`: run the correlator and record a session.

use std::path::PathBuf;
use std::sync::Arc;

use environet_core::{
    CommandProbeRunner, MonitorConfig, SessionConfig, SessionWriter, TelemetryCorrelator,
};

pub struct MonitorCommandConfig<'a> {
    pub duration: Option<&'a str>,
    pub interval_secs: Option<u64>,
    pub output: Option<&'a str>,
    pub tags: &'a [String],
    pub note: Option<&'a str>,
}

pub fn run(mut config: MonitorConfig, cmd: MonitorCommandConfig<'_>) {
    if let Some(secs) = cmd.interval_secs {
        config.scan_interval_secs = secs;
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let max_duration = cmd.duration.map(super::duration_or_exit);
    let sensor = super::make_sensor(&config);

    let output_dir = cmd
        .output
        .map_or_else(|| config.log_directory.clone(), PathBuf::from);
    let writer = match SessionWriter::new(SessionConfig {
        interface: config.interface.clone(),
        sensor: sensor.name().to_string(),
        scan_interval: config.scan_interval(),
        output_dir,
        tags: super::parse_tags(cmd.tags),
        note: cmd.note.map(str::to_string),
    }) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error creating session: {e}");
            std::process::exit(1);
        }
    };

    println!("Monitoring {}", config.interface);
    println!("  Sensor:    {}", sensor.name());
    println!("  Interval:  {}s", config.scan_interval_secs);
    println!("  Targets:   {}", config.targets.join(", "));
    println!(
        "  iperf3:    {}",
        config.iperf_server.as_deref().unwrap_or("(disabled)")
    );
    println!("  Escalate:  when '{}' is set", config.escalation_flag);
    match max_duration {
        Some(d) => println!("  Duration:  {}s", d.as_secs()),
        None => println!("  Duration:  until Ctrl+C"),
    }
    println!("  Output:    {}", writer.session_dir().display());
    println!();

    let rt = super::runtime();
    let writer = rt.block_on(async move {
        let monitor =
            TelemetryCorrelator::new(config, Arc::new(CommandProbeRunner::new()), sensor, writer);
        let handle = monitor.spawn();

        let shutdown = handle.shutdown_token();
        let on_signal = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || on_signal.cancel()) {
            eprintln!("Warning: cannot install Ctrl+C handler: {e}");
        }

        match max_duration {
            Some(d) => {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = tokio::time::sleep(d) => {}
                }
            }
            None => shutdown.cancelled().await,
        }

        let status = handle.status();
        println!(
            "\nStopping after {} ticks ({} escalations)...",
            status.ticks, status.escalations
        );
        handle.stop().await
    });

    let writer = match writer {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: monitor task failed: {e}");
            std::process::exit(1);
        }
    };

    match writer.finish() {
        Ok(dir) => {
            println!("Session saved to {}", dir.display());
            println!("  session.json     : metadata");
            println!("  datapoints.csv   : one consolidated row per data point");
            println!("  datapoints.jsonl : full data points");
            println!("  scan-NNNN.csv    : networks seen on each escalation");
        }
        Err(e) => {
            eprintln!("Error finalizing session: {e}");
            std::process::exit(1);
        }
    }
}
