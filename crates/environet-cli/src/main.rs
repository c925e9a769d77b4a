//! CLI for environet: watch how the room changes your WiFi.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "environet")]
#[command(about = "environet: correlate WiFi diagnostics with environmental sensors")]
#[command(version = environet_core::VERSION)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// Wireless interface to probe (overrides the config file)
    #[arg(long, global = true)]
    interface: Option<String>,

    /// iperf3 server for throughput tests (overrides the config file)
    #[arg(long, global = true)]
    iperf_server: Option<String>,

    /// Log filter: error, warn, info, debug, trace (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Also append log lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitoring loop, escalating to a full battery when the sensor flag fires
    Monitor {
        /// Stop after this long (e.g. "5m", "30s", "1h"); default: until Ctrl+C
        #[arg(long)]
        duration: Option<String>,

        /// Seconds between ticks (overrides the config file)
        #[arg(long)]
        interval: Option<u64>,

        /// Session output directory (default: the config's log_directory)
        #[arg(long)]
        output: Option<String>,

        /// Metadata tags as key:value pairs
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Session note
        #[arg(long)]
        note: Option<String>,
    },

    /// One-off full analysis: sensor readings, scan, and the full battery, saved as JSON
    Analyze {
        /// Number of sensor readings to take
        #[arg(long, default_value = "10")]
        readings: usize,

        /// Delay between sensor readings (e.g. "500ms")
        #[arg(long, default_value = "500ms")]
        spacing: String,

        /// Output file (default: <log_directory>/full_analysis_<timestamp>.json)
        #[arg(long)]
        output: Option<String>,
    },

    /// List visible wireless networks
    Scan {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the current association of the interface
    Link,

    /// Measure latency to one or more targets
    Ping {
        /// Targets to ping (default: the configured targets)
        targets: Vec<String>,

        /// Echo requests per target
        #[arg(long, default_value = "5")]
        count: u32,
    },

    /// Run an iperf3 throughput test
    Throughput {
        /// download or upload
        #[arg(long, default_value = "download")]
        direction: String,

        /// Test length in seconds
        #[arg(long, default_value = "5")]
        duration: u32,
    },

    /// Print sensor readings
    Sensors {
        /// Number of readings
        #[arg(long, default_value = "5")]
        count: usize,

        /// Delay between readings (e.g. "1s")
        #[arg(long, default_value = "1s")]
        spacing: String,
    },
}

fn main() {
    let cli = Cli::parse();

    commands::init_logging(&cli.log_level, cli.log_file.as_deref());

    let config = commands::load_config(
        &cli.config,
        commands::Overrides {
            interface: cli.interface,
            iperf_server: cli.iperf_server,
        },
    );

    match cli.command {
        Commands::Monitor {
            duration,
            interval,
            output,
            tags,
            note,
        } => commands::monitor::run(
            config,
            commands::monitor::MonitorCommandConfig {
                duration: duration.as_deref(),
                interval_secs: interval,
                output: output.as_deref(),
                tags: &tags,
                note: note.as_deref(),
            },
        ),
        Commands::Analyze {
            readings,
            spacing,
            output,
        } => commands::analyze::run(config, readings, &spacing, output.as_deref()),
        Commands::Scan { json } => commands::scan::run(config, json),
        Commands::Link => commands::link::run(config),
        Commands::Ping { targets, count } => commands::ping::run(config, &targets, count),
        Commands::Throughput {
            direction,
            duration,
        } => commands::throughput::run(config, &direction, duration),
        Commands::Sensors { count, spacing } => commands::sensors::run(config, count, &spacing),
    }
}
