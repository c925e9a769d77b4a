use environet_core::{Direction, MonitorConfig};

pub fn run(config: MonitorConfig, direction: &str, duration_secs: u32) {
    let direction: Direction = match direction.parse() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if config.iperf_server.is_none() {
        eprintln!("Error: no iperf3 server configured (set iperf_server or pass --iperf-server)");
        std::process::exit(1);
    }

    let diag = super::diagnostics(config);
    match super::runtime().block_on(diag.throughput(direction, duration_secs)) {
        Some(Ok(result)) => super::print_json(&result),
        Some(Err(e)) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        None => {
            eprintln!("Error: throughput test skipped");
            std::process::exit(1);
        }
    }
}
