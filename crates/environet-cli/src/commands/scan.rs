use environet_core::{MonitorConfig, WirelessNetworkRecord};

pub fn run(config: MonitorConfig, json: bool) {
    let interface = config.interface.clone();
    let diag = super::diagnostics(config);
    let outcome = super::runtime().block_on(diag.scan_networks());

    if json {
        super::print_json(&outcome);
        if outcome.error.is_some() {
            std::process::exit(1);
        }
        return;
    }

    if let Some(err) = &outcome.error {
        eprintln!("Scan failed: {}", err.message);
        std::process::exit(1);
    }
    let mut networks = outcome.networks;
    networks.sort_by(|a, b| b.signal_strength_dbm.cmp(&a.signal_strength_dbm));

    println!("Found {} network(s) on {interface}:\n", networks.len());
    print_table(&networks);
}

fn print_table(networks: &[WirelessNetworkRecord]) {
    if networks.is_empty() {
        println!("  (none found)");
        return;
    }
    println!(
        "  {:<32} {:<17} {:>6} {:>4} {:<10} Encryption",
        "SSID", "BSSID", "dBm", "Ch", "Frequency"
    );
    for n in networks {
        println!(
            "  {:<32} {:<17} {:>6} {:>4} {:<10} {}",
            n.ssid, n.bssid, n.signal_strength_dbm, n.channel, n.frequency, n.encryption
        );
    }
}
