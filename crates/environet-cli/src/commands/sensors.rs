use environet_core::MonitorConfig;

pub fn run(config: MonitorConfig, count: usize, spacing: &str) {
    let spacing = super::duration_or_exit(spacing);
    let sensor = super::make_sensor(&config);

    println!(
        "Reading {count} snapshot(s) from the {} sensor:",
        sensor.name()
    );
    let mut failures = 0;
    for i in 0..count {
        match sensor.read() {
            Ok(snap) => {
                let fields: Vec<String> = snap.iter().map(|(k, v)| format!("{k}={v}")).collect();
                println!("  Reading {}: {}", i + 1, fields.join("  "));
                if snap.escalation_requested(&config.escalation_flag) {
                    println!("    -> '{}' set: would escalate", config.escalation_flag);
                }
            }
            Err(e) => {
                println!("  Reading {}: error: {e}", i + 1);
                failures += 1;
            }
        }
        if i + 1 < count {
            std::thread::sleep(spacing);
        }
    }

    if count > 0 && failures == count {
        std::process::exit(1);
    }
}
