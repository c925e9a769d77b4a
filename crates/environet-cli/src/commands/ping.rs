use environet_core::{LatencySample, MonitorConfig};

pub fn run(config: MonitorConfig, targets: &[String], count: u32) {
    if count == 0 {
        eprintln!("Error: --count must be at least 1");
        std::process::exit(1);
    }
    let targets: Vec<String> = if targets.is_empty() {
        config.targets.clone()
    } else {
        targets.to_vec()
    };
    if targets.is_empty() {
        eprintln!("Error: no targets given and none configured");
        std::process::exit(1);
    }

    let diag = super::diagnostics(config);
    let rt = super::runtime();

    let mut samples = Vec::new();
    let mut failed = 0;
    for target in &targets {
        match rt.block_on(diag.ping(target, count)) {
            Ok(stats) => samples.push(LatencySample {
                target: target.clone(),
                stats,
            }),
            Err(e) => {
                eprintln!("{e}");
                failed += 1;
            }
        }
    }

    super::print_json(&samples);
    if failed == targets.len() {
        std::process::exit(1);
    }
}
