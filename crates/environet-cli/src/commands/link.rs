use environet_core::MonitorConfig;

pub fn run(config: MonitorConfig) {
    let interface = config.interface.clone();
    let diag = super::diagnostics(config);
    match super::runtime().block_on(diag.link_status()) {
        Ok(Some(link)) => super::print_json(&link),
        Ok(None) => println!("{interface} is not associated"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
