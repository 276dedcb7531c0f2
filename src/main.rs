use std::error::Error;

use fleet_dispatch_sim::Simulation;
use env_logger;


fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cfg_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: fleet_dispatch_sim <config.yaml>");
            std::process::exit(2);
        }
    };

    let mut sim = Simulation::from_cfg(&cfg_path)?;
    let num_ticks = sim.get_config().num_ticks;
    sim.run(num_ticks)?;
    log::info!("finished after {} simulated minutes", sim.get_clock_min());
    println!("{}", serde_json::to_string_pretty(&sim.metrics())?);
    Ok(())
}
