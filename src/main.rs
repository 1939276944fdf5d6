use ansi_term::Style;
use diesel_engine_simulator as des;
use des::core::simulation::{filter_transient, write_pv_diagram, write_samples_to, Simulation};
use des::performance::{self, PerformanceInputs};
use des::{SimulationConfig, SimulationError};
use std::path::{Path, PathBuf};

/// Usage: `diesel_sim [config.json] [output_dir]`
fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(file) => SimulationConfig::from_file(&file),
        None => Ok(SimulationConfig::default()),
    };
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| ".".to_string()));

    if let Err(err) = config.map_err(SimulationError::from).and_then(|c| run(&c, &out_dir)) {
        log::error!("{}", err);
        eprintln!("Error at 'diesel_sim':\n {}", err);
        std::process::exit(1);
    }
}

fn run(config: &SimulationConfig, out_dir: &Path) -> Result<(), SimulationError> {
    std::fs::create_dir_all(out_dir)?;

    let mut simulation: Simulation = config.build_simulation()?;
    println!("{}", simulation.system().cylinder().kinematics());
    let samples = simulation.run()?;
    let cycle = filter_transient(&samples, config.transient_cutoff);
    write_pv_diagram(out_dir.join("pv_diagram.txt"), cycle)?;
    write_samples_to(out_dir.join("samples.txt"), &samples)?;

    let peak = cycle
        .iter()
        .map(|s| s.pressure_bar())
        .fold(std::f64::NEG_INFINITY, f64::max);
    simulation.system().print_state();
    let (accepted, rejected) = simulation.system().solver_statistics();
    println!("{}", Style::new().bold().paint("Cycle simulation"));
    println!("  samples: {} ({} after the transient)", samples.len(), cycle.len());
    println!("  peak pressure: {:.2} [bar]", peak);
    println!("  solver steps: {} accepted, {} rejected", accepted, rejected);

    let inputs = PerformanceInputs::default();
    let by_speed = performance::speed_sweep(&inputs, &performance::default_speeds())?;
    by_speed.write_to(out_dir.join("performance_speed.txt"), "speed [RPM]")?;
    let by_bore = performance::bore_sweep(&inputs, &performance::default_bores(), 3000.0)?;
    by_bore.write_to(out_dir.join("performance_bore.txt"), "bore [m]")?;

    println!("{}", Style::new().bold().paint("Performance"));
    println!(
        "  torque at {:.0} [RPM]: {:.2} [N.m]",
        by_speed.abscissa[by_speed.len() - 1],
        by_speed.torque[by_speed.len() - 1]
    );
    println!(
        "  power at {:.0} [mm] bore: {:.2} [kW]",
        by_bore.abscissa[by_bore.len() - 1] * 1e3,
        by_bore.power[by_bore.len() - 1]
    );
    println!("results written to {}", Style::new().underline().paint(out_dir.display().to_string()));
    Ok(())
}
