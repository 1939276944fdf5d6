use super::system::System;
use super::traits::SaveData;
use crate::engine::config::{SimulationConfig, EXHAUST_VALVE, INJECTOR, INTAKE_VALVE};
use crate::error::{ConfigError, ConfigResult, SimulationResult};
use crate::reaction::gas::Gas;
use ndarray::*;
use rayon::prelude::*;
use std::io::Write;
use std::path::Path;

/// Cylinder state and device flows recorded after each simulation step
#[derive(Debug, Clone)]
pub struct SimulationSample {
    pub time: f64,           // [s]
    pub crank_angle: f64,    // [CA rad]
    pub volume: f64,         // [m³]
    pub mass: f64,           // [kg]
    pub intake_flow: f64,    // [kg/s]
    pub exhaust_flow: f64,   // [kg/s]
    pub injector_flow: f64,  // [kg/s]
    pub wall_work_rate: f64, // [W]
    pub intake_mass: f64,    // [kg] since the start
    pub exhaust_mass: f64,   // [kg] since the start
    pub injected_mass: f64,  // [kg] since the start
    pub gas: Gas,
}

impl SimulationSample {
    pub fn from_system(system: &System) -> SimulationSample {
        let cyl = system.cylinder();
        let flows = system.mass_flows();
        let names = system.connector_names();
        let flow_of = |name: &str| {
            names
                .iter()
                .position(|n| *n == name)
                .map_or(0.0, |i| flows[i])
        };
        SimulationSample {
            time: system.time(),
            crank_angle: cyl.crank_angle(),
            volume: cyl.volume(),
            mass: cyl.mass(),
            intake_flow: flow_of(INTAKE_VALVE),
            exhaust_flow: flow_of(EXHAUST_VALVE),
            injector_flow: flow_of(INJECTOR),
            wall_work_rate: system.wall_work_rate(),
            intake_mass: system.throughput(INTAKE_VALVE).unwrap_or(0.0),
            exhaust_mass: system.throughput(EXHAUST_VALVE).unwrap_or(0.0),
            injected_mass: system.throughput(INJECTOR).unwrap_or(0.0),
            gas: cyl.gas().clone(),
        }
    }

    /// [L]
    pub fn volume_liters(&self) -> f64 {
        self.volume * 1e3
    }

    /// [bar]
    pub fn pressure_bar(&self) -> f64 {
        self.gas.P() / 1e5
    }

    /// [CA deg]
    pub fn crank_angle_deg(&self) -> f64 {
        self.crank_angle.to_degrees()
    }
}

impl SaveData for SimulationSample {
    fn get_headers(&self) -> String {
        "time [s]\tcrank-angle [deg]\tvolume [L]\tpressure [bar]\ttemperature [K]\tmass [mg]\t\
         intake flow [kg/s]\texhaust flow [kg/s]\tinjector flow [kg/s]\twall work rate [W]\t\
         intake mass [mg]\texhaust mass [mg]\tinjected mass [mg]"
            .to_string()
    }
    fn num_storable_variables(&self) -> usize {
        13
    }
    fn get_storable_data(&self) -> Array1<f64> {
        array![
            self.time,
            self.crank_angle_deg(),
            self.volume_liters(),
            self.pressure_bar(),
            self.gas.T(),
            self.mass * 1e6,
            self.intake_flow,
            self.exhaust_flow,
            self.injector_flow,
            self.wall_work_rate,
            self.intake_mass * 1e6,
            self.exhaust_mass * 1e6,
            self.injected_mass * 1e6
        ]
    }
}

/// Drives a `System` over a whole number of crank-angle degrees, one sample per degree.
pub struct Simulation {
    system: System,
    dt: f64, // [s]
    n_steps: usize,
}

impl Simulation {
    /// `n_revolutions` of the crankshaft, sampled every crank-angle degree
    pub fn new(system: System, n_revolutions: f64) -> ConfigResult<Simulation> {
        if !(n_revolutions > 0.0) || !n_revolutions.is_finite() {
            return Err(ConfigError::NonPositive {
                name: "number of revolutions",
                value: n_revolutions,
            });
        }
        let dt = system.cylinder().kinematics().time_per_degree();
        let n_steps = (360.0 * n_revolutions).round() as usize;
        if n_steps == 0 {
            return Err(ConfigError::NonPositive {
                name: "number of steps",
                value: 0.0,
            });
        }
        Ok(Simulation {
            system,
            dt,
            n_steps,
        })
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// [s]
    pub fn time_step(&self) -> f64 {
        self.dt
    }

    /// Advances the system step by step and returns one sample per step
    pub fn run(&mut self) -> SimulationResult<Vec<SimulationSample>> {
        log::info!(
            "simulating {} steps of {:.3e} s, combustion: {}",
            self.n_steps,
            self.dt,
            self.system.cylinder().combustion_model()
        );
        let t_start = self.system.time();
        let mut samples: Vec<SimulationSample> = Vec::with_capacity(self.n_steps);
        let mut max_pressure: f64 = 0.0;
        for i in 1..=self.n_steps {
            self.system.advance(t_start + i as f64 * self.dt)?;
            let sample = SimulationSample::from_system(&self.system);
            max_pressure = max_pressure.max(sample.pressure_bar());
            samples.push(sample);
            if i % 360 == 0 {
                let (accepted, rejected) = self.system.solver_statistics();
                log::debug!(
                    "revolution {} done: max pressure {:.2} bar, {} steps accepted, {} rejected",
                    i / 360,
                    max_pressure,
                    accepted,
                    rejected
                );
                max_pressure = 0.0;
            }
        }
        log::info!(
            "simulation finished at t = {:.4} s, cylinder mass {:.2} mg",
            self.system.time(),
            self.system.cylinder().mass() * 1e6
        );
        Ok(samples)
    }
}

/// Builds and runs the simulation described by `config`
pub fn run_simulation(config: &SimulationConfig) -> SimulationResult<Vec<SimulationSample>> {
    let mut simulation = config.build_simulation()?;
    simulation.run()
}

/// Runs independent configurations in parallel. Results keep the order of `configs`.
pub fn simulate_sweep(configs: &[SimulationConfig]) -> Vec<SimulationResult<Vec<SimulationSample>>> {
    log::info!("running a sweep of {} simulations", configs.len());
    configs.par_iter().map(run_simulation).collect()
}

/// Samples recorded after `t_min` [s]
pub fn filter_transient(samples: &[SimulationSample], t_min: f64) -> &[SimulationSample] {
    let first = samples.partition_point(|s| s.time <= t_min);
    &samples[first..]
}

/// Writes every sample as a tab-separated table with headers
pub fn write_samples_to<P: AsRef<Path>>(path: P, samples: &[SimulationSample]) -> std::io::Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    if let Some(first) = samples.first() {
        writeln!(file, "{}", first.get_headers())?;
    }
    for sample in samples {
        let row: Vec<String> = sample
            .get_storable_data()
            .iter()
            .map(|v| format!("{:.6e}", v))
            .collect();
        writeln!(file, "{}", row.join("\t"))?;
    }
    file.flush()
}

/// Writes the volume [L] and pressure [bar] columns of a P-V diagram
pub fn write_pv_diagram<P: AsRef<Path>>(path: P, samples: &[SimulationSample]) -> std::io::Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(file, "volume [L]\tpressure [bar]")?;
    for sample in samples {
        writeln!(file, "{:.6e}\t{:.6e}", sample.volume_liters(), sample.pressure_bar())?;
    }
    file.flush()
}
