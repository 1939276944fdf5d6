use approx::assert_relative_eq;
use diesel_engine_simulator::core::simulation::{filter_transient, run_simulation};
use diesel_engine_simulator::ode_solvers::SolverError;
use diesel_engine_simulator::{SimulationConfig, SimulationError, SimulationSample};

fn peak_pressure(samples: &[SimulationSample]) -> f64 {
    samples
        .iter()
        .map(|s| s.pressure_bar())
        .fold(f64::NEG_INFINITY, f64::max)
}

#[test]
fn default_cycle() {
    let config = SimulationConfig::default();
    let kinematics = config.kinematics().unwrap();
    let geometry = kinematics.geometry();
    let samples = run_simulation(&config).unwrap();
    assert_eq!(samples.len(), 2880);
    assert_relative_eq!(samples[2879].time, 8.0 / 50.0, max_relative = 1e-12);

    for s in samples.iter() {
        assert!(s.pressure_bar() > 0.0 && s.pressure_bar() < 400.0, "P = {}", s.pressure_bar());
        assert!(s.volume >= geometry.clearance() * (1.0 - 1e-12));
        assert!(s.volume <= geometry.total_volume() * (1.0 + 1e-12));
        assert!(s.gas.T() > 200.0 && s.gas.T() < 5000.0);
        assert!(s.mass > 0.0);
    }

    // one volume minimum per revolution, every 360 samples
    let minima: Vec<usize> = (1..samples.len() - 1)
        .filter(|&i| samples[i].volume < samples[i - 1].volume && samples[i].volume < samples[i + 1].volume)
        .collect();
    assert_eq!(minima, vec![359, 719, 1079, 1439, 1799, 2159, 2519]);

    // cylinder mass follows the connector tallies
    let (first, last) = (&samples[0], &samples[2879]);
    assert_relative_eq!(
        last.mass - first.mass,
        (last.intake_mass - first.intake_mass) + (last.injected_mass - first.injected_mass)
            - (last.exhaust_mass - first.exhaust_mass),
        epsilon = 1e-6 * first.mass
    );

    // four injections of 32 mg each
    assert_relative_eq!(last.injected_mass, 4.0 * 3.2e-5, max_relative = 0.02);

    // valve gates
    for s in samples.iter() {
        let angle = s.crank_angle_deg().rem_euclid(720.0);
        if angle > 30.0 && angle < 510.0 {
            assert_eq!(s.exhaust_flow, 0.0, "exhaust open at {} deg", angle);
        }
        if angle > 210.0 && angle < 690.0 {
            assert_eq!(s.intake_flow, 0.0, "intake open at {} deg", angle);
        }
        if !(angle > 349.0 && angle < 366.0) {
            assert_eq!(s.injector_flow, 0.0, "injector open at {} deg", angle);
        }
    }

    let cycle = filter_transient(&samples, config.transient_cutoff);
    assert!(!cycle.is_empty());
    assert!(cycle.iter().all(|s| s.time > config.transient_cutoff));
    // compression alone from 1.3 bar at r = 14 exceeds 30 bar
    assert!(peak_pressure(cycle) > 30.0);
}

#[test]
fn crank_angle_is_periodic() {
    let mut config = SimulationConfig::default();
    config.n_revolutions = 2.0;
    let mut simulation = config.build_simulation().unwrap();
    let initial_mass = simulation.system().cylinder().mass();
    let samples = simulation.run().unwrap();
    assert_eq!(samples.len(), 720);
    assert_relative_eq!(
        simulation.system().cylinder().mass() - initial_mass,
        simulation.system().net_inflow(),
        epsilon = 1e-6 * initial_mass
    );
    assert_relative_eq!(samples[359].crank_angle_deg(), 360.0, epsilon = 1e-6);
    assert!(samples[719].crank_angle_deg() < 1e-6 || samples[719].crank_angle_deg() > 720.0 - 1e-6);
    assert_relative_eq!(samples[89].volume, samples[449].volume, max_relative = 1e-12);
}

#[test]
fn combustion_raises_the_peak_pressure() {
    let mut fired = SimulationConfig::default();
    fired.n_revolutions = 4.0;
    let mut motored = fired.clone();
    motored.combustion.model = "none".to_string();

    let fired = run_simulation(&fired).unwrap();
    let motored = run_simulation(&motored).unwrap();
    assert_eq!(fired.len(), motored.len());
    let second_cycle = |s: &[SimulationSample]| peak_pressure(&s[720..]);
    assert!(second_cycle(&fired) > second_cycle(&motored));
    // same charge before the first injection
    assert_relative_eq!(fired[300].pressure_bar(), motored[300].pressure_bar(), max_relative = 1e-4);
}

#[test]
fn rejects_unknown_combustion_model() {
    let mut config = SimulationConfig::default();
    config.combustion.model = "spark".to_string();
    assert!(run_simulation(&config).is_err());
}

#[test]
fn tight_tolerances_cross_the_valve_openings() {
    let mut config = SimulationConfig::default();
    config.n_revolutions = 1.5;
    config.solver.rtol = 1e-12;
    config.solver.atol = 1e-16;
    let samples = run_simulation(&config).unwrap();
    assert_eq!(samples.len(), 540);
    // exhaust opens at 522 degrees, blowing down the expanded charge
    let blowdown = &samples[529];
    assert_relative_eq!(blowdown.crank_angle_deg(), 530.0, epsilon = 1e-6);
    assert!(blowdown.exhaust_flow > 0.0);
    assert!(samples.iter().all(|s| s.pressure_bar() > 0.0));
}

#[test]
fn failed_integration_keeps_the_last_state() {
    let mut config = SimulationConfig::default();
    config.solver.max_steps = 1;
    let mut simulation = config.build_simulation().unwrap();
    let initial_pressure = simulation.system().cylinder().gas().P();
    match simulation.run() {
        Err(SimulationError::Integration {
            time,
            last_state,
            source,
        }) => {
            assert_eq!(time, simulation.system().time());
            assert_eq!(time, 0.0);
            assert!(last_state.P() > 0.0);
            assert_relative_eq!(last_state.P(), initial_pressure);
            assert_eq!(source, SolverError::TooManySteps(1));
        }
        other => panic!("expected an integration error, got {:?}", other.map(|s| s.len())),
    }
}
