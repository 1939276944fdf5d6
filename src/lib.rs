//! # diesel_engine_simulator
//!
//! The `diesel_engine_simulator` crate computes performance curves of a diesel engine and simulates
//! its pressure-volume cycle with a zero-dimensional reactor network: a cylinder exchanging mass
//! with intake, exhaust and injector reservoirs and work with the ambient through the piston.

use ndarray::*;
use std::ops::Add;

pub mod connector;
pub mod core;
pub mod engine;
pub mod error;
pub mod numerics;
pub mod reaction;
pub mod zero_dim;

// Re-exporting
pub use crate::core::simulation::{simulate_sweep, Simulation, SimulationSample};
pub use crate::core::system::System;
pub use crate::core::system_builder::SystemBuilder;
pub use crate::engine::config::SimulationConfig;
pub use crate::engine::performance;
pub use crate::error::{ConfigError, SimulationError};
pub use crate::numerics::ode_solvers;
pub use crate::reaction::gas::Gas;

/// Thermodynamic state of an object as seen by the connectors
#[derive(Debug)]
pub struct BasicProperties<'a> {
    pub name: &'a str,
    pub pressure: f64,    // Pa
    pub temperature: f64, // K
    pub enthalpy: f64,    // J/kg
    pub mass_frac: &'a Array1<f64>,
}

impl<'a> std::fmt::Display for BasicProperties<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:
        pressure: {} [Pa]
        temperature: {} [K]
        enthalpy: {} [J/kg]",
            self.name, self.pressure, self.temperature, self.enthalpy
        )
    }
}

/// Mass, enthalpy and species flows entering an object
#[derive(Debug, Clone)]
pub struct FlowRatio {
    pub mass_flow: f64,            // kg/s
    pub enthalpy_flow: f64,        // J/s
    pub species_flow: Array1<f64>, // kg/s
}

impl FlowRatio {
    pub fn new(n_species: usize) -> FlowRatio {
        FlowRatio {
            mass_flow: 0.0,
            enthalpy_flow: 0.0,
            species_flow: Array1::zeros(n_species),
        }
    }

    /// Flow of `mass_flow` [kg/s] carrying the properties of `upstream`
    pub fn from_stream(mass_flow: f64, upstream: &BasicProperties) -> FlowRatio {
        FlowRatio {
            mass_flow,
            enthalpy_flow: mass_flow * upstream.enthalpy,
            species_flow: upstream.mass_frac * mass_flow,
        }
    }
}

impl Add for FlowRatio {
    type Output = FlowRatio;
    fn add(self, other: FlowRatio) -> FlowRatio {
        &self + &other
    }
}

impl<'a, 'b> Add<&'b FlowRatio> for &'a FlowRatio {
    type Output = FlowRatio;
    fn add(self, other: &'b FlowRatio) -> FlowRatio {
        FlowRatio {
            mass_flow: self.mass_flow + other.mass_flow,
            enthalpy_flow: self.enthalpy_flow + other.enthalpy_flow,
            species_flow: &self.species_flow + &other.species_flow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn stream_carries_upstream_properties() {
        let mass_frac = array![0.25, 0.75];
        let props = BasicProperties {
            name: "res",
            pressure: 1e5,
            temperature: 300.0,
            enthalpy: 2.0e3,
            mass_frac: &mass_frac,
        };
        let flow = FlowRatio::from_stream(0.5, &props) + FlowRatio::new(2);
        assert_relative_eq!(flow.enthalpy_flow, 1.0e3);
        assert_relative_eq!(flow.species_flow.sum(), flow.mass_flow);
        assert_relative_eq!(flow.species_flow[0], 0.125);
    }
}
