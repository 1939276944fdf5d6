//! Error types shared by the calculator, the gas model and the cycle simulator.

use crate::numerics::ode_solvers::SolverError;
use crate::reaction::gas::Gas;
use thiserror::Error;

/// Invalid inputs detected before anything is integrated.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("`{name}` must be greater than zero: {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("compression ratio must be greater than one: {0}")]
    CompressionRatio(f64),

    #[error("timing window of `{name}` is empty: opens at {opening} and closes at {closing} [CA deg]")]
    EmptyWindow {
        name: String,
        opening: f64,
        closing: f64,
    },

    #[error("species `{0}` not found in the mechanism")]
    UnknownSpecies(String),

    #[error("malformed composition `{0}`")]
    Composition(String),

    #[error("invalid mechanism data: {0}")]
    Mechanism(String),

    #[error("object with the same name already exists: `{0}`")]
    DuplicateName(String),

    #[error("object `{0}` does not exist")]
    UnknownObject(String),

    #[error("invalid connection: {0}")]
    Connection(String),

    #[error("unknown combustion model `{0}`")]
    UnknownModel(String),

    #[error("invalid solver settings: {0}")]
    Solver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of a simulation run.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("integration failed at t = {time:.6e} s: {source}")]
    Integration {
        time: f64,
        last_state: Box<Gas>,
        #[source]
        source: SolverError,
    },

    #[error("unable to write results: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type SimulationResult<T> = Result<T, SimulationError>;

/// Returns `Ok(value)` if it is strictly positive and finite.
pub fn positive(name: &'static str, value: f64) -> ConfigResult<f64> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}
