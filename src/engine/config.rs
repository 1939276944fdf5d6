use super::kinematics::{CrankKinematics, Geometry};
use crate::core::simulation::Simulation;
use crate::core::system::System;
use crate::core::system_builder::SystemBuilder;
use crate::error::{positive, ConfigError, ConfigResult};
use crate::reaction::combustion::{Combustion, NoCombustion, WiebeCombustion, WiebeFunction};
use crate::reaction::gas::Gas;
use serde::{Deserialize, Serialize};

// Object names of the network built from a `SimulationConfig`
pub const CYLINDER: &str = "cylinder";
pub const INTAKE: &str = "intake";
pub const EXHAUST: &str = "exhaust";
pub const FUEL: &str = "fuel";
pub const AMBIENT: &str = "ambient";
pub const INTAKE_VALVE: &str = "intake_valve";
pub const EXHAUST_VALVE: &str = "exhaust_valve";
pub const INJECTOR: &str = "injector";
pub const PISTON: &str = "piston";

const AIR: &str = "O2:27.75, N2:69.56";

/// Cycle simulation inputs. Partial JSON files override the default scenario.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Mechanism file; the embedded n-dodecane/air mechanism when absent
    pub mechanism: Option<String>,
    pub engine: EngineConfig,
    pub intake: ReservoirConfig,
    pub exhaust: ReservoirConfig,
    pub fuel: ReservoirConfig,
    pub ambient: ReservoirConfig,
    pub intake_valve: ValveConfig,
    pub exhaust_valve: ValveConfig,
    pub injector: InjectorConfig,
    pub combustion: CombustionConfig,
    pub solver: SolverConfig,
    pub n_revolutions: f64,
    pub transient_cutoff: f64, // [s]
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub speed: f64,             // [RPM]
    pub displacement: f64,      // [cm³]
    pub compression_ratio: f64, // [-]
    pub bore: f64,              // [mm]
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReservoirConfig {
    pub temperature: f64, // [K]
    pub pressure: f64,    // [Pa]
    pub composition: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ValveConfig {
    pub opening_angle: f64, // [CA deg]
    pub closing_angle: f64, // [CA deg]
    pub coeff: f64,         // [kg/(s.Pa)]
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct InjectorConfig {
    pub opening_angle: f64, // [CA deg]
    pub closing_angle: f64, // [CA deg]
    pub injected_mass: f64, // [kg] per cycle
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CombustionConfig {
    /// `"wiebe"` or `"none"`
    pub model: String,
    pub fuel: String,
    pub comb_ini: f64, // [CA deg]
    pub wiebe: WiebeFunction,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SolverConfig {
    pub rtol: f64,
    pub atol: f64,
    pub max_temperature_step: f64, // [K]
    pub max_steps: usize,
    pub min_step: f64, // [s]
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            mechanism: None,
            engine: EngineConfig::default(),
            intake: ReservoirConfig::new(300.0, 1.3e5, AIR),
            exhaust: ReservoirConfig::new(300.0, 1.2e5, AIR),
            fuel: ReservoirConfig::new(300.0, 1600e5, "C12H26:1"),
            ambient: ReservoirConfig::new(300.0, 1e5, AIR),
            intake_valve: ValveConfig {
                opening_angle: -18.0,
                closing_angle: 198.0,
                coeff: 1e-6,
            },
            exhaust_valve: ValveConfig {
                opening_angle: 522.0,
                closing_angle: 18.0,
                coeff: 1e-6,
            },
            injector: InjectorConfig::default(),
            combustion: CombustionConfig::default(),
            solver: SolverConfig::default(),
            n_revolutions: 8.0,
            transient_cutoff: 0.04,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            speed: 3000.0,
            displacement: 500.0,
            compression_ratio: 14.0,
            bore: 128.0,
        }
    }
}

impl ReservoirConfig {
    pub fn new(temperature: f64, pressure: f64, composition: &str) -> ReservoirConfig {
        ReservoirConfig {
            temperature,
            pressure,
            composition: composition.to_string(),
        }
    }

    fn gas(&self, base: &Gas) -> ConfigResult<Gas> {
        let mut gas = base.clone();
        gas.TPX(
            positive("temperature", self.temperature)?,
            positive("pressure", self.pressure)?,
            &self.composition,
        )?;
        Ok(gas)
    }
}

impl Default for ReservoirConfig {
    fn default() -> Self {
        ReservoirConfig::new(300.0, 1e5, AIR)
    }
}

impl Default for ValveConfig {
    fn default() -> Self {
        ValveConfig {
            opening_angle: 0.0,
            closing_angle: 180.0,
            coeff: 1e-6,
        }
    }
}

impl Default for InjectorConfig {
    fn default() -> Self {
        InjectorConfig {
            opening_angle: 350.0,
            closing_angle: 365.0,
            injected_mass: 3.2e-5,
        }
    }
}

impl Default for CombustionConfig {
    fn default() -> Self {
        CombustionConfig {
            model: "wiebe".to_string(),
            fuel: "C12H26".to_string(),
            comb_ini: 350.0,
            wiebe: WiebeFunction::new(6.9, 2.0, 60.0),
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            rtol: 1e-6,
            atol: 1e-12,
            max_temperature_step: 20.0,
            max_steps: 100_000,
            min_step: 1e-14,
        }
    }
}

impl SimulationConfig {
    /// Reads a `.json` configuration file
    pub fn from_file(file_name: &str) -> ConfigResult<SimulationConfig> {
        let json_file = std::fs::read_to_string(file_name)?;
        SimulationConfig::from_json(&json_file)
    }

    pub fn from_json(json: &str) -> ConfigResult<SimulationConfig> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks the scalar inputs; compositions and timing windows are checked while building
    pub fn validate(&self) -> ConfigResult<()> {
        positive("engine speed", self.engine.speed)?;
        positive("displacement", self.engine.displacement)?;
        positive("bore", self.engine.bore)?;
        if !(self.engine.compression_ratio > 1.0) {
            return Err(ConfigError::CompressionRatio(self.engine.compression_ratio));
        }
        positive("number of revolutions", self.n_revolutions)?;
        if !(self.transient_cutoff >= 0.0) {
            return Err(ConfigError::NonPositive {
                name: "transient cut-off",
                value: self.transient_cutoff,
            });
        }
        positive("intake valve coefficient", self.intake_valve.coeff)?;
        positive("exhaust valve coefficient", self.exhaust_valve.coeff)?;
        positive("injected mass", self.injector.injected_mass)?;
        positive("maximum temperature step", self.solver.max_temperature_step)?;
        positive("minimum step", self.solver.min_step)?;
        if !(self.solver.rtol > 0.0 && self.solver.rtol < 1.0) || !(self.solver.atol > 0.0) {
            return Err(ConfigError::Solver(format!(
                "tolerances must be positive and rtol below one: rtol = {}, atol = {}",
                self.solver.rtol, self.solver.atol
            )));
        }
        match self.combustion.model.to_lowercase().as_str() {
            "wiebe" | "none" => Ok(()),
            other => Err(ConfigError::UnknownModel(other.to_string())),
        }
    }

    /// Engine speed [RPS]
    pub fn speed(&self) -> f64 {
        self.engine.speed / 60.0
    }

    pub fn kinematics(&self) -> ConfigResult<CrankKinematics> {
        let geometry = Geometry::new(
            self.engine.bore * 1e-3,
            self.engine.displacement * 1e-6,
            self.engine.compression_ratio,
        )?;
        CrankKinematics::new(self.speed(), geometry)
    }

    /// Gas of the configured mechanism at its file's default state
    pub fn gas(&self) -> ConfigResult<Gas> {
        match &self.mechanism {
            Some(file) => Gas::new(file),
            None => Gas::dodecane_air(),
        }
    }

    fn combustion_model(&self, gas: &Gas) -> ConfigResult<Box<dyn Combustion>> {
        match self.combustion.model.to_lowercase().as_str() {
            "wiebe" => Ok(Box::new(WiebeCombustion::new(
                &self.combustion.fuel,
                self.combustion.comb_ini,
                &self.combustion.wiebe,
                gas.mechanism(),
            )?)),
            "none" => Ok(Box::new(NoCombustion::new())),
            other => Err(ConfigError::UnknownModel(other.to_string())),
        }
    }

    /// Builds the network: cylinder, intake, exhaust, fuel and ambient reservoirs, the two valves,
    /// the injector and the piston. The cylinder starts at top-dead-center in the intake state.
    pub fn build_system(&self) -> ConfigResult<System> {
        self.validate()?;
        let base = self.gas()?;
        let intake = self.intake.gas(&base)?;
        let exhaust = self.exhaust.gas(&base)?;
        let fuel = self.fuel.gas(&base)?;
        let ambient = self.ambient.gas(&base)?;
        let combustion = self.combustion_model(&base)?;

        let mut builder = SystemBuilder::new();
        builder
            .set_tolerances(self.solver.rtol, self.solver.atol)?
            .set_max_temperature_step(self.solver.max_temperature_step)?
            .set_max_steps(self.solver.max_steps)?
            .set_min_step(self.solver.min_step)?
            .add_reservoir(INTAKE, &intake)?
            .add_reservoir(EXHAUST, &exhaust)?
            .add_reservoir(FUEL, &fuel)?
            .add_reservoir(AMBIENT, &ambient)?
            .add_cylinder(CYLINDER, &intake, self.kinematics()?, combustion)?
            .add_valve(
                INTAKE_VALVE,
                self.intake_valve.opening_angle,
                self.intake_valve.closing_angle,
                self.intake_valve.coeff,
            )?
            .connect_from_to(INTAKE_VALVE, INTAKE, CYLINDER)?
            .add_valve(
                EXHAUST_VALVE,
                self.exhaust_valve.opening_angle,
                self.exhaust_valve.closing_angle,
                self.exhaust_valve.coeff,
            )?
            .connect_from_to(EXHAUST_VALVE, CYLINDER, EXHAUST)?
            .add_injector(
                INJECTOR,
                self.injector.opening_angle,
                self.injector.closing_angle,
                self.injector.injected_mass,
            )?
            .connect_from_to(INJECTOR, FUEL, CYLINDER)?
            .add_wall(PISTON, AMBIENT)?;
        builder.build_system()
    }

    pub fn build_simulation(&self) -> ConfigResult<Simulation> {
        Simulation::new(self.build_system()?, self.n_revolutions)
    }
}
