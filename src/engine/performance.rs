//! Closed-form torque, power and specific consumption curves of an ideal-gas engine.
//!
//! Engine speeds are given in RPM and enter the torque relation as such.

use crate::error::{positive, ConfigError, ConfigResult};
use ndarray::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::io::Write;
use std::path::Path;

/// Floor added to the power [kW] in the specific consumption denominator
pub const POWER_FLOOR: f64 = 1e-10;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PerformanceInputs {
    pub displacement: f64,        // [m³]
    pub compression_ratio: f64,   // [-]
    pub gas_const: f64,           // [J/(kg.K)]
    pub heat_capacity_ratio: f64, // [-]
    pub ambient_pressure: f64,    // [Pa]
    pub ambient_temperature: f64, // [K]
    pub n_cylinders: f64,         // [-]
    pub bore: f64,                // [m]
}

impl Default for PerformanceInputs {
    fn default() -> Self {
        PerformanceInputs {
            displacement: 24.2 / 1000.0,
            compression_ratio: 14.0,
            gas_const: 287.0,
            heat_capacity_ratio: 1.4,
            ambient_pressure: 101325.0,
            ambient_temperature: 298.15,
            n_cylinders: 12.0,
            bore: 0.128,
        }
    }
}

impl PerformanceInputs {
    pub fn validate(&self) -> ConfigResult<()> {
        positive("displacement", self.displacement)?;
        if !(self.compression_ratio > 1.0) {
            return Err(ConfigError::CompressionRatio(self.compression_ratio));
        }
        positive("gas constant", self.gas_const)?;
        positive("heat capacity ratio", self.heat_capacity_ratio)?;
        positive("ambient pressure", self.ambient_pressure)?;
        positive("ambient temperature", self.ambient_temperature)?;
        positive("number of cylinders", self.n_cylinders)?;
        positive("bore", self.bore)?;
        Ok(())
    }

    /// Clearance volume [m³]
    pub fn combustion_volume(&self) -> f64 {
        self.displacement / (self.compression_ratio - 1.0)
    }

    /// Mass of ambient air [kg] filling the clearance volume
    pub fn air_mass(&self) -> f64 {
        self.ambient_pressure * self.combustion_volume() / (self.gas_const * self.ambient_temperature)
    }

    /// `m γ R T` [J]
    fn charge_energy(&self) -> f64 {
        self.air_mass() * self.heat_capacity_ratio * self.gas_const * self.ambient_temperature
    }
}

/// Torque [N.m] at `speed` [RPM] for a piston of diameter `bore` [m]
pub fn calc_torque(inputs: &PerformanceInputs, speed: f64, bore: f64) -> f64 {
    let v_comb = inputs.combustion_volume();
    inputs.charge_energy()
        * (1.0 - 1.0 / (speed * inputs.n_cylinders * v_comb))
        * (bore / 2.0).powi(2)
        * PI
}

/// Power [kW] from `torque` [N.m] at `speed` [RPM]
pub fn calc_power(torque: f64, speed: f64) -> f64 {
    torque * speed * 2.0 * PI / 60.0 / 1000.0
}

/// Specific consumption: charge energy over power. Near zero power the `POWER_FLOOR` keeps it
/// large but finite.
pub fn calc_specific_consumption(inputs: &PerformanceInputs, power: f64) -> f64 {
    inputs.charge_energy() / (power + POWER_FLOOR)
}

/// Equal-length curves over a swept variable
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceCurves {
    pub abscissa: Array1<f64>,
    pub torque: Array1<f64>,               // [N.m]
    pub power: Array1<f64>,                // [kW]
    pub specific_consumption: Array1<f64>, // [J/kW]
}

impl PerformanceCurves {
    fn evaluate<F>(inputs: &PerformanceInputs, abscissa: Array1<f64>, speed_and_bore: F) -> PerformanceCurves
    where
        F: Fn(f64) -> (f64, f64),
    {
        let n = abscissa.len();
        let mut torque = Array1::zeros(n);
        let mut power = Array1::zeros(n);
        let mut specific_consumption = Array1::zeros(n);
        for (i, x) in abscissa.iter().enumerate() {
            let (speed, bore) = speed_and_bore(*x);
            torque[i] = calc_torque(inputs, speed, bore);
            power[i] = calc_power(torque[i], speed);
            specific_consumption[i] = calc_specific_consumption(inputs, power[i]);
        }
        PerformanceCurves {
            abscissa,
            torque,
            power,
            specific_consumption,
        }
    }

    pub fn len(&self) -> usize {
        self.abscissa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abscissa.is_empty()
    }

    /// Writes the curves as a tab-separated table; `abscissa_header` names the first column
    pub fn write_to<P: AsRef<Path>>(&self, path: P, abscissa_header: &str) -> std::io::Result<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        writeln!(
            file,
            "{}\ttorque [N.m]\tpower [kW]\tspecific consumption [J/kW]",
            abscissa_header
        )?;
        for i in 0..self.len() {
            writeln!(
                file,
                "{:.6e}\t{:.6e}\t{:.6e}\t{:.6e}",
                self.abscissa[i], self.torque[i], self.power[i], self.specific_consumption[i]
            )?;
        }
        file.flush()
    }
}

/// Curves over engine `speeds` [RPM] at the bore of `inputs`
pub fn speed_sweep(inputs: &PerformanceInputs, speeds: &Array1<f64>) -> ConfigResult<PerformanceCurves> {
    inputs.validate()?;
    for speed in speeds.iter() {
        positive("engine speed", *speed)?;
    }
    log::info!("evaluating performance over {} engine speeds", speeds.len());
    Ok(PerformanceCurves::evaluate(inputs, speeds.clone(), |speed| {
        (speed, inputs.bore)
    }))
}

/// Curves over piston diameters `bores` [m] at a fixed `speed` [RPM]
pub fn bore_sweep(
    inputs: &PerformanceInputs,
    bores: &Array1<f64>,
    speed: f64,
) -> ConfigResult<PerformanceCurves> {
    inputs.validate()?;
    let speed = positive("engine speed", speed)?;
    for bore in bores.iter() {
        positive("bore", *bore)?;
    }
    log::info!("evaluating performance over {} bores at {} RPM", bores.len(), speed);
    Ok(PerformanceCurves::evaluate(inputs, bores.clone(), |bore| {
        (speed, bore)
    }))
}

/// 100 speeds from 1000 to 6000 RPM
pub fn default_speeds() -> Array1<f64> {
    Array1::linspace(1000.0, 6000.0, 100)
}

/// Bores from 150 to 170 mm every 2 mm, in meters
pub fn default_bores() -> Array1<f64> {
    Array1::linspace(150.0, 170.0, 11) / 1000.0
}
