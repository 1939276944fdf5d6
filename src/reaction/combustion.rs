use super::gas::Mechanism;
use crate::error::{ConfigError, ConfigResult};
use dyn_clone::DynClone;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub trait Combustion: DynClone + Send + Sync {
    fn model_name(&self) -> &str;
    /// Adds the species mass production rates `[kg/s]` to `rates`. `species_mass` holds the
    /// cylinder content in kg, `angle` is the crank angle in radians. Whether the model is
    /// active is decided at `gate_angle`, which lets the caller hold it on one side of a
    /// switching angle.
    fn add_source_terms(
        &self,
        angle: f64,
        gate_angle: f64,
        angular_speed: f64,
        species_mass: ArrayView1<f64>,
        rates: ArrayViewMut1<f64>,
    );
    /// Crank angles [CA rad] at which the source terms jump
    fn switching_angles(&self) -> Vec<f64> {
        Vec::new()
    }
}

dyn_clone::clone_trait_object!(Combustion);

/// Global one-step combustion `CxHy + (x + y/4) O2 -> x CO2 + y/2 H2O` whose fuel consumption
/// follows a Wiebe burn profile. The released heat comes out of the formation enthalpies.
#[derive(Debug, Clone)]
pub struct WiebeCombustion {
    model_name: String,
    ini_combustion: f64, // [CA rad]
    wiebe_function: WiebeFunction,
    i_fuel: usize,
    i_o2: usize,
    i_co2: usize,
    i_h2o: usize,
    o2_per_fuel: f64,  // [kg/kg]
    co2_per_fuel: f64, // [kg/kg]
    h2o_per_fuel: f64, // [kg/kg]
}

impl WiebeCombustion {
    /// `ign_angle` and `wiebe.comb_duration` in crank-angle degrees
    pub fn new(
        fuel: &str,
        ign_angle: f64,
        wiebe: &WiebeFunction,
        mechanism: &Mechanism,
    ) -> ConfigResult<WiebeCombustion> {
        let (carbon, hydrogen) = hydrocarbon_atoms(fuel)
            .ok_or_else(|| ConfigError::Mechanism(format!("`{}` is not a CxHy fuel", fuel)))?;
        if !(wiebe.comb_duration > 0.0) || !(wiebe.a > 0.0) || wiebe.m < 0.0 {
            return Err(ConfigError::Mechanism(format!(
                "invalid Wiebe parameters: {:?}",
                wiebe
            )));
        }
        let index = |name: &str| {
            mechanism
                .species_index(name)
                .ok_or_else(|| ConfigError::UnknownSpecies(name.to_string()))
        };
        let i_fuel = index(fuel)?;
        let i_o2 = index("O2")?;
        let i_co2 = index("CO2")?;
        let i_h2o = index("H2O")?;

        let w = mechanism.molar_weights();
        let o2_per_fuel = (carbon + 0.25 * hydrogen) * w[i_o2] / w[i_fuel];
        let co2_per_fuel = carbon * w[i_co2] / w[i_fuel];
        let h2o_per_fuel = 0.5 * hydrogen * w[i_h2o] / w[i_fuel];

        Ok(WiebeCombustion {
            model_name: "Wiebe global reaction".to_string(),
            ini_combustion: ign_angle.to_radians().rem_euclid(4.0 * PI),
            wiebe_function: WiebeFunction::new(wiebe.a, wiebe.m, wiebe.comb_duration.to_radians()),
            i_fuel,
            i_o2,
            i_co2,
            i_h2o,
            o2_per_fuel,
            co2_per_fuel,
            h2o_per_fuel,
        })
    }

    /// Crank angle elapsed since ignition, `None` outside the burn window
    fn elapsed(&self, angle: f64) -> Option<f64> {
        let d_angle = (angle - self.ini_combustion).rem_euclid(4.0 * PI);
        if d_angle < self.wiebe_function.comb_duration {
            Some(d_angle)
        } else {
            None
        }
    }

    /// Angle elapsed since ignition at `angle` while the window is judged open at `gate_angle`,
    /// kept within `[0, comb_duration]`
    fn elapsed_gated(&self, angle: f64, gate_angle: f64) -> Option<f64> {
        let gate = self.elapsed(gate_angle)?;
        let shift = (angle - gate_angle + 2.0 * PI).rem_euclid(4.0 * PI) - 2.0 * PI;
        Some((gate + shift).max(0.0).min(self.wiebe_function.comb_duration))
    }

    pub fn ini_combustion(&self) -> f64 {
        self.ini_combustion
    }
}

impl Combustion for WiebeCombustion {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn add_source_terms(
        &self,
        angle: f64,
        gate_angle: f64,
        angular_speed: f64,
        species_mass: ArrayView1<f64>,
        mut rates: ArrayViewMut1<f64>,
    ) {
        let d_angle = match self.elapsed_gated(angle, gate_angle) {
            Some(d) => d,
            None => return,
        };
        let fuel = species_mass[self.i_fuel].max(0.0);
        let oxygen = species_mass[self.i_o2].max(0.0);
        let burnable = fuel.min(oxygen / self.o2_per_fuel);
        let burn_rate = self.wiebe_function.hazard(d_angle) * angular_speed * burnable; // [kg/s]

        rates[self.i_fuel] -= burn_rate;
        rates[self.i_o2] -= burn_rate * self.o2_per_fuel;
        rates[self.i_co2] += burn_rate * self.co2_per_fuel;
        rates[self.i_h2o] += burn_rate * self.h2o_per_fuel;
    }

    fn switching_angles(&self) -> Vec<f64> {
        let end = self.ini_combustion + self.wiebe_function.comb_duration;
        vec![self.ini_combustion, end.rem_euclid(4.0 * PI)]
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WiebeFunction {
    pub a: f64,
    pub m: f64,
    pub comb_duration: f64,
}

impl WiebeFunction {
    pub fn new(a: f64, m: f64, comb_duration: f64) -> WiebeFunction {
        WiebeFunction {
            a,
            m,
            comb_duration,
        }
    }

    /// `d_angle` is the angle elapsed since ignition, same unit as `comb_duration`
    #[cfg(test)]
    pub fn burned_mass_frac(&self, d_angle: f64) -> f64 {
        1.0 - (-self.a * (d_angle / self.comb_duration).powf(self.m + 1.0)).exp()
    }

    #[cfg(test)]
    pub fn derivative_burned_mass_frac(&self, d_angle: f64) -> f64 {
        let tmp = d_angle / self.comb_duration;
        self.a * (self.m + 1.0) / self.comb_duration
            * tmp.powf(self.m)
            * (-self.a * tmp.powf(self.m + 1.0)).exp()
    }

    /// Burn rate relative to the unburned fraction: `x_b' / (1 - x_b)`
    pub fn hazard(&self, d_angle: f64) -> f64 {
        let tmp = d_angle / self.comb_duration;
        self.a * (self.m + 1.0) / self.comb_duration * tmp.powf(self.m)
    }
}

#[derive(Debug, Clone)]
pub struct NoCombustion {
    model_name: String,
}

impl NoCombustion {
    pub fn new() -> NoCombustion {
        NoCombustion {
            model_name: "no combustion model".to_string(),
        }
    }
}

impl Combustion for NoCombustion {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn add_source_terms(&self, _: f64, _: f64, _: f64, _: ArrayView1<f64>, _: ArrayViewMut1<f64>) {}
}

/// Carbon and hydrogen atoms of a `CxHy` species name, e.g. `C12H26` -> `(12, 26)`
fn hydrocarbon_atoms(name: &str) -> Option<(f64, f64)> {
    let upper = name.trim().to_ascii_uppercase();
    let rest = upper.strip_prefix('C')?;
    let h_pos = rest.find('H')?;
    let carbon = if h_pos == 0 { 1.0 } else { rest[..h_pos].parse().ok()? };
    let hydrogen_str = &rest[h_pos + 1..];
    let hydrogen = if hydrogen_str.is_empty() { 1.0 } else { hydrogen_str.parse().ok()? };
    Some((carbon, hydrogen))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reaction::gas::Gas;
    use approx::assert_relative_eq;

    fn wiebe() -> WiebeCombustion {
        let gas = Gas::dodecane_air().unwrap();
        WiebeCombustion::new("C12H26", 350.0, &WiebeFunction::new(6.9, 2.0, 60.0), gas.mechanism())
            .unwrap()
    }

    #[test]
    fn parses_hydrocarbons() {
        assert_eq!(hydrocarbon_atoms("C12H26"), Some((12.0, 26.0)));
        assert_eq!(hydrocarbon_atoms("ch4"), Some((1.0, 4.0)));
        assert_eq!(hydrocarbon_atoms("N2"), None);
    }

    #[test]
    fn burned_fraction_profile() {
        let w = WiebeFunction::new(6.9, 2.0, 1.0);
        assert_eq!(w.burned_mass_frac(0.0), 0.0);
        assert!(w.burned_mass_frac(1.0) > 0.998);
        let x = 0.4;
        assert_relative_eq!(
            w.hazard(x),
            w.derivative_burned_mass_frac(x) / (1.0 - w.burned_mass_frac(x)),
            max_relative = 1e-12
        );
    }

    #[test]
    fn reaction_conserves_mass() {
        let comb = wiebe();
        let mass = array![3.0e-5, 2.0e-4, 6.0e-4, 0.0, 0.0];
        let mut rates = Array1::zeros(5);
        let angle = 370f64.to_radians();
        comb.add_source_terms(angle, angle, 314.0, mass.view(), rates.view_mut());
        assert!(rates[0] < 0.0);
        assert_relative_eq!(rates.sum(), 0.0, epsilon = 1e-12 * rates[0].abs());
    }

    #[test]
    fn window_wraps_around_cycle() {
        let gas = Gas::dodecane_air().unwrap();
        let comb = WiebeCombustion::new("C12H26", 700.0, &WiebeFunction::new(6.9, 2.0, 60.0), gas.mechanism())
            .unwrap();
        assert!(comb.elapsed(710f64.to_radians()).is_some());
        assert!(comb.elapsed(30f64.to_radians()).is_some());
        assert!(comb.elapsed(45f64.to_radians()).is_none());
        assert!(comb.elapsed(360f64.to_radians()).is_none());
    }

    #[test]
    fn no_fuel_no_reaction() {
        let comb = wiebe();
        let mass = array![0.0, 2.0e-4, 6.0e-4, 0.0, 0.0];
        let mut rates = Array1::zeros(5);
        let angle = 370f64.to_radians();
        comb.add_source_terms(angle, angle, 314.0, mass.view(), rates.view_mut());
        assert!(rates.iter().all(|r| *r == 0.0));
    }

    #[test]
    fn gate_angle_holds_the_window_state() {
        let comb = wiebe();
        let mass = array![3.0e-5, 2.0e-4, 6.0e-4, 0.0, 0.0];
        let end = 410f64.to_radians();
        let before = end - 1e-3;
        // evaluated exactly at the end of the burn with the window still open
        let mut rates = Array1::zeros(5);
        comb.add_source_terms(end, before, 314.0, mass.view(), rates.view_mut());
        let w = &comb.wiebe_function;
        assert_relative_eq!(
            -rates[0],
            w.hazard(w.comb_duration) * 314.0 * 3.0e-5,
            max_relative = 1e-12
        );
        // and slightly before the ignition with the window already open
        let start = 350f64.to_radians();
        let mut rates = Array1::zeros(5);
        comb.add_source_terms(start - 1e-12, start + 1e-3, 314.0, mass.view(), rates.view_mut());
        assert_eq!(rates[0], 0.0);
        let mut rates = Array1::zeros(5);
        comb.add_source_terms(end, end + 1e-3, 314.0, mass.view(), rates.view_mut());
        assert!(rates.iter().all(|r| *r == 0.0));

        let angles = comb.switching_angles();
        assert_relative_eq!(angles[0], start, epsilon = 1e-12);
        assert_relative_eq!(angles[1], end, epsilon = 1e-12);
    }
}
