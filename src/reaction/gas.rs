#![allow(non_snake_case)]

use super::json_data;
use super::thermo::{SpeciesThermo, R_UNIVERSAL};
use crate::error::{ConfigError, ConfigResult};
use ndarray::prelude::*;
use std::sync::Arc;

/// n-dodecane/air mechanism shipped with the crate
pub const DODECANE_AIR: &str = include_str!("../../data/dodecane_air.json");

/// Temperature range [K] in which a gas state is considered physically valid
pub const VALID_TEMPERATURE: (f64, f64) = (100.0, 6000.0);

/// Species table shared by every `Gas` created from the same file.
#[derive(Debug)]
pub struct Mechanism {
    name: String,
    species: Vec<SpeciesThermo>,
    molar_weights: Array1<f64>,
}

impl Mechanism {
    fn new(name: String, species: Vec<SpeciesThermo>) -> Mechanism {
        let molar_weights = species.iter().map(|s| s.molecular_weight()).collect();
        Mechanism {
            name,
            species,
            molar_weights,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_species(&self) -> usize {
        self.species.len()
    }

    pub fn species_names(&self) -> Vec<&str> {
        self.species.iter().map(|s| s.name()).collect()
    }

    pub fn species_index(&self, name: &str) -> Option<usize> {
        self.species
            .iter()
            .position(|s| s.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn molar_weights(&self) -> &Array1<f64> {
        &self.molar_weights
    }

    /// Mean molecular weight [kg/kmol] of a mixture given by mass fractions
    pub fn mean_molecular_weight(&self, mass_frac: &Array1<f64>) -> f64 {
        1.0 / (mass_frac / &self.molar_weights).sum()
    }

    /// Specific gas constant [J/(kg.K)]
    pub fn gas_const(&self, mass_frac: &Array1<f64>) -> f64 {
        R_UNIVERSAL / self.mean_molecular_weight(mass_frac)
    }

    /// [J/(kg.K)]
    pub fn cp_mass(&self, mass_frac: &Array1<f64>, temp: f64) -> f64 {
        self.species
            .iter()
            .zip(mass_frac.iter())
            .map(|(s, y)| y * s.cp_mass(temp))
            .sum()
    }

    /// [J/kg], includes enthalpy of formation
    pub fn h_mass(&self, mass_frac: &Array1<f64>, temp: f64) -> f64 {
        self.species
            .iter()
            .zip(mass_frac.iter())
            .map(|(s, y)| y * s.h_mass(temp))
            .sum()
    }

    /// [J/kg]
    pub fn u_mass(&self, mass_frac: &Array1<f64>, temp: f64) -> f64 {
        self.h_mass(mass_frac, temp) - self.gas_const(mass_frac) * temp
    }

    /// Solves `u(T) = u_target` with Newton's method starting from `guess`.
    /// Returns `None` if the iteration leaves `VALID_TEMPERATURE` or does not converge.
    pub fn temperature_from_energy(
        &self,
        mass_frac: &Array1<f64>,
        u_target: f64,
        guess: f64,
    ) -> Option<f64> {
        let R = self.gas_const(mass_frac);
        let mut temp = guess.max(VALID_TEMPERATURE.0).min(VALID_TEMPERATURE.1);
        for _ in 0..50 {
            let residual = self.u_mass(mass_frac, temp) - u_target;
            let cv = self.cp_mass(mass_frac, temp) - R;
            if !(cv > 0.0) {
                return None;
            }
            let step = residual / cv;
            // damping keeps the first iterations inside the polynomial ranges
            let step = step.min(0.5 * temp).max(-2000.0);
            temp -= step;
            if !temp.is_finite() || temp < 0.5 * VALID_TEMPERATURE.0 || temp > 2.0 * VALID_TEMPERATURE.1 {
                return None;
            }
            if step.abs() <= 1e-10 * temp {
                return if temp >= VALID_TEMPERATURE.0 && temp <= VALID_TEMPERATURE.1 {
                    Some(temp)
                } else {
                    None
                };
            }
        }
        None
    }

    /// Parses `"O2:0.21, N2:0.79"` into normalised mole fractions.
    pub fn parse_mole_frac(&self, mol_frac: &str) -> ConfigResult<Array1<f64>> {
        let strings: Vec<String> = mol_frac
            .replace(&[',', '\"'][..], " ")
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();
        let mut X = Array::from_elem(self.n_species(), 0.);

        for word in strings.iter() {
            let specie: Vec<&str> = word.split(':').collect(); // specie should be like ["O2", "0.21"]
            if specie.len() != 2 {
                return Err(ConfigError::Composition(mol_frac.to_string()));
            }
            let i = self
                .species_index(specie[0])
                .ok_or_else(|| ConfigError::UnknownSpecies(specie[0].to_string()))?;
            let value: f64 = specie[1]
                .parse()
                .map_err(|_| ConfigError::Composition(mol_frac.to_string()))?;
            if value < 0.0 || !value.is_finite() {
                return Err(ConfigError::Composition(mol_frac.to_string()));
            }
            X[i] += value;
        }
        let total = X.sum();
        if !(total > 0.0) {
            return Err(ConfigError::Composition(mol_frac.to_string()));
        }
        Ok(X / total)
    }

    pub fn mole_to_mass_frac(&self, mole_frac: &Array1<f64>) -> Array1<f64> {
        let weighted = mole_frac * &self.molar_weights;
        let total = weighted.sum();
        weighted / total
    }

    pub fn mass_to_mole_frac(&self, mass_frac: &Array1<f64>) -> Array1<f64> {
        let moles = mass_frac / &self.molar_weights;
        let total = moles.sum();
        moles / total
    }
}

/// Ideal gas mixture: a state (T, P, Y) on top of a shared `Mechanism`.
#[derive(Debug, Clone)]
pub struct Gas {
    mechanism: Arc<Mechanism>,
    mass_frac: Array1<f64>,
    thermo_prop: ThermoProp,
}

impl Gas {
    /// Creates a `Gas` object from a mechanism file
    pub fn new(gas_file: &str) -> ConfigResult<Gas> {
        Gas::from_json_output(json_data::read_and_treat_json(gas_file)?)
    }

    /// Creates a `Gas` object from the n-dodecane/air mechanism embedded in the crate
    pub fn dodecane_air() -> ConfigResult<Gas> {
        Gas::from_json_output(json_data::treat_json(DODECANE_AIR)?)
    }

    fn from_json_output(json_output: json_data::OutputJson) -> ConfigResult<Gas> {
        let mechanism = Mechanism::new(json_output.name, json_output.species);
        let n = mechanism.n_species();
        let mut gas = Gas {
            mechanism: Arc::new(mechanism),
            mass_frac: Array::from_elem(n, 0.),
            thermo_prop: ThermoProp::new(),
        };
        gas.TPX(
            json_output.ini_temp,
            json_output.ini_press,
            &json_output.mole_frac,
        )?;
        Ok(gas)
    }

    /// Set temperature and pressure. Thermo properties are recalculated
    pub fn TP(&mut self, temp: f64, press: f64) {
        self.thermo_prop.T = temp;
        self.thermo_prop.P = press;
        self.calc_prop();
    }

    /// Set temperature, pressure, and mole fraction of species. Thermo properties are recalculated
    /// # Examples
    /// ```
    /// use diesel_engine_simulator::Gas;
    /// let mut gas = Gas::dodecane_air().unwrap();
    /// gas.TPX(350.0, 2e5, "O2:0.21, N2:0.79").unwrap();
    /// assert_eq!(350.0, gas.T());
    /// assert_eq!(2e5, gas.P());
    /// assert!((gas.mole_frac_of("O2") - 0.21).abs() < 1e-12);
    /// ```
    pub fn TPX(&mut self, temp: f64, press: f64, mol_frac: &str) -> ConfigResult<()> {
        let X = self.mechanism.parse_mole_frac(mol_frac)?;
        self.mass_frac = self.mechanism.mole_to_mass_frac(&X);
        self.TP(temp, press);
        Ok(())
    }

    /// Set temperature, pressure and mass fractions. Fractions are normalised.
    pub fn TPY(&mut self, temp: f64, press: f64, mass_frac: &Array1<f64>) {
        let total = mass_frac.sum();
        self.mass_frac = mass_frac / total;
        self.TP(temp, press);
    }

    /// Set the state from specific internal energy [J/kg], density [kg/m³] and mass fractions.
    /// Returns `false` and leaves the gas untouched if the temperature cannot be recovered.
    pub fn UDY(&mut self, u: f64, rho: f64, mass_frac: &Array1<f64>) -> bool {
        let total = mass_frac.sum();
        let mass_frac = mass_frac / total;
        match self
            .mechanism
            .temperature_from_energy(&mass_frac, u, self.thermo_prop.T)
        {
            Some(temp) => {
                let R = self.mechanism.gas_const(&mass_frac);
                self.mass_frac = mass_frac;
                self.TP(temp, rho * R * temp);
                true
            }
            None => false,
        }
    }

    fn calc_prop(&mut self) {
        let T = self.thermo_prop.T;
        let Y = &self.mass_frac;
        self.thermo_prop.M = self.mechanism.mean_molecular_weight(Y);
        self.thermo_prop.R = R_UNIVERSAL / self.thermo_prop.M;
        self.thermo_prop.cp = self.mechanism.cp_mass(Y, T);
        self.thermo_prop.cv = self.thermo_prop.cp - self.thermo_prop.R;
        self.thermo_prop.k = self.thermo_prop.cp / self.thermo_prop.cv;
        self.thermo_prop.rho = self.thermo_prop.P / (self.thermo_prop.R * T);
        self.thermo_prop.h = self.mechanism.h_mass(Y, T);
        self.thermo_prop.e = self.thermo_prop.h - self.thermo_prop.R * T;
    }

    pub fn name(&self) -> &str {
        self.mechanism.name()
    }

    pub fn mechanism(&self) -> &Arc<Mechanism> {
        &self.mechanism
    }

    pub fn species(&self) -> Vec<&str> {
        self.mechanism.species_names()
    }

    pub fn mass_frac(&self) -> &Array1<f64> {
        &self.mass_frac
    }

    pub fn mole_frac(&self) -> Array1<f64> {
        self.mechanism.mass_to_mole_frac(&self.mass_frac)
    }

    /// Mole fraction of `specie`, zero if it is not part of the mechanism
    pub fn mole_frac_of(&self, specie: &str) -> f64 {
        match self.mechanism.species_index(specie) {
            Some(i) => self.mole_frac()[i],
            None => 0.0,
        }
    }

    pub fn T(&self) -> f64 {
        self.thermo_prop.T
    }

    pub fn P(&self) -> f64 {
        self.thermo_prop.P
    }

    pub fn rho(&self) -> f64 {
        self.thermo_prop.rho
    }

    pub fn cp(&self) -> f64 {
        self.thermo_prop.cp
    }

    pub fn cv(&self) -> f64 {
        self.thermo_prop.cv
    }

    pub fn R(&self) -> f64 {
        self.thermo_prop.R
    }

    pub fn k(&self) -> f64 {
        self.thermo_prop.k
    }

    pub fn M(&self) -> f64 {
        self.thermo_prop.M
    }

    pub fn e(&self) -> f64 {
        self.thermo_prop.e
    }

    pub fn h(&self) -> f64 {
        self.thermo_prop.h
    }
}

impl std::fmt::Display for Gas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let composition: Vec<String> = self
            .species()
            .iter()
            .zip(self.mole_frac().iter())
            .filter(|(_, x)| **x > 0.0)
            .map(|(s, x)| format!("{}:{:.4}", s, x))
            .collect();
        write!(
            f,
            "T = {:.2} [K], P = {:.4} [bar], X = {}",
            self.T(),
            self.P() / 1e5,
            composition.join(", ")
        )
    }
}

#[derive(Debug, Clone)]
struct ThermoProp {
    pub P: f64,   // pressure [Pa]
    pub T: f64,   // temperature [K]
    pub rho: f64, // density [kg/m^3]
    pub cp: f64,  // specific heat capacity - cp [J/(kg.K)]
    pub cv: f64,  // specific heat capacity - cv [J/(kg.K)]
    pub R: f64,   // ideal gas constant [J/(kg.K)]
    pub k: f64,   // cp/cv
    pub M: f64,   // molecular weight [kg/kmol]
    pub e: f64,   // internal energy [J/kg]
    pub h: f64,   // enthalpy [J/kg]
}

impl ThermoProp {
    fn new() -> ThermoProp {
        ThermoProp {
            P: 0.0,
            T: 0.0,
            rho: 0.0,
            cp: 0.0,
            cv: 0.0,
            R: 0.0,
            k: 0.0,
            M: 0.0,
            e: 0.0,
            h: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn air_properties() {
        let mut gas = Gas::dodecane_air().unwrap();
        gas.TPX(300.0, 101325.0, "O2:0.21, N2:0.79").unwrap();
        assert_relative_eq!(gas.M(), 28.85, max_relative = 1e-3);
        assert_relative_eq!(gas.R(), 288.2, max_relative = 1e-3);
        assert_relative_eq!(gas.k(), 1.40, max_relative = 5e-3);
        assert_relative_eq!(gas.rho(), 101325.0 / (gas.R() * 300.0));
    }

    #[test]
    fn composition_is_normalised() {
        let mut gas = Gas::dodecane_air().unwrap();
        gas.TPX(300.0, 1e5, "O2:27.75, N2:69.56").unwrap();
        assert_relative_eq!(gas.mole_frac().sum(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(gas.mole_frac_of("O2"), 27.75 / (27.75 + 69.56), epsilon = 1e-12);
        assert_relative_eq!(gas.mass_frac().sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn mass_fractions_are_normalised() {
        let mut gas = Gas::dodecane_air().unwrap();
        let mut y = Array1::zeros(gas.species().len());
        y[gas.mechanism().species_index("N2").unwrap()] = 3.0;
        y[gas.mechanism().species_index("O2").unwrap()] = 1.0;
        gas.TPY(500.0, 2e5, &y);
        assert_relative_eq!(gas.mass_frac().sum(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(gas.T(), 500.0);
        assert_relative_eq!(gas.P(), 2e5);
    }

    #[test]
    fn species_are_case_insensitive() {
        let mut gas = Gas::dodecane_air().unwrap();
        gas.TPX(300.0, 1600e5, "c12h26:1").unwrap();
        assert_relative_eq!(gas.mole_frac_of("C12H26"), 1.0);
        assert_relative_eq!(gas.M(), 170.33484, max_relative = 1e-9);
    }

    #[test]
    fn malformed_compositions() {
        let mut gas = Gas::dodecane_air().unwrap();
        assert!(matches!(
            gas.TPX(300.0, 1e5, "AR:1.0"),
            Err(ConfigError::UnknownSpecies(_))
        ));
        assert!(matches!(
            gas.TPX(300.0, 1e5, "O2:abc"),
            Err(ConfigError::Composition(_))
        ));
        assert!(matches!(
            gas.TPX(300.0, 1e5, "O2:0.0"),
            Err(ConfigError::Composition(_))
        ));
    }

    #[test]
    fn temperature_is_recovered_from_energy() {
        let mut gas = Gas::dodecane_air().unwrap();
        gas.TPX(1850.0, 80e5, "N2:0.7, CO2:0.1, H2O:0.1, O2:0.1").unwrap();
        let (u, rho, y) = (gas.e(), gas.rho(), gas.mass_frac().clone());

        let mut other = Gas::dodecane_air().unwrap();
        assert!(other.UDY(u, rho, &y));
        assert_relative_eq!(other.T(), 1850.0, max_relative = 1e-8);
        assert_relative_eq!(other.P(), 80e5, max_relative = 1e-8);
    }

    #[test]
    fn unreachable_energy_is_rejected() {
        let mut gas = Gas::dodecane_air().unwrap();
        gas.TPX(300.0, 1e5, "O2:0.21, N2:0.79").unwrap();
        let before = gas.T();
        let y = gas.mass_frac().clone();
        assert!(!gas.UDY(-1e9, 1.0, &y));
        assert_eq!(gas.T(), before);
    }
}
