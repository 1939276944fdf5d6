// File to read and treat the data in the .json mechanism files

#![allow(non_snake_case)]

use super::thermo::{NasaPolynomial, SpeciesThermo};
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
struct IdealGas {
    phase: Phase,
    species_data: Vec<SpeciesData>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Phase {
    id: String,
    speciesArray: String,
    state: State,
}

#[derive(Serialize, Deserialize, Debug)]
struct SpeciesData {
    name: String,
    molecular_weight: f64,
    thermo: Option<Vec<PolynomInterp>>,
}

#[derive(Serialize, Deserialize, Debug)]
struct State {
    temperature: f64,
    pressure: f64,
    moleFractions: String,
}

#[derive(Serialize, Deserialize, Debug)]
struct PolynomInterp {
    Tmin: f64,
    Tmax: f64,
    coeffs: Vec<f64>,
}

#[derive(Debug)]
pub struct OutputJson {
    pub name: String,
    pub species: Vec<SpeciesThermo>,
    pub ini_temp: f64,
    pub ini_press: f64,
    pub mole_frac: String,
}

pub fn read_and_treat_json(file_name: &str) -> ConfigResult<OutputJson> {
    let json_file = std::fs::read_to_string(file_name)?;
    treat_json(&json_file)
}

pub fn treat_json(json: &str) -> ConfigResult<OutputJson> {
    let gas: IdealGas = serde_json::from_str(json)?;

    let name = gas.phase.id.clone();
    let ini_temp = gas.phase.state.temperature;
    let ini_press = gas.phase.state.pressure;
    let mole_frac = gas.phase.state.moleFractions.clone();
    let species = get_species(gas)?;

    Ok(OutputJson {
        name,
        species,
        ini_temp,
        ini_press,
        mole_frac,
    })
}

fn get_species(mut gas: IdealGas) -> ConfigResult<Vec<SpeciesThermo>> {
    let names: Vec<String> = gas
        .phase
        .speciesArray
        .split_whitespace()
        .map(|s| s.to_string())
        .collect();

    // Checking if file is appropriate
    if names.is_empty() {
        return Err(ConfigError::Mechanism("'speciesArray' is empty".to_string()));
    }
    if names.len() > gas.species_data.len() {
        return Err(ConfigError::Mechanism(
            "not enough data for the species in 'speciesArray'".to_string(),
        ));
    }

    let mut species = Vec::with_capacity(names.len());
    for name in names.iter() {
        let data = gas
            .species_data
            .iter_mut()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ConfigError::UnknownSpecies(name.clone()))?;
        let thermo = data.thermo.take().ok_or_else(|| {
            ConfigError::Mechanism(format!("species `{}` has no thermo data", name))
        })?;
        let mut ranges = Vec::with_capacity(thermo.len());
        for poly in thermo {
            if poly.coeffs.len() != 7 || poly.Tmin >= poly.Tmax {
                return Err(ConfigError::Mechanism(format!(
                    "species `{}`: NASA polynomials need 7 coefficients and Tmin < Tmax",
                    name
                )));
            }
            let mut coeffs = [0.0; 7];
            coeffs.copy_from_slice(&poly.coeffs);
            ranges.push(NasaPolynomial::new(poly.Tmin, poly.Tmax, coeffs));
        }
        species.push(SpeciesThermo::new(
            name.clone(),
            data.molecular_weight,
            ranges,
        )?);
    }
    Ok(species)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_embedded_mechanism() {
        let out = treat_json(crate::reaction::gas::DODECANE_AIR).unwrap();
        assert_eq!(out.name, "nDodecane_IG");
        let names: Vec<&str> = out.species.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["C12H26", "O2", "N2", "CO2", "H2O"]);
        assert_eq!(out.ini_temp, 300.0);
    }

    #[test]
    fn missing_species_data_is_an_error() {
        let json = r#"{
            "phase": {"id": "x", "speciesArray": "O2 AR",
                "state": {"temperature": 300.0, "pressure": 1e5, "moleFractions": "O2:1"}},
            "species_data": [
                {"name": "O2", "molecular_weight": 32.0,
                 "thermo": [{"Tmin": 200.0, "Tmax": 1000.0, "coeffs": [3.5, 0, 0, 0, 0, 0, 0]}]},
                {"name": "N2", "molecular_weight": 28.0,
                 "thermo": [{"Tmin": 200.0, "Tmax": 1000.0, "coeffs": [3.5, 0, 0, 0, 0, 0, 0]}]}
            ]
        }"#;
        match treat_json(json) {
            Err(ConfigError::UnknownSpecies(s)) => assert_eq!(s, "AR"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
