#![allow(non_snake_case)]

use crate::error::{ConfigError, ConfigResult};

/// Universal gas constant [J/(kmol.K)]
pub const R_UNIVERSAL: f64 = 8314.462618;

/// One temperature range of a NASA 7-coefficient polynomial.
#[derive(Debug, Clone)]
pub struct NasaPolynomial {
    Tmin: f64,
    Tmax: f64,
    coeffs: [f64; 7],
}

impl NasaPolynomial {
    pub fn new(Tmin: f64, Tmax: f64, coeffs: [f64; 7]) -> NasaPolynomial {
        NasaPolynomial { Tmin, Tmax, coeffs }
    }

    /// Calculate non-dimensional cp, enthalpy and entropy for a given temperature using 4th order
    /// NASA polinomial
    pub fn calc_thermo_properties(&self, temp: f64) -> (f64, f64, f64) {
        let coeff = &self.coeffs;
        let cT0 = coeff[0];
        let cT1 = coeff[1] * temp;
        let cT2 = coeff[2] * temp.powi(2);
        let cT3 = coeff[3] * temp.powi(3);
        let cT4 = coeff[4] * temp.powi(4);
        let cT5 = coeff[5] / temp;
        let cT6 = coeff[0] * temp.ln();

        let cp_R = cT0 + cT1 + cT2 + cT3 + cT4;
        let h_RT = cT0 + 0.5 * cT1 + 1.0 / 3.0 * cT2 + 0.25 * cT3 + 0.20 * cT4 + cT5;
        let s_R = cT6 + cT1 + 0.5 * cT2 + 1.0 / 3.0 * cT3 + 0.25 * cT4 + coeff[6];
        (cp_R, h_RT, s_R)
    }

    pub fn Tmin(&self) -> f64 {
        self.Tmin
    }

    pub fn Tmax(&self) -> f64 {
        self.Tmax
    }
}

/// Thermodynamic data of a single species.
#[derive(Debug, Clone)]
pub struct SpeciesThermo {
    name: String,
    molecular_weight: f64, // [kg/kmol]
    ranges: Vec<NasaPolynomial>,
}

impl SpeciesThermo {
    pub fn new(
        name: String,
        molecular_weight: f64,
        mut ranges: Vec<NasaPolynomial>,
    ) -> ConfigResult<SpeciesThermo> {
        if molecular_weight <= 0.0 {
            return Err(ConfigError::Mechanism(format!(
                "molecular weight of `{}` must be positive",
                name
            )));
        }
        if ranges.is_empty() {
            return Err(ConfigError::Mechanism(format!(
                "species `{}` has no thermo data",
                name
            )));
        }
        ranges.sort_by(|a, b| a.Tmin.partial_cmp(&b.Tmin).unwrap_or(std::cmp::Ordering::Equal));
        let species = SpeciesThermo {
            name,
            molecular_weight,
            ranges,
        };
        species.validate()?;
        Ok(species)
    }

    /// Checks continuity of cp, enthalpy and entropy between adjacent ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        for pair in self.ranges.windows(2) {
            let Tmid = pair[0].Tmax;
            let (cp_low, h_low, s_low) = pair[0].calc_thermo_properties(Tmid);
            let (cp_high, h_high, s_high) = pair[1].calc_thermo_properties(Tmid);

            if ((cp_low - cp_high) / (cp_low.abs() + 1.0E-4)).abs() > 0.01 {
                return Err(self.discontinuity("cp/R", Tmid, cp_low, cp_high));
            }
            if (h_low - h_high).abs() / cp_low.abs() > 0.001 {
                return Err(self.discontinuity("h/RT", Tmid, h_low, h_high));
            }
            if ((s_low - s_high) / (s_low.abs() + cp_low)).abs() > 0.001 {
                return Err(self.discontinuity("s/R", Tmid, s_low, s_high));
            }
        }
        Ok(())
    }

    fn discontinuity(&self, prop: &str, Tmid: f64, low: f64, high: f64) -> ConfigError {
        ConfigError::Mechanism(format!(
            "for species {}, discontinuity in {} detected at Tmid = {} (low: {}, high: {})",
            self.name, prop, Tmid, low, high
        ))
    }

    /// Polynomial covering `temp`. Outside the tabulated range the closest one is extrapolated.
    fn polynomial(&self, temp: f64) -> &NasaPolynomial {
        self.ranges
            .iter()
            .find(|p| temp <= p.Tmax)
            .unwrap_or_else(|| &self.ranges[self.ranges.len() - 1])
    }

    /// Returns `(cp/R, h/RT, s/R)`
    pub fn non_dimensional(&self, temp: f64) -> (f64, f64, f64) {
        self.polynomial(temp).calc_thermo_properties(temp)
    }

    /// Specific heat at constant pressure [J/(kg.K)]
    pub fn cp_mass(&self, temp: f64) -> f64 {
        let (cp_R, _, _) = self.non_dimensional(temp);
        cp_R * R_UNIVERSAL / self.molecular_weight
    }

    /// Specific enthalpy including enthalpy of formation [J/kg]
    pub fn h_mass(&self, temp: f64) -> f64 {
        let (_, h_RT, _) = self.non_dimensional(temp);
        h_RT * R_UNIVERSAL * temp / self.molecular_weight
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn molecular_weight(&self) -> f64 {
        self.molecular_weight
    }

    pub fn Tmin(&self) -> f64 {
        self.ranges[0].Tmin
    }

    pub fn Tmax(&self) -> f64 {
        self.ranges[self.ranges.len() - 1].Tmax
    }
}
