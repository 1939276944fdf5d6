use crate::core::traits::ZeroDim;
use crate::reaction::gas::Gas;
use crate::zero_dim::cylinder::gas_properties;
use crate::BasicProperties;

/// Infinite-capacity volume with a fixed gas state
#[derive(Debug, Clone)]
pub struct Reservoir {
    name: String,
    gas: Gas,
}

impl Reservoir {
    pub fn new(name: &str, gas: &Gas) -> Reservoir {
        Reservoir {
            name: name.to_string(),
            gas: gas.clone(),
        }
    }

    pub fn gas(&self) -> &Gas {
        &self.gas
    }
}

impl ZeroDim for Reservoir {
    fn name<'a>(&'a self) -> &'a str {
        &self.name
    }
    fn get_state(&self) -> BasicProperties {
        gas_properties(&self.name, &self.gas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_the_gas_state() {
        let mut gas = Gas::dodecane_air().unwrap();
        gas.TPX(300.0, 1.3e5, "O2:27.75, N2:69.56").unwrap();
        let res = Reservoir::new("intake", &gas);
        let state = res.get_state();
        assert_eq!(state.name, "intake");
        assert_eq!(state.pressure, 1.3e5);
        assert_eq!(state.temperature, 300.0);
        assert_eq!(state.enthalpy, gas.h());
        assert_eq!(state.mass_frac, gas_properties("intake", &gas).mass_frac);
    }
}
