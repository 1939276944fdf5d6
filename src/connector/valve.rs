use super::timing::ValveTiming;
use crate::core::traits::Connector;
use crate::error::{positive, ConfigError, ConfigResult};
use crate::BasicProperties;

/// Orifice whose mass flow is linear in the pressure difference while its timing window is open.
/// The flow is signed: it reverses when the downstream pressure is higher.
#[derive(Debug, Clone)]
pub struct Valve {
    name: String,
    timing: ValveTiming,
    coeff: f64, // [kg/(s.Pa)]
    connecting: Vec<String>,
}

impl Valve {
    pub fn new(name: &str, timing: ValveTiming, coeff: f64) -> ConfigResult<Valve> {
        let coeff = positive("valve coefficient", coeff)?;
        Ok(Valve {
            name: name.to_string(),
            timing,
            coeff,
            connecting: Vec::new(),
        })
    }

    pub fn timing(&self) -> &ValveTiming {
        &self.timing
    }

    pub fn coeff(&self) -> f64 {
        self.coeff
    }

    /// [kg/s], positive from the upstream pressure `p_from` to `p_to`
    pub fn flow_rate(&self, angle: f64, p_from: f64, p_to: f64) -> f64 {
        if self.timing.is_open(angle) {
            self.coeff * (p_from - p_to)
        } else {
            0.0
        }
    }
}

impl Connector for Valve {
    fn name<'a>(&'a self) -> &'a str {
        &self.name
    }
    fn connecting<'a>(&'a self) -> &'a Vec<String> {
        &self.connecting
    }
    fn connect_to(&mut self, elem_name: &str) -> ConfigResult<()> {
        if self.connecting.len() == 2 {
            return Err(ConfigError::Connection(format!(
                "valve `{}` already connects `{}` and `{}`",
                self.name, self.connecting[0], self.connecting[1]
            )));
        }
        self.connecting.push(elem_name.to_string());
        Ok(())
    }
    fn mass_flow(&self, angle: f64, from: &BasicProperties, to: &BasicProperties) -> f64 {
        self.flow_rate(angle, from.pressure, to.pressure)
    }
    fn switching_angles(&self) -> Vec<f64> {
        self.timing.edges().to_vec()
    }
}
