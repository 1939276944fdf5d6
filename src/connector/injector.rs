use super::timing::ValveTiming;
use crate::core::traits::Connector;
use crate::error::{positive, ConfigError, ConfigResult};
use crate::BasicProperties;

/// Mass flow controller delivering `injected_mass` at a constant rate over its timing window,
/// whatever the pressures on both sides.
#[derive(Debug, Clone)]
pub struct Injector {
    name: String,
    timing: ValveTiming,
    injected_mass: f64, // [kg] per cycle
    mass_flow: f64,     // [kg/s] while open
    connecting: Vec<String>,
}

impl Injector {
    /// `angular_speed` of the crankshaft in [rad/s]
    pub fn new(
        name: &str,
        timing: ValveTiming,
        injected_mass: f64,
        angular_speed: f64,
    ) -> ConfigResult<Injector> {
        let injected_mass = positive("injected mass", injected_mass)?;
        let angular_speed = positive("engine speed", angular_speed)?;
        let open_time = timing.open_duration() / angular_speed; // [s]
        Ok(Injector {
            name: name.to_string(),
            timing,
            injected_mass,
            mass_flow: injected_mass / open_time,
            connecting: Vec::new(),
        })
    }

    pub fn timing(&self) -> &ValveTiming {
        &self.timing
    }

    /// [kg] per cycle
    pub fn injected_mass(&self) -> f64 {
        self.injected_mass
    }

    /// [kg/s] at crank angle `angle` [CA rad]
    pub fn flow_rate(&self, angle: f64) -> f64 {
        if self.timing.is_open(angle) {
            self.mass_flow
        } else {
            0.0
        }
    }
}

impl Connector for Injector {
    fn name<'a>(&'a self) -> &'a str {
        &self.name
    }
    fn connecting<'a>(&'a self) -> &'a Vec<String> {
        &self.connecting
    }
    fn connect_to(&mut self, elem_name: &str) -> ConfigResult<()> {
        if self.connecting.len() == 2 {
            return Err(ConfigError::Connection(format!(
                "injector `{}` already connects `{}` and `{}`",
                self.name, self.connecting[0], self.connecting[1]
            )));
        }
        self.connecting.push(elem_name.to_string());
        Ok(())
    }
    fn mass_flow(&self, angle: f64, _from: &BasicProperties, _to: &BasicProperties) -> f64 {
        self.flow_rate(angle)
    }
    fn switching_angles(&self) -> Vec<f64> {
        self.timing.edges().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn delivers_the_whole_mass_over_the_window() {
        let omega = 2.0 * PI * 50.0;
        let timing = ValveTiming::new("injector", 350.0, 365.0).unwrap();
        let inj = Injector::new("injector", timing, 3.2e-5, omega).unwrap();
        let open_time = 15.0 / (360.0 * 50.0);
        assert_relative_eq!(inj.flow_rate(355f64.to_radians()) * open_time, 3.2e-5, max_relative = 1e-12);
        assert_eq!(inj.flow_rate(366f64.to_radians()), 0.0);
        assert_eq!(inj.flow_rate(10f64.to_radians()), 0.0);
    }

    #[test]
    fn rate_independent_of_pressure() {
        let timing = ValveTiming::new("injector", 350.0, 365.0).unwrap();
        let inj = Injector::new("injector", timing, 3.2e-5, 314.0).unwrap();
        let y = ndarray::array![1.0, 0.0];
        let high = BasicProperties {
            name: "a",
            pressure: 1600e5,
            temperature: 300.0,
            enthalpy: 0.0,
            mass_frac: &y,
        };
        let low = BasicProperties {
            name: "b",
            pressure: 1e5,
            ..high
        };
        let angle = 360f64.to_radians();
        assert_eq!(inj.mass_flow(angle, &high, &low), inj.mass_flow(angle, &low, &high));
    }

    #[test]
    fn rejects_invalid_inputs() {
        let timing = ValveTiming::new("injector", 350.0, 365.0).unwrap();
        assert!(Injector::new("injector", timing, 0.0, 314.0).is_err());
        assert!(Injector::new("injector", timing, 1e-5, -1.0).is_err());
    }
}
