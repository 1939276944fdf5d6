use crate::engine::kinematics::CrankKinematics;
use crate::error::{ConfigError, ConfigResult};

/// Piston separating the ambient from the cylinder. Its velocity is prescribed by the crank
/// kinematics; it exchanges work but no mass.
#[derive(Debug, Clone)]
pub struct PistonWall {
    name: String,
    kinematics: CrankKinematics,
    connecting: Vec<String>, // [ambient, cylinder]
}

impl PistonWall {
    pub fn new(name: &str, kinematics: CrankKinematics) -> PistonWall {
        PistonWall {
            name: name.to_string(),
            kinematics,
            connecting: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connecting(&self) -> &Vec<String> {
        &self.connecting
    }

    pub fn connect(&mut self, ambient: &str, cylinder: &str) -> ConfigResult<()> {
        if !self.connecting.is_empty() {
            return Err(ConfigError::Connection(format!(
                "wall `{}` is already installed",
                self.name
            )));
        }
        self.connecting = vec![ambient.to_string(), cylinder.to_string()];
        Ok(())
    }

    /// [m²]
    pub fn area(&self) -> f64 {
        self.kinematics.geometry().piston_area()
    }

    /// [m/s], positive towards the cylinder head
    pub fn velocity(&self, t: f64) -> f64 {
        self.kinematics.piston_velocity(t)
    }

    /// Net power [W] delivered by the cylinder gas to the piston, the ambient acting on its back
    pub fn work_rate(&self, t: f64, cylinder_pressure: f64, ambient_pressure: f64) -> f64 {
        -(cylinder_pressure - ambient_pressure) * self.area() * self.velocity(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::kinematics::Geometry;
    use approx::assert_relative_eq;

    fn wall() -> PistonWall {
        let geometry = Geometry::new(0.128, 0.5e-3, 14.0).unwrap();
        PistonWall::new("piston", CrankKinematics::new(50.0, geometry).unwrap())
    }

    #[test]
    fn no_work_at_pressure_balance_or_dead_center() {
        let w = wall();
        assert_eq!(w.work_rate(0.003, 1e5, 1e5), 0.0);
        assert_relative_eq!(w.work_rate(0.0, 50e5, 1e5), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn expansion_sign() {
        let w = wall();
        // crank at 90 degrees: piston moving away from the head
        let t = 90.0 / (360.0 * 50.0);
        assert!(w.velocity(t) < 0.0);
        assert!(w.work_rate(t, 50e5, 1e5) > 0.0);
        assert!(w.work_rate(t, 0.5e5, 1e5) < 0.0);
    }

    #[test]
    fn installed_once() {
        let mut w = wall();
        assert!(w.connect("ambient", "cyl").is_ok());
        assert!(w.connect("ambient", "cyl").is_err());
    }
}
