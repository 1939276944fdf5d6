use crate::core::traits::{SaveData, ZeroDim};
use crate::engine::kinematics::CrankKinematics;
use crate::numerics::ode_solvers::SolverError;
use crate::reaction::combustion::Combustion;
use crate::reaction::gas::Gas;
use crate::{BasicProperties, FlowRatio};
use ansi_term::Style;
use ndarray::*;

/// Smallest mass fraction accepted in a trial state before it is considered invalid
const MIN_MASS_FRAC: f64 = -1e-6;

/// Open control volume whose volume follows the crank kinematics. Its state vector is
/// `[U, m_1, .., m_K]`: internal energy [J] and species masses [kg].
#[derive(Clone)]
pub struct Cylinder {
    name: String,
    gas: Gas,
    time: f64, // [s]
    state: Array1<f64>,
    kinematics: CrankKinematics,
    combustion: Box<dyn Combustion>,
}

impl Cylinder {
    /// Creates a cylinder filled with `gas` at `t = 0`, i.e. at top-dead-center volume.
    pub fn new(
        name: &str,
        gas: &Gas,
        kinematics: CrankKinematics,
        combustion: Box<dyn Combustion>,
    ) -> Cylinder {
        let volume = kinematics.volume(0.0);
        let mass = gas.rho() * volume;
        let mut state = Array1::zeros(1 + gas.mass_frac().len());
        state[0] = mass * gas.e();
        state.slice_mut(s![1..]).assign(&(gas.mass_frac() * mass));
        Cylinder {
            name: name.to_string(),
            gas: gas.clone(),
            time: 0.0,
            state,
            kinematics,
            combustion,
        }
    }

    pub fn gas(&self) -> &Gas {
        &self.gas
    }

    pub fn kinematics(&self) -> &CrankKinematics {
        &self.kinematics
    }

    pub fn combustion(&self) -> &dyn Combustion {
        self.combustion.as_ref()
    }

    pub fn combustion_model(&self) -> &str {
        self.combustion.model_name()
    }

    /// `[U, m_1, .., m_K]`
    pub fn state(&self) -> &Array1<f64> {
        &self.state
    }

    pub fn n_state(&self) -> usize {
        self.state.len()
    }

    /// [kg]
    pub fn mass(&self) -> f64 {
        self.state.slice(s![1..]).sum()
    }

    /// Species masses [kg]
    pub fn species_mass(&self) -> ArrayView1<f64> {
        self.state.slice(s![1..])
    }

    /// [m³]
    pub fn volume(&self) -> f64 {
        self.kinematics.volume(self.time)
    }

    /// [s]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// [CA rad]
    pub fn crank_angle(&self) -> f64 {
        self.kinematics.crank_angle(self.time)
    }

    /// Gas held in the cylinder for the state vector `x` at time `t`
    pub fn gas_from_state(&self, t: f64, x: ArrayView1<f64>) -> Result<Gas, SolverError> {
        let species_mass = x.slice(s![1..]);
        let mass = species_mass.sum();
        if !(mass > 0.0) || !mass.is_finite() || !x[0].is_finite() {
            return Err(SolverError::InvalidState(format!(
                "mass of `{}` is not positive: {:e} kg",
                self.name, mass
            )));
        }
        let mass_frac = &species_mass / mass;
        if mass_frac.iter().any(|y| *y < MIN_MASS_FRAC) {
            return Err(SolverError::InvalidState(format!(
                "negative species mass in `{}`",
                self.name
            )));
        }
        let mut gas = self.gas.clone();
        let rho = mass / self.kinematics.volume(t);
        if !gas.UDY(x[0] / mass, rho, &mass_frac) {
            return Err(SolverError::InvalidState(format!(
                "temperature of `{}` cannot be recovered",
                self.name
            )));
        }
        if !(gas.P() > 0.0) || !gas.P().is_finite() {
            return Err(SolverError::InvalidState(format!(
                "pressure of `{}` is not positive: {:e} Pa",
                self.name,
                gas.P()
            )));
        }
        Ok(gas)
    }

    /// Temperature [K] of the state vector `x`; it does not depend on the volume
    pub fn temperature_of(&self, x: ArrayView1<f64>) -> Option<f64> {
        let species_mass = x.slice(s![1..]);
        let mass = species_mass.sum();
        if !(mass > 0.0) {
            return None;
        }
        let mass_frac = &species_mass / mass;
        self.gas
            .mechanism()
            .temperature_from_energy(&mass_frac, x[0] / mass, self.gas.T())
    }

    /// Time derivative of `[U, m_1, .., m_K]` given the `gas` recovered from the state and the
    /// flows entering the cylinder. The combustion window is judged at `gate_angle` [CA rad].
    pub fn derivatives(
        &self,
        t: f64,
        gate_angle: f64,
        gas: &Gas,
        species_mass: ArrayView1<f64>,
        inflow: &FlowRatio,
    ) -> Array1<f64> {
        let mut dx = Array1::zeros(self.n_state());
        dx[0] = inflow.enthalpy_flow - gas.P() * self.kinematics.volume_rate(t);
        dx.slice_mut(s![1..]).assign(&inflow.species_flow);
        self.combustion.add_source_terms(
            self.kinematics.crank_angle(t),
            gate_angle,
            self.kinematics.angular_speed(),
            species_mass,
            dx.slice_mut(s![1..]),
        );
        dx
    }

    /// Accepts `x` as the state at time `t`
    pub fn set_state(&mut self, t: f64, x: ArrayView1<f64>) -> Result<(), SolverError> {
        self.gas = self.gas_from_state(t, x)?;
        self.state.assign(&x);
        self.time = t;
        Ok(())
    }
}

/// Connector view of a gas held by an object named `name`
pub fn gas_properties<'a>(name: &'a str, gas: &'a Gas) -> BasicProperties<'a> {
    BasicProperties {
        name,
        pressure: gas.P(),
        temperature: gas.T(),
        enthalpy: gas.h(),
        mass_frac: gas.mass_frac(),
    }
}

impl ZeroDim for Cylinder {
    fn name<'a>(&'a self) -> &'a str {
        &self.name
    }
    fn get_state(&self) -> BasicProperties {
        gas_properties(&self.name, &self.gas)
    }
}

impl SaveData for Cylinder {
    fn get_headers(&self) -> String {
        "crank-angle [deg]\tpressure [bar]\ttemperature [K]\tvolume [cm³]\tmass [mg]".to_string()
    }
    fn num_storable_variables(&self) -> usize {
        5
    }
    fn get_storable_data(&self) -> Array1<f64> {
        array![
            self.crank_angle().to_degrees(),
            self.gas.P() / 1e5,
            self.gas.T(),
            self.volume() * 1e6,
            self.mass() * 1e6
        ]
    }
}

impl std::fmt::Display for Cylinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let geometry = self.kinematics.geometry();
        write!(
            f,
            "{}:
        gas: `{}`
        angle: {:.2} [CA deg]
        temperature: {:.2} [K]
        pressure: {:.2} [Pa]
        volume: {:.1} [cm³]
        mass: {:.1} [mg]
        combustion: {}
        {}
        diameter: {:.1} [mm]
        stroke: {:.1} [mm]
        displacement: {:.1} [cm³]
        compression_ratio: {:.1}",
            Style::new().bold().paint(&self.name),
            self.gas.name(),
            self.crank_angle().to_degrees(),
            self.gas.T(),
            self.gas.P(),
            self.volume() * 1e6,
            self.mass() * 1e6,
            self.combustion.model_name(),
            Style::new().underline().paint("     Geometry     "),
            geometry.diameter() * 1e3,
            geometry.stroke() * 1e3,
            geometry.displacement() * 1e6,
            geometry.compression_ratio(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::kinematics::Geometry;
    use crate::reaction::combustion::NoCombustion;
    use approx::assert_relative_eq;

    fn cylinder() -> Cylinder {
        let mut gas = Gas::dodecane_air().unwrap();
        gas.TPX(300.0, 1.3e5, "O2:27.75, N2:69.56").unwrap();
        let geometry = Geometry::new(0.128, 0.5e-3, 14.0).unwrap();
        let kinematics = CrankKinematics::new(50.0, geometry).unwrap();
        Cylinder::new("cyl", &gas, kinematics, Box::new(NoCombustion::new()))
    }

    #[test]
    fn starts_at_top_dead_center_with_gas_state() {
        let cyl = cylinder();
        assert_relative_eq!(cyl.volume(), 0.5e-3 / 13.0, max_relative = 1e-12);
        assert_relative_eq!(cyl.mass(), cyl.gas().rho() * cyl.volume(), max_relative = 1e-12);
        let gas = cyl.gas_from_state(0.0, cyl.state().view()).unwrap();
        assert_relative_eq!(gas.T(), 300.0, max_relative = 1e-8);
        assert_relative_eq!(gas.P(), 1.3e5, max_relative = 1e-8);
    }

    #[test]
    fn volume_change_sets_pressure() {
        let cyl = cylinder();
        // same mass and energy at bottom-dead-center
        let t_bdc = 0.5 / 50.0;
        let gas = cyl.gas_from_state(t_bdc, cyl.state().view()).unwrap();
        assert_relative_eq!(gas.T(), 300.0, max_relative = 1e-8);
        assert_relative_eq!(gas.P(), 1.3e5 / 14.0, max_relative = 1e-8);
    }

    #[test]
    fn closed_cylinder_compression_work() {
        let cyl = cylinder();
        let t = 0.75 / 50.0; // crank at 270 degrees, compressing
        let gas = cyl.gas_from_state(t, cyl.state().view()).unwrap();
        let inflow = FlowRatio::new(gas.mass_frac().len());
        let dx = cyl.derivatives(t, cyl.crank_angle(), &gas, cyl.species_mass(), &inflow);
        assert!(cyl.kinematics().volume_rate(t) < 0.0);
        assert_relative_eq!(dx[0], -gas.P() * cyl.kinematics().volume_rate(t));
        assert!(dx.slice(s![1..]).iter().all(|d| *d == 0.0));
    }

    #[test]
    fn invalid_states() {
        let cyl = cylinder();
        let mut x = cyl.state().clone();
        x.slice_mut(s![1..]).fill(0.0);
        assert!(matches!(
            cyl.gas_from_state(0.0, x.view()),
            Err(SolverError::InvalidState(_))
        ));
        let mut x = cyl.state().clone();
        x[0] = -1e9;
        assert!(cyl.gas_from_state(0.0, x.view()).is_err());
        assert!(cyl.temperature_of(x.view()).is_none());
    }

    #[test]
    fn accepted_state_updates_gas() {
        let mut cyl = cylinder();
        let mut x = cyl.state().clone();
        x[0] += 0.05 * x[0].abs();
        let t = 0.001;
        cyl.set_state(t, x.view()).unwrap();
        assert_eq!(cyl.time(), t);
        assert!(cyl.gas().T() != 300.0);
        assert_eq!(cyl.get_storable_data().len(), cyl.num_storable_variables());
    }
}
