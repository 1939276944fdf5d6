use super::system::System;
use crate::connector::injector::Injector;
use crate::connector::timing::ValveTiming;
use crate::connector::valve::Valve;
use crate::connector::wall::PistonWall;
use crate::core::traits::{Connector, ZeroDim};
use crate::engine::kinematics::CrankKinematics;
use crate::error::{positive, ConfigError, ConfigResult};
use crate::numerics::ode_solvers::Rosenbrock2;
use crate::reaction::combustion::Combustion;
use crate::reaction::gas::Gas;
use crate::zero_dim::cylinder::Cylinder;
use crate::zero_dim::reservoir::Reservoir;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ObjectType {
    Reservoir,
    Cylinder,
    Connector,
    Wall,
}

#[derive(Debug, Clone)]
struct ObjectInfo {
    name: String,
    obj_type: ObjectType,
    index: usize,
}

pub struct SystemBuilder {
    objs_info: Vec<ObjectInfo>,
    reservoirs: Vec<Reservoir>,
    cylinder: Option<Cylinder>,
    connectors: Vec<Box<dyn Connector>>,
    wall: Option<PistonWall>,
    solver: Rosenbrock2,
    max_temperature_step: f64,
}

impl SystemBuilder {
    /// Creates a `SystemBuilder`. This object is used to construct the desired system to simulate.
    /// The construction is made by the object methods exclusively.
    /// Once the building is finished, the system can be built using `build_system()` method.
    ///
    /// # Examples
    /// ```
    /// use diesel_engine_simulator::engine::kinematics::{CrankKinematics, Geometry};
    /// use diesel_engine_simulator::reaction::combustion::NoCombustion;
    /// use diesel_engine_simulator::{Gas, SystemBuilder};
    ///
    /// let gas = Gas::dodecane_air().unwrap();
    /// let geometry = Geometry::new(0.128, 0.5e-3, 14.0).unwrap();
    /// let kinematics = CrankKinematics::new(50.0, geometry).unwrap();
    /// let mut builder = SystemBuilder::new();
    /// builder
    ///     .add_reservoir("intake", &gas).unwrap()
    ///     .add_cylinder("cyl", &gas, kinematics, Box::new(NoCombustion::new())).unwrap()
    ///     .add_valve("intake_valve", -18.0, 198.0, 1e-6).unwrap()
    ///     .connect_from_to("intake_valve", "intake", "cyl").unwrap();
    /// let system = builder.build_system().unwrap();
    /// assert_eq!(system.connector_names(), vec!["intake_valve"]);
    /// ```
    pub fn new() -> SystemBuilder {
        SystemBuilder {
            objs_info: Vec::new(),
            reservoirs: Vec::new(),
            cylinder: None,
            connectors: Vec::new(),
            wall: None,
            solver: Rosenbrock2::new(1e-6, 1e-12),
            max_temperature_step: 20.0,
        }
    }

    /// Build a `System`. `SystemBuilder` objects is consumed in the process.
    pub fn build_system(self) -> ConfigResult<System> {
        let cylinder = self
            .cylinder
            .ok_or_else(|| ConfigError::UnknownObject("cylinder".to_string()))?;
        System::new(
            self.reservoirs,
            cylinder,
            self.connectors,
            self.wall,
            self.solver,
            self.max_temperature_step,
        )
    }

    /// Add a `zero_dim::Reservoir`. It has constant temperature, pressure and composition and infinite mass
    pub fn add_reservoir<'a>(&'a mut self, elem_name: &str, gas: &Gas) -> ConfigResult<&'a mut Self> {
        self.check_name(elem_name)?;
        let i = self.reservoirs.len();
        self.objs_info.push(ObjectInfo::new(elem_name, ObjectType::Reservoir, i));
        self.reservoirs.push(Reservoir::new(elem_name, gas));
        Ok(self)
    }

    /// Add the `zero_dim::Cylinder`, filled with `gas` at top-dead-center. Only one cylinder is allowed.
    pub fn add_cylinder<'a>(
        &'a mut self,
        elem_name: &str,
        gas: &Gas,
        kinematics: CrankKinematics,
        combustion: Box<dyn Combustion>,
    ) -> ConfigResult<&'a mut Self> {
        self.check_name(elem_name)?;
        if let Some(cyl) = &self.cylinder {
            return Err(ConfigError::Connection(format!(
                "the system already has a cylinder: `{}`",
                cyl.name()
            )));
        }
        self.objs_info.push(ObjectInfo::new(elem_name, ObjectType::Cylinder, 0));
        self.cylinder = Some(Cylinder::new(elem_name, gas, kinematics, combustion));
        Ok(self)
    }

    /// Add a `connector::Valve`. Angles in crank-angle degrees, `coeff` in kg/(s.Pa)
    pub fn add_valve<'a>(
        &'a mut self,
        elem_name: &str,
        opening: f64,
        closing: f64,
        coeff: f64,
    ) -> ConfigResult<&'a mut Self> {
        self.check_name(elem_name)?;
        let timing = ValveTiming::new(elem_name, opening, closing)?;
        let valve = Valve::new(elem_name, timing, coeff)?;
        self.push_connector(Box::new(valve));
        Ok(self)
    }

    /// Add a `connector::Injector` delivering `injected_mass` [kg] per cycle. Angles in crank-angle
    /// degrees. The cylinder must be added first since the injection rate depends on the engine speed.
    pub fn add_injector<'a>(
        &'a mut self,
        elem_name: &str,
        opening: f64,
        closing: f64,
        injected_mass: f64,
    ) -> ConfigResult<&'a mut Self> {
        self.check_name(elem_name)?;
        let angular_speed = self.cylinder_kinematics()?.angular_speed();
        let timing = ValveTiming::new(elem_name, opening, closing)?;
        let injector = Injector::new(elem_name, timing, injected_mass, angular_speed)?;
        self.push_connector(Box::new(injector));
        Ok(self)
    }

    /// Add the `connector::PistonWall` between the reservoir `ambient` and the cylinder
    pub fn add_wall<'a>(&'a mut self, elem_name: &str, ambient: &str) -> ConfigResult<&'a mut Self> {
        self.check_name(elem_name)?;
        if self.wall.is_some() {
            return Err(ConfigError::Connection("the system already has a wall".to_string()));
        }
        self.check_type(ambient, ObjectType::Reservoir)?;
        let kinematics = self.cylinder_kinematics()?.clone();
        let cyl_name = self
            .objs_info
            .iter()
            .find(|info| info.obj_type == ObjectType::Cylinder)
            .map(|info| info.name.clone())
            .ok_or_else(|| ConfigError::UnknownObject("cylinder".to_string()))?;
        let mut wall = PistonWall::new(elem_name, kinematics);
        wall.connect(ambient, &cyl_name)?;
        self.objs_info.push(ObjectInfo::new(elem_name, ObjectType::Wall, 0));
        self.wall = Some(wall);
        Ok(self)
    }

    /// Connect a `connector` object to two element objects. Positive flow goes from `from` to `to`.
    pub fn connect_from_to<'a>(
        &'a mut self,
        connector: &str,
        from: &str,
        to: &str,
    ) -> ConfigResult<&'a mut Self> {
        for elem_name in [from, to].iter() {
            if !self.does_it_exist(elem_name) {
                return Err(ConfigError::UnknownObject(elem_name.to_string()));
            }
        }
        let index = self.check_type(connector, ObjectType::Connector)?;
        self.connectors[index].connect_to(from)?;
        self.connectors[index].connect_to(to)?;
        Ok(self)
    }

    /// Relative and absolute tolerances of the cylinder integrator
    pub fn set_tolerances<'a>(&'a mut self, rtol: f64, atol: f64) -> ConfigResult<&'a mut Self> {
        if !(rtol > 0.0 && rtol < 1.0) || !(atol > 0.0) {
            return Err(ConfigError::Solver(format!(
                "tolerances must be positive and rtol below one: rtol = {}, atol = {}",
                rtol, atol
            )));
        }
        self.solver.rtol = rtol;
        self.solver.atol = atol;
        Ok(self)
    }

    /// Largest temperature change [K] accepted in one internal integration step
    pub fn set_max_temperature_step<'a>(&'a mut self, delta: f64) -> ConfigResult<&'a mut Self> {
        self.max_temperature_step = positive("maximum temperature step", delta)?;
        Ok(self)
    }

    /// Largest number of internal steps per call to `System::advance`
    pub fn set_max_steps<'a>(&'a mut self, max_steps: usize) -> ConfigResult<&'a mut Self> {
        if max_steps == 0 {
            return Err(ConfigError::Solver("`max_steps` must be greater than zero".to_string()));
        }
        self.solver.max_steps = max_steps;
        Ok(self)
    }

    /// Smallest internal step [s] before the integration is given up
    pub fn set_min_step<'a>(&'a mut self, min_step: f64) -> ConfigResult<&'a mut Self> {
        self.solver.min_step = positive("minimum step", min_step)?;
        Ok(self)
    }

    fn push_connector(&mut self, conn: Box<dyn Connector>) {
        let i = self.connectors.len();
        self.objs_info.push(ObjectInfo::new(conn.name(), ObjectType::Connector, i));
        self.connectors.push(conn);
    }

    fn cylinder_kinematics(&self) -> ConfigResult<&CrankKinematics> {
        self.cylinder
            .as_ref()
            .map(|c| c.kinematics())
            .ok_or_else(|| ConfigError::UnknownObject("cylinder".to_string()))
    }

    fn check_name(&self, elem_name: &str) -> ConfigResult<()> {
        if self.does_it_exist(elem_name) {
            Err(ConfigError::DuplicateName(elem_name.to_string()))
        } else {
            Ok(())
        }
    }

    /// Index of `elem_name` among the objects of its type
    fn check_type(&self, elem_name: &str, obj_type: ObjectType) -> ConfigResult<usize> {
        match self.objs_info.iter().find(|info| info.name == elem_name) {
            Some(info) if info.obj_type == obj_type => Ok(info.index),
            Some(info) => Err(ConfigError::Connection(format!(
                "`{}` is a {:?}, expected a {:?}",
                elem_name, info.obj_type, obj_type
            ))),
            None => Err(ConfigError::UnknownObject(elem_name.to_string())),
        }
    }

    fn does_it_exist(&self, obj_name: &str) -> bool {
        self.objs_info.iter().any(|info| info.name == obj_name)
    }
}

impl ObjectInfo {
    fn new(name: &str, obj_type: ObjectType, index: usize) -> ObjectInfo {
        ObjectInfo {
            name: name.to_string(),
            obj_type,
            index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::kinematics::Geometry;
    use crate::reaction::combustion::NoCombustion;

    fn kinematics() -> CrankKinematics {
        let geometry = Geometry::new(0.128, 0.5e-3, 14.0).unwrap();
        CrankKinematics::new(50.0, geometry).unwrap()
    }

    fn builder() -> SystemBuilder {
        let gas = Gas::dodecane_air().unwrap();
        let mut builder = SystemBuilder::new();
        builder
            .add_reservoir("intake", &gas)
            .unwrap()
            .add_reservoir("ambient", &gas)
            .unwrap()
            .add_cylinder("cyl", &gas, kinematics(), Box::new(NoCombustion::new()))
            .unwrap();
        builder
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let gas = Gas::dodecane_air().unwrap();
        let mut b = builder();
        assert!(matches!(b.add_reservoir("intake", &gas), Err(ConfigError::DuplicateName(_))));
        assert!(matches!(
            b.add_cylinder("cyl_2", &gas, kinematics(), Box::new(NoCombustion::new())),
            Err(ConfigError::Connection(_))
        ));
    }

    #[test]
    fn injector_needs_the_cylinder() {
        let mut b = SystemBuilder::new();
        assert!(matches!(
            b.add_injector("injector", 350.0, 365.0, 3.2e-5),
            Err(ConfigError::UnknownObject(_))
        ));
    }

    #[test]
    fn unknown_and_wrong_objects() {
        let mut b = builder();
        b.add_valve("valve", -18.0, 198.0, 1e-6).unwrap();
        assert!(matches!(
            b.connect_from_to("valve", "nowhere", "cyl"),
            Err(ConfigError::UnknownObject(_))
        ));
        assert!(matches!(
            b.connect_from_to("intake", "ambient", "cyl"),
            Err(ConfigError::Connection(_))
        ));
        assert!(b.add_wall("piston", "cyl").is_err());
    }

    #[test]
    fn unconnected_valve_fails_to_build() {
        let mut b = builder();
        b.add_valve("valve", -18.0, 198.0, 1e-6).unwrap();
        assert!(matches!(b.build_system(), Err(ConfigError::Connection(_))));
    }

    #[test]
    fn valve_between_reservoirs_fails_to_build() {
        let mut b = builder();
        b.add_valve("valve", -18.0, 198.0, 1e-6)
            .unwrap()
            .connect_from_to("valve", "intake", "ambient")
            .unwrap();
        assert!(matches!(b.build_system(), Err(ConfigError::Connection(_))));
    }

    #[test]
    fn builds_with_wall() {
        let mut b = builder();
        b.add_valve("valve", -18.0, 198.0, 1e-6)
            .unwrap()
            .connect_from_to("valve", "intake", "cyl")
            .unwrap()
            .add_wall("piston", "ambient")
            .unwrap()
            .set_tolerances(1e-6, 1e-12)
            .unwrap();
        let system = b.build_system().unwrap();
        assert_eq!(system.time(), 0.0);
        assert_eq!(system.wall_work_rate(), 0.0);
        assert_eq!(system.throughput("valve"), Some(0.0));
        assert!(system.throughput("other").is_none());
    }

    #[test]
    fn invalid_solver_settings() {
        let mut b = builder();
        assert!(b.set_tolerances(0.0, 1e-12).is_err());
        assert!(b.set_max_temperature_step(-1.0).is_err());
        assert!(b.set_max_steps(0).is_err());
        assert!(b.set_min_step(0.0).is_err());
        assert!(b.set_min_step(1e-12).is_ok());
    }

    #[test]
    fn missing_cylinder() {
        let gas = Gas::dodecane_air().unwrap();
        let mut b = SystemBuilder::new();
        b.add_reservoir("intake", &gas).unwrap();
        assert!(matches!(b.build_system(), Err(ConfigError::UnknownObject(_))));
    }
}
