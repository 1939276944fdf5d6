use crate::connector::wall::PistonWall;
use crate::engine::kinematics::CYCLE_ANGLE;
use crate::core::traits::{Connector, ZeroDim};
use crate::error::{ConfigError, ConfigResult, SimulationError, SimulationResult};
use crate::numerics::ode_solvers::{OdeSystem, Rosenbrock2, SolverError};
use crate::zero_dim::cylinder::{gas_properties, Cylinder};
use crate::zero_dim::reservoir::Reservoir;
use crate::{BasicProperties, FlowRatio};
use ndarray::*;

/// Absolute tolerance multiplier of the cylinder internal energy [J per kg of tolerance]
const ENERGY_TOLERANCE_SCALE: f64 = 1e7;

/// Switching instants closer than this fraction of the interval to one of its ends are taken
/// as falling on that end
const EDGE_RESOLUTION: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Side {
    Cylinder,
    Reservoir(usize),
}

#[derive(Debug, Clone, Copy)]
struct Link {
    from: Side,
    to: Side,
}

/// Reactor network: one cylinder exchanging mass with fixed reservoirs through connectors and
/// work with the ambient through the piston wall.
///
/// The integrated state is the cylinder state followed by the cumulative mass [kg] that went
/// through each connector in its positive direction.
pub struct System {
    reservoirs: Vec<Reservoir>,
    cylinder: Cylinder,
    connectors: Vec<Box<dyn Connector>>,
    links: Vec<Link>,
    wall: Option<(PistonWall, usize)>,
    solver: Rosenbrock2,
    max_temperature_step: f64, // [K]
    throughput: Array1<f64>,   // [kg]
    time: f64,                 // [s]
}

impl System {
    pub(crate) fn new(
        reservoirs: Vec<Reservoir>,
        cylinder: Cylinder,
        connectors: Vec<Box<dyn Connector>>,
        wall: Option<PistonWall>,
        solver: Rosenbrock2,
        max_temperature_step: f64,
    ) -> ConfigResult<System> {
        let find = |name: &str| -> ConfigResult<Side> {
            if name == cylinder.name() {
                Ok(Side::Cylinder)
            } else {
                reservoirs
                    .iter()
                    .position(|r| r.name() == name)
                    .map(Side::Reservoir)
                    .ok_or_else(|| ConfigError::UnknownObject(name.to_string()))
            }
        };

        let mut links = Vec::with_capacity(connectors.len());
        for conn in connectors.iter() {
            let connecting = conn.connecting();
            if connecting.len() != 2 {
                return Err(ConfigError::Connection(format!(
                    "`{}` must connect two objects, connecting: {}",
                    conn.name(),
                    connecting.len()
                )));
            }
            let link = Link {
                from: find(connecting[0].as_str())?,
                to: find(connecting[1].as_str())?,
            };
            if link.from != Side::Cylinder && link.to != Side::Cylinder {
                return Err(ConfigError::Connection(format!(
                    "`{}` is not connected to `{}`",
                    conn.name(),
                    cylinder.name()
                )));
            }
            if link.from == link.to {
                return Err(ConfigError::Connection(format!(
                    "`{}` connects `{}` to itself",
                    conn.name(),
                    connecting[0]
                )));
            }
            links.push(link);
        }

        let wall = match wall {
            Some(w) => {
                let ambient = match w.connecting().first().map(|name| find(name.as_str())) {
                    Some(Ok(Side::Reservoir(i))) => i,
                    Some(Err(err)) => return Err(err),
                    _ => {
                        return Err(ConfigError::Connection(format!(
                            "wall `{}` must separate a reservoir from the cylinder",
                            w.name()
                        )))
                    }
                };
                Some((w, ambient))
            }
            None => None,
        };

        let throughput = Array1::zeros(connectors.len());
        let time = cylinder.time();
        Ok(System {
            reservoirs,
            cylinder,
            connectors,
            links,
            wall,
            solver,
            max_temperature_step,
            throughput,
            time,
        })
    }

    /// Integrates the network up to `t_end` [s]. The interval is split where a valve, the
    /// injector or the combustion model switches, and the solver restarts there. On failure
    /// the system keeps its last valid state, which is also carried by the error.
    pub fn advance(&mut self, t_end: f64) -> SimulationResult<()> {
        let n = self.cylinder.n_state();
        let mut x = Array1::zeros(n + self.throughput.len());
        x.slice_mut(s![..n]).assign(self.cylinder.state());
        x.slice_mut(s![n..]).assign(&self.throughput);

        let resolution = EDGE_RESOLUTION * (t_end - self.time).abs();
        let edges = self.switching_times(t_end);
        if edges.first().map_or(false, |e| *e <= self.time + resolution) {
            self.solver.restart();
        }
        let mut t = self.time;
        let mut bounds: Vec<f64> = edges
            .into_iter()
            .filter(|e| *e > self.time + resolution)
            .collect();
        bounds.push(t_end);
        for (i, t_next) in bounds.iter().enumerate() {
            let network = Network {
                reservoirs: &self.reservoirs,
                cylinder: &self.cylinder,
                connectors: &self.connectors,
                links: &self.links,
                max_temperature_step: self.max_temperature_step,
                gate_angle: self.cylinder.kinematics().crank_angle(0.5 * (t + t_next)),
            };
            x = match self.solver.advance(&network, t, &x, *t_next) {
                Ok(x_new) => x_new,
                Err(source) => return Err(self.integration_error(source)),
            };
            t = *t_next;
            if i + 1 < bounds.len() {
                log::trace!("gate switch at t = {:.6e} s", t);
                self.solver.restart();
            }
        }
        let x_new = x;
        if let Err(source) = self.cylinder.set_state(t_end, x_new.slice(s![..n])) {
            return Err(self.integration_error(source));
        }
        self.throughput.assign(&x_new.slice(s![n..]));
        self.time = t_end;
        Ok(())
    }

    /// Instants in `[time, t_end - resolution)` at which a connector or the combustion model
    /// switches, sorted. An instant within the resolution before `time` counts as `time`.
    fn switching_times(&self, t_end: f64) -> Vec<f64> {
        let kinematics = self.cylinder.kinematics();
        let omega = kinematics.angular_speed();
        let period = CYCLE_ANGLE / omega;
        let resolution = EDGE_RESOLUTION * (t_end - self.time).abs();
        let angle = kinematics.crank_angle(self.time);

        let mut angles: Vec<f64> = self
            .connectors
            .iter()
            .flat_map(|c| c.switching_angles())
            .collect();
        angles.extend(self.cylinder.combustion().switching_angles());

        let mut times = Vec::new();
        for edge in angles {
            let mut ahead = (edge - angle).rem_euclid(CYCLE_ANGLE) / omega;
            if ahead > period - resolution {
                ahead -= period;
            }
            let mut t_edge = self.time + ahead.max(0.0);
            while t_edge < t_end - resolution {
                times.push(t_edge);
                t_edge += period;
            }
        }
        times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        times.dedup_by(|a, b| (*a - *b).abs() <= resolution);
        times
    }

    fn integration_error(&self, source: SolverError) -> SimulationError {
        log::error!(
            "integration failed at t = {:.6e} s, last valid state: T = {:.1} K, P = {:.3e} Pa",
            self.time,
            self.cylinder.gas().T(),
            self.cylinder.gas().P()
        );
        SimulationError::Integration {
            time: self.time,
            last_state: Box::new(self.cylinder.gas().clone()),
            source,
        }
    }

    /// [s]
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn cylinder(&self) -> &Cylinder {
        &self.cylinder
    }

    pub fn reservoir(&self, name: &str) -> Option<&Reservoir> {
        self.reservoirs.iter().find(|r| r.name() == name)
    }

    pub fn connector_names(&self) -> Vec<&str> {
        self.connectors.iter().map(|c| c.name()).collect()
    }

    /// Current mass flow [kg/s] of every connector, positive from its first to its second object
    pub fn mass_flows(&self) -> Vec<f64> {
        let angle = self.cylinder.crank_angle();
        let network = Network {
            reservoirs: &self.reservoirs,
            cylinder: &self.cylinder,
            connectors: &self.connectors,
            links: &self.links,
            max_temperature_step: self.max_temperature_step,
            gate_angle: angle,
        };
        network.flows(angle, &self.cylinder.get_state()).0
    }

    /// Current mass flow [kg/s] of connector `name`
    pub fn mass_flow(&self, name: &str) -> Option<f64> {
        let i = self.connectors.iter().position(|c| c.name() == name)?;
        Some(self.mass_flows()[i])
    }

    /// Mass [kg] that went through connector `name` since the start
    pub fn throughput(&self, name: &str) -> Option<f64> {
        let i = self.connectors.iter().position(|c| c.name() == name)?;
        Some(self.throughput[i])
    }

    /// Net mass [kg] that entered the cylinder through its connectors since the start
    pub fn net_inflow(&self) -> f64 {
        self.links
            .iter()
            .zip(self.throughput.iter())
            .map(|(link, m)| match (link.from, link.to) {
                (_, Side::Cylinder) => *m,
                (Side::Cylinder, _) => -*m,
                _ => 0.0,
            })
            .sum()
    }

    /// Current power [W] delivered to the piston, zero without a wall
    pub fn wall_work_rate(&self) -> f64 {
        match &self.wall {
            Some((wall, ambient)) => wall.work_rate(
                self.time,
                self.cylinder.gas().P(),
                self.reservoirs[*ambient].gas().P(),
            ),
            None => 0.0,
        }
    }

    /// Accepted and rejected internal solver steps
    pub fn solver_statistics(&self) -> (usize, usize) {
        self.solver.statistics()
    }

    pub fn print_state(&self) {
        println!("{}", self.cylinder);
        for res in self.reservoirs.iter() {
            println!("{}", res.get_state());
        }
        for (conn, flow) in self.connectors.iter().zip(self.mass_flows()) {
            println!("`{}`: {:.4e} [kg/s]", conn.name(), flow);
        }
    }
}

/// Borrowed view of the network evaluated by the solver
struct Network<'a> {
    reservoirs: &'a [Reservoir],
    cylinder: &'a Cylinder,
    connectors: &'a [Box<dyn Connector>],
    links: &'a [Link],
    max_temperature_step: f64,
    /// Crank angle [CA rad] at which valves, injector and combustion are judged open
    gate_angle: f64,
}

fn pick<'b>(
    side: Side,
    cylinder: &'b BasicProperties<'b>,
    reservoirs: &'b [BasicProperties<'b>],
) -> &'b BasicProperties<'b> {
    match side {
        Side::Cylinder => cylinder,
        Side::Reservoir(i) => &reservoirs[i],
    }
}

impl<'a> Network<'a> {
    /// Signed flow of every connector and the total flow entering the cylinder. Streams carry
    /// the properties of their upstream side.
    fn flows(&self, angle: f64, cylinder: &BasicProperties) -> (Vec<f64>, FlowRatio) {
        let reservoirs: Vec<BasicProperties> =
            self.reservoirs.iter().map(|r| r.get_state()).collect();
        let mut inflow = FlowRatio::new(cylinder.mass_frac.len());
        let mut rates = Vec::with_capacity(self.connectors.len());
        for (conn, link) in self.connectors.iter().zip(self.links.iter()) {
            let from = pick(link.from, cylinder, &reservoirs);
            let to = pick(link.to, cylinder, &reservoirs);
            let mass_flow = conn.mass_flow(angle, from, to);
            let upstream = if mass_flow >= 0.0 { from } else { to };
            let into_cylinder = match (link.from, link.to) {
                (_, Side::Cylinder) => mass_flow,
                (Side::Cylinder, _) => -mass_flow,
                _ => 0.0,
            };
            if into_cylinder != 0.0 {
                inflow = &inflow + &FlowRatio::from_stream(into_cylinder, upstream);
            }
            rates.push(mass_flow);
        }
        (rates, inflow)
    }
}

impl<'a> OdeSystem for Network<'a> {
    fn derivatives(&self, t: f64, x: &Array1<f64>) -> Result<Array1<f64>, SolverError> {
        let n = self.cylinder.n_state();
        let gas = self.cylinder.gas_from_state(t, x.slice(s![..n]))?;
        let state = gas_properties(self.cylinder.name(), &gas);
        let (rates, inflow) = self.flows(self.gate_angle, &state);

        let mut dx = Array1::zeros(x.len());
        let d_cyl = self
            .cylinder
            .derivatives(t, self.gate_angle, &gas, x.slice(s![1..n]), &inflow);
        dx.slice_mut(s![..n]).assign(&d_cyl);
        for (j, rate) in rates.iter().enumerate() {
            dx[n + j] = *rate;
        }
        Ok(dx)
    }

    fn advance_limit(&self, x: &Array1<f64>, x_new: &Array1<f64>) -> f64 {
        let n = self.cylinder.n_state();
        let temps = (
            self.cylinder.temperature_of(x.slice(s![..n])),
            self.cylinder.temperature_of(x_new.slice(s![..n])),
        );
        match temps {
            (Some(t_old), Some(t_new)) => {
                let delta = (t_new - t_old).abs();
                if delta > self.max_temperature_step {
                    log::debug!(
                        "temperature step of {:.1} K exceeds the limit of {:.1} K",
                        delta,
                        self.max_temperature_step
                    );
                    self.max_temperature_step / delta
                } else {
                    1.0
                }
            }
            _ => 1.0,
        }
    }

    fn tolerance_scale(&self, i: usize) -> f64 {
        if i == 0 {
            ENERGY_TOLERANCE_SCALE
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::SimulationConfig;
    use approx::assert_relative_eq;

    #[test]
    fn switching_times_over_one_cycle() {
        let system = SimulationConfig::default().build_system().unwrap();
        let period = 2.0 / 50.0;
        let times = system.switching_times(period);
        // exhaust closes, intake closes, injection and ignition, injector closes, end of burn,
        // exhaust opens, intake opens
        let expected = [18.0, 198.0, 350.0, 365.0, 410.0, 522.0, 702.0];
        assert_eq!(times.len(), expected.len());
        for (t, deg) in times.iter().zip(expected.iter()) {
            assert_relative_eq!(*t, deg / 18000.0, max_relative = 1e-9);
        }
        // two cycles repeat every instant once more
        assert_eq!(system.switching_times(2.0 * period).len(), 2 * expected.len());
    }

    #[test]
    fn gate_is_held_between_switches() {
        let mut system = SimulationConfig::default().build_system().unwrap();
        let dt = 1.0 / 18000.0;
        // one step straddling the exhaust closing at 18 degrees
        system.advance(17.5 * dt).unwrap();
        system.advance(18.5 * dt).unwrap();
        assert_relative_eq!(system.time(), 18.5 * dt);
        assert_eq!(system.mass_flow("exhaust_valve"), Some(0.0));
        assert!(system.mass_flow("intake_valve").unwrap() != 0.0);
    }
}
