use crate::error::{positive, ConfigError, ConfigResult};
use std::f64::consts::PI;

/// Length of a four-stroke cycle in crank-angle radians
pub const CYCLE_ANGLE: f64 = 4.0 * PI;

#[derive(Debug, Clone)]
pub struct Geometry {
    compression_ratio: f64, //[-]
    diameter: f64,          //[m]
    stroke: f64,            //[m]
    transverse_area: f64,   //[m²]
    displacement: f64,      //[m³]
    clearance: f64,         //[m³]
    total_volume: f64,      //[m³]
}

impl Geometry {
    /// Creates a `Geometry` object. Inputs must be in SI units
    pub fn new(diam: f64, displ: f64, comp_ratio: f64) -> ConfigResult<Geometry> {
        let diam = positive("bore", diam)?;
        let displ = positive("displaced volume", displ)?;
        if !(comp_ratio > 1.0) || !comp_ratio.is_finite() {
            return Err(ConfigError::CompressionRatio(comp_ratio));
        }
        let transverse_area = 0.25 * PI * diam * diam;
        let stroke = displ / transverse_area;
        let clearance = displ / (comp_ratio - 1.0);
        let total_volume = displ + clearance;
        Ok(Geometry {
            compression_ratio: comp_ratio,
            diameter: diam,
            stroke,
            transverse_area,
            displacement: displ,
            clearance,
            total_volume,
        })
    }

    pub fn compression_ratio(&self) -> f64 {
        self.compression_ratio
    }
    pub fn diameter(&self) -> f64 {
        self.diameter
    }
    pub fn stroke(&self) -> f64 {
        self.stroke
    }
    pub fn piston_area(&self) -> f64 {
        self.transverse_area
    }
    pub fn displacement(&self) -> f64 {
        self.displacement
    }
    /// Top-dead-center volume
    pub fn clearance(&self) -> f64 {
        self.clearance
    }
    /// Bottom-dead-center volume
    pub fn total_volume(&self) -> f64 {
        self.total_volume
    }
}

/// Crank angle and piston motion as functions of time. The piston velocity follows a sinusoidal
/// profile; the connecting rod obliquity is not modeled.
#[derive(Debug, Clone)]
pub struct CrankKinematics {
    speed: f64,      // [RPS]
    sec_to_rad: f64, // constant: 2*PI*speed
    geometry: Geometry,
}

impl CrankKinematics {
    /// `speed` in revolutions per second
    pub fn new(speed: f64, geometry: Geometry) -> ConfigResult<CrankKinematics> {
        let speed = positive("engine speed", speed)?;
        Ok(CrankKinematics {
            speed,
            sec_to_rad: 2.0 * PI * speed,
            geometry,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// [RPS]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// [rad/s]
    pub fn angular_speed(&self) -> f64 {
        self.sec_to_rad
    }

    /// Time [s] for the crank to turn one degree
    pub fn time_per_degree(&self) -> f64 {
        1.0 / (360.0 * self.speed)
    }

    /// Crank angle [rad] in `[0, 4π)`
    pub fn crank_angle(&self, t: f64) -> f64 {
        (self.sec_to_rad * t).rem_euclid(CYCLE_ANGLE)
    }

    /// Piston velocity [m/s], positive towards the cylinder head
    pub fn piston_velocity(&self, t: f64) -> f64 {
        -0.5 * self.geometry.stroke * self.sec_to_rad * self.crank_angle(t).sin()
    }

    /// Cylinder volume [m³], the closed-form integral of the piston velocity
    pub fn volume(&self, t: f64) -> f64 {
        self.geometry.clearance
            + 0.5 * self.geometry.displacement * (1.0 - self.crank_angle(t).cos())
    }

    /// [m³/s]
    pub fn volume_rate(&self, t: f64) -> f64 {
        -self.geometry.transverse_area * self.piston_velocity(t)
    }
}

impl std::fmt::Display for CrankKinematics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "speed: {:.0} [RPM]  bore: {:.1} [mm]  stroke: {:.1} [mm]  displacement: {:.1} [cm³]  compression ratio: {:.1}",
            self.speed * 60.0,
            self.geometry.diameter * 1e3,
            self.geometry.stroke * 1e3,
            self.geometry.displacement * 1e6,
            self.geometry.compression_ratio,
        )
    }
}
