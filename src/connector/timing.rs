use crate::engine::kinematics::CYCLE_ANGLE;
use crate::error::{ConfigError, ConfigResult};

/// Crank-angle window during which a flow device is open. Windows may straddle the end of the
/// cycle, e.g. an exhaust valve opening at 522° and closing at 18°.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValveTiming {
    opening: f64,       // [CA rad]
    closing: f64,       // [CA rad]
    open_duration: f64, // [CA rad]
}

impl ValveTiming {
    /// Angles in crank-angle degrees; negative or larger-than-cycle values are wrapped
    pub fn new(name: &str, opening: f64, closing: f64) -> ConfigResult<ValveTiming> {
        let open_rad = opening.to_radians();
        let close_rad = closing.to_radians();
        let open_duration = (close_rad - open_rad).rem_euclid(CYCLE_ANGLE);
        if !(open_duration > 0.0) {
            return Err(ConfigError::EmptyWindow {
                name: name.to_string(),
                opening,
                closing,
            });
        }
        Ok(ValveTiming {
            opening: open_rad.rem_euclid(CYCLE_ANGLE),
            closing: close_rad.rem_euclid(CYCLE_ANGLE),
            open_duration,
        })
    }

    /// `angle` in [CA rad]
    pub fn is_open(&self, angle: f64) -> bool {
        (angle - self.opening).rem_euclid(CYCLE_ANGLE) < self.open_duration
    }

    /// [CA rad]
    pub fn opening(&self) -> f64 {
        self.opening
    }
    /// [CA rad]
    pub fn closing(&self) -> f64 {
        self.closing
    }
    /// [CA rad]
    pub fn open_duration(&self) -> f64 {
        self.open_duration
    }
    /// Opening and closing angles [CA rad], where the device switches
    pub fn edges(&self) -> [f64; 2] {
        [self.opening, self.closing]
    }
}
