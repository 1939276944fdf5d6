//! Solver for stiff systems of ordinary differential equations (ODE)

use nalgebra::{DMatrix, DVector};
use ndarray::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("step size {step:.3e} s fell below the minimum of {min_step:.3e} s")]
    StepSizeTooSmall { step: f64, min_step: f64 },

    #[error("more than {0} internal steps were needed to reach the requested time")]
    TooManySteps(usize),

    #[error("state left the valid domain: {0}")]
    InvalidState(String),

    #[error("singular iteration matrix")]
    SingularMatrix,
}

/// A system `dx/dt = f(t, x)` that can be advanced by `Rosenbrock2`.
pub trait OdeSystem {
    /// Returns `f(t, x)`, or `SolverError::InvalidState` when `x` is outside the physical domain.
    fn derivatives(&self, t: f64, x: &Array1<f64>) -> Result<Array1<f64>, SolverError>;

    /// Largest acceptable fraction of a step going from `x` to `x_new`. Values below 1.0
    /// reject the step and shrink it accordingly.
    fn advance_limit(&self, _x: &Array1<f64>, _x_new: &Array1<f64>) -> f64 {
        1.0
    }

    /// Multiplies the absolute tolerance of component `i`.
    fn tolerance_scale(&self, _i: usize) -> f64 {
        1.0
    }
}

/// Adaptive two-stage Rosenbrock method (ROS2, Verwer et al.) with an embedded first order
/// error estimate.
///
/// The method is L-stable and of second order for any approximation of the Jacobian, so the
/// Jacobian is evaluated by forward differences once per step. The step size is remembered
/// between calls to `advance`.
///
/// # Examples
///
/// ```
/// use diesel_engine_simulator::ode_solvers::{OdeSystem, Rosenbrock2, SolverError};
/// use ndarray::*;
///
/// // stiff linear decay towards cos(t)
/// struct Stiff;
/// impl OdeSystem for Stiff {
///     fn derivatives(&self, t: f64, x: &Array1<f64>) -> Result<Array1<f64>, SolverError> {
///         Ok(array![-1000.0 * (x[0] - t.cos())])
///     }
/// }
/// let mut solver = Rosenbrock2::new(1e-6, 1e-10);
/// let x = solver.advance(&Stiff, 0.0, &array![0.0], 1.0).unwrap();
/// assert!((x[0] - 1f64.cos()).abs() < 2e-3);
/// ```
#[derive(Debug, Clone)]
pub struct Rosenbrock2 {
    pub rtol: f64,
    pub atol: f64,
    pub min_step: f64,
    pub max_step: f64,
    pub max_steps: usize,
    step: f64,
    accepted: usize,
    rejected: usize,
}

const GAMMA: f64 = 1.0 + std::f64::consts::FRAC_1_SQRT_2;
const SAFETY: f64 = 0.9;

impl Rosenbrock2 {
    pub fn new(rtol: f64, atol: f64) -> Rosenbrock2 {
        Rosenbrock2 {
            rtol,
            atol,
            min_step: 1e-14,
            max_step: std::f64::INFINITY,
            max_steps: 100_000,
            step: 0.0,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Forgets the remembered step size, e.g. after a discontinuity of the right-hand side
    pub fn restart(&mut self) {
        self.step = 0.0;
    }

    /// Number of accepted and rejected internal steps since creation
    pub fn statistics(&self) -> (usize, usize) {
        (self.accepted, self.rejected)
    }

    /// Integrates `system` from `(t_start, x_start)` to `t_end` and returns the state at `t_end`.
    /// Internal steps are not reported.
    pub fn advance<S: OdeSystem>(
        &mut self,
        system: &S,
        t_start: f64,
        x_start: &Array1<f64>,
        t_end: f64,
    ) -> Result<Array1<f64>, SolverError> {
        let mut t = t_start;
        let mut x = x_start.clone();
        if t_end <= t_start {
            return Ok(x);
        }
        let mut f0 = system.derivatives(t, &x)?;
        let mut h = if self.step > 0.0 {
            self.step
        } else {
            0.01 * (t_end - t_start)
        };
        h = h.min(self.max_step);
        let mut jac: Option<DMatrix<f64>> = None;
        let mut n_steps = 0;

        while t < t_end {
            n_steps += 1;
            if n_steps > self.max_steps {
                return Err(SolverError::TooManySteps(self.max_steps));
            }
            let remaining = t_end - t;
            let truncated = h >= remaining;
            let h_try = if truncated { remaining } else { h };
            if h_try < self.min_step && !truncated {
                return Err(SolverError::StepSizeTooSmall {
                    step: h_try,
                    min_step: self.min_step,
                });
            }

            let jacobian = match jac.take() {
                Some(j) => j,
                None => self.numerical_jacobian(system, t, &x, &f0),
            };
            let outcome = self.try_step(system, t, &x, &f0, &jacobian, h_try);

            match outcome {
                Ok((x_new, f_new, err, limit)) if err <= 1.0 && limit >= 1.0 => {
                    t = if truncated { t_end } else { t + h_try };
                    x = x_new;
                    f0 = f_new;
                    self.accepted += 1;
                    let factor = (SAFETY * err.max(1e-10).powf(-0.5)).min(5.0).max(0.2);
                    // a truncated final step says nothing about the step size that fits
                    if !truncated || factor < 1.0 {
                        h = (h_try * factor).min(self.max_step);
                    }
                    log::trace!("accepted step t = {:.6e}, h = {:.3e}, err = {:.3e}", t, h_try, err);
                }
                Ok((_, _, err, limit)) => {
                    self.rejected += 1;
                    jac = Some(jacobian);
                    let factor = if limit < 1.0 {
                        (SAFETY * limit).max(0.05)
                    } else {
                        (SAFETY * err.powf(-0.5)).min(0.9).max(0.1)
                    };
                    h = h_try * factor;
                    log::trace!("rejected step t = {:.6e}, err = {:.3e}, limit = {:.3}", t, err, limit);
                }
                Err(SolverError::InvalidState(_)) | Err(SolverError::SingularMatrix)
                    if h_try > self.min_step =>
                {
                    self.rejected += 1;
                    jac = Some(jacobian);
                    h = 0.25 * h_try;
                    log::trace!("rejected step t = {:.6e}: invalid trial state", t);
                }
                Err(err) => return Err(err),
            }
        }
        self.step = h;
        Ok(x)
    }

    /// One ROS2 step. Returns the new state, its derivative, the scaled error norm and the
    /// advance limit reported by the system.
    fn try_step<S: OdeSystem>(
        &self,
        system: &S,
        t: f64,
        x: &Array1<f64>,
        f0: &Array1<f64>,
        jac: &DMatrix<f64>,
        h: f64,
    ) -> Result<(Array1<f64>, Array1<f64>, f64, f64), SolverError> {
        let n = x.len();
        let w = DMatrix::<f64>::identity(n, n) - jac * (GAMMA * h);
        let lu = w.lu();
        if !lu.is_invertible() {
            return Err(SolverError::SingularMatrix);
        }
        let solve = |rhs: &Array1<f64>| -> Result<Array1<f64>, SolverError> {
            lu.solve(&DVector::from_iterator(n, rhs.iter().cloned()))
                .map(|v| Array1::from_iter(v.iter().cloned()))
                .ok_or(SolverError::SingularMatrix)
        };

        let k1 = solve(f0)?;
        let x1 = x + &(&k1 * h);
        let f1 = system.derivatives(t + h, &x1)?;
        let k2 = solve(&(&f1 - &(&k1 * 2.0)))?;

        let x_new = x + &(&k1 * (1.5 * h)) + &(&k2 * (0.5 * h));
        let error = (&k1 + &k2) * (0.5 * h);

        let mut sum = 0.0;
        for i in 0..n {
            let scale = self.atol * system.tolerance_scale(i)
                + self.rtol * x[i].abs().max(x_new[i].abs());
            sum += (error[i] / scale).powi(2);
        }
        let err = (sum / n as f64).sqrt();
        if !err.is_finite() {
            return Err(SolverError::InvalidState("non-finite error estimate".to_string()));
        }
        let limit = system.advance_limit(x, &x_new);
        let f_new = system.derivatives(t + h, &x_new)?;
        Ok((x_new, f_new, err, limit))
    }

    /// Forward-difference Jacobian. Columns whose perturbed state is invalid are tried backwards,
    /// and left at zero if both directions fail.
    fn numerical_jacobian<S: OdeSystem>(
        &self,
        system: &S,
        t: f64,
        x: &Array1<f64>,
        f0: &Array1<f64>,
    ) -> DMatrix<f64> {
        let n = x.len();
        let mut jac = DMatrix::<f64>::zeros(n, n);
        let sqrt_eps = std::f64::EPSILON.sqrt();
        let mut xp = x.clone();
        for j in 0..n {
            let delta = sqrt_eps * x[j].abs().max(self.atol * system.tolerance_scale(j)).max(1e-300);
            for &d in [delta, -delta].iter() {
                xp[j] = x[j] + d;
                if let Ok(fp) = system.derivatives(t, &xp) {
                    for i in 0..n {
                        jac[(i, j)] = (fp[i] - f0[i]) / d;
                    }
                    break;
                }
            }
            xp[j] = x[j];
        }
        jac
    }
}
