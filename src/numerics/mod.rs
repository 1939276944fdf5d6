//! Numerical tools: stiff ODE integration and small dense linear algebra
pub mod ode_solvers;
