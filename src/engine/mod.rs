//! Engine geometry, configuration of the cycle simulation and performance curves
pub mod config;
pub mod kinematics;
pub mod performance;
