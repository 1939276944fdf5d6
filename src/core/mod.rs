//! Reactor network, its builder and the simulation driver
pub mod simulation;
pub mod system;
pub mod system_builder;
pub mod traits;
