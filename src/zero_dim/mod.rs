//! Zero-dimensional objects: the cylinder and fixed-state reservoirs
pub mod cylinder;
pub mod reservoir;
