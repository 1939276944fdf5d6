//! Contains **Gas** struct and all elements related to chemical reactions
pub mod combustion;
pub mod gas;
mod json_data;
pub mod thermo;
