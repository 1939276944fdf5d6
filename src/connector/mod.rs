//! Flow devices and walls linking the cylinder to its surroundings
pub mod injector;
pub mod timing;
pub mod valve;
pub mod wall;
