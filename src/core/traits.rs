use crate::error::ConfigResult;
use crate::BasicProperties;
use ndarray::*;

pub trait ZeroDim {
    fn name<'a>(&'a self) -> &'a str;
    fn get_state(&self) -> BasicProperties;
}

pub trait Connector {
    fn name<'a>(&'a self) -> &'a str;
    /// Objects connected, in the order of positive flow: `[upstream, downstream]`
    fn connecting<'a>(&'a self) -> &'a Vec<String>;
    fn connect_to(&mut self, elem_name: &str) -> ConfigResult<()>;
    /// Signed mass flow [kg/s] from `connecting()[0]` to `connecting()[1]` at crank angle
    /// `angle` [CA rad]
    fn mass_flow(&self, angle: f64, from: &BasicProperties, to: &BasicProperties) -> f64;
    /// Crank angles [CA rad] at which `mass_flow` jumps
    fn switching_angles(&self) -> Vec<f64> {
        Vec::new()
    }
}

pub trait SaveData {
    fn get_headers(&self) -> String;
    fn num_storable_variables(&self) -> usize;
    fn get_storable_data(&self) -> Array1<f64>;
}
