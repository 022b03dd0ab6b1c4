mod bus;
mod bus_types;
mod error;
mod fd;
mod network;
mod newton;
mod pf;
mod pfopt;
mod solver;
mod ybus;

pub mod debug;
pub mod math;
pub mod traits;

pub use bus::*;
pub use bus_types::*;
pub use error::*;
pub use fd::*;
pub use network::*;
pub use newton::*;
pub use pf::*;
pub use pfopt::*;
pub use solver::*;
pub use ybus::*;

#[cfg(test)]
mod tests;
