#![deny(unsafe_code)]
#![warn(clippy::all)]

mod controller;
pub mod resource;
pub mod server;
pub mod wire;

pub use controller::run;
pub use resource::{PeeringServer, PeeringServerPhase, PeeringServerSpec, PeeringServerStatus};
