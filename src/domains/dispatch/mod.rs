pub mod engine;
pub mod events;
pub mod geo;
pub mod ports;
pub mod route_builder;
pub mod types;

pub use engine::*;
pub use events::*;
pub use geo::*;
pub use ports::*;
pub use route_builder::*;
pub use types::*;
