pub mod actions;
pub mod behaviors;
pub mod health_monitor;
pub mod publisher;
pub mod scheduler;
pub mod supervisor;

pub use actions::*;
pub use behaviors::*;
pub use health_monitor::*;
pub use publisher::*;
pub use scheduler::*;
pub use supervisor::*;
