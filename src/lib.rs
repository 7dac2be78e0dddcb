pub mod adapters;
pub mod application;
pub mod common;
pub mod config;
pub mod domains;

pub use config::Config;

// Re-export common types
pub use common::{ApplicationError, ApplicationResult, Clock, DomainError, DomainResult, SystemClock};

// Re-export the domain types most callers need
pub use domains::{AgentKind, AgentStatus, DomainLogger, DynLogger, Location, Notifier, Order, Store, Vehicle};
