pub mod broadcast_notifier;
pub mod console_logger;
pub mod file_logger;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory_store;
pub mod multi_logger;
pub mod noop_logger;
pub mod postgres;

pub use broadcast_notifier::*;
pub use console_logger::*;
pub use file_logger::*;
#[cfg(feature = "kafka")]
pub use kafka::*;
pub use memory_store::*;
pub use multi_logger::*;
pub use noop_logger::*;
pub use postgres::*;
