use crate::domains::logger::DomainLogger;
use std::sync::Arc;

/// Writes through `tracing`, so output follows the subscriber installed in main.
struct ConsoleBridge;

impl DomainLogger for ConsoleBridge {
    fn info(&self, msg: &str) {
        tracing::info!("{}", msg);
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!("{}", msg);
    }
}

pub fn init_console_logger() -> Arc<dyn DomainLogger> {
    Arc::new(ConsoleBridge)
}
