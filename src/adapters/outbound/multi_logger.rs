use super::{init_console_logger, init_file_logger};
use crate::domains::logger::{DomainLogger, DynLogger};
use std::sync::Arc;

/// Fans each line out to every sink in order.
pub struct MultiLogger {
    sinks: Vec<DynLogger>,
}

impl MultiLogger {
    pub fn new(sinks: Vec<DynLogger>) -> Self {
        Self { sinks }
    }
}

impl DomainLogger for MultiLogger {
    fn info(&self, msg: &str) {
        self.sinks.iter().for_each(|s| s.info(msg));
    }

    fn warn(&self, msg: &str) {
        self.sinks.iter().for_each(|s| s.warn(msg));
    }

    fn error(&self, msg: &str) {
        self.sinks.iter().for_each(|s| s.error(msg));
    }
}

/// File sink plus console. Falls back to console alone if `fast_log`
/// cannot be installed (it is process-global and may already be set).
pub fn init_combined_logger(path: &str) -> DynLogger {
    let console = init_console_logger();
    match init_file_logger(path) {
        Ok(file) => Arc::new(MultiLogger::new(vec![file, console])),
        Err(e) => {
            console.warn(&format!("File logging disabled: {}", e));
            console
        }
    }
}
