use crate::domains::logger::{DomainLogger, FileLogger};
use std::sync::Arc;

/// Install `fast_log` for `path` and hand back a logger that writes to it.
pub fn init_file_logger(path: &str) -> Result<Arc<dyn DomainLogger>, String> {
    FileLogger::init(path).map_err(|e| format!("Failed to initialize fast_log: {}", e))?;
    Ok(Arc::new(FileLogger))
}
