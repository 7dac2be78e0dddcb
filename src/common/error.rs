use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Agent not found: {id}")]
    AgentNotFound { id: String },

    #[error("Invalid command: {reason}")]
    InvalidCommand { reason: String },

    #[error("Invalid {entity} {id}: {reason}")]
    InvalidInput {
        entity: &'static str,
        id: String,
        reason: String,
    },

    #[error("Store error: {0}")]
    TransientStore(String),

    #[error("Cycle failed for agent {agent_id}: {reason}")]
    CycleFailed { agent_id: String, reason: String },

    #[error("Health check failed for agent {agent_id}: {reason}")]
    HealthCheckFailure { agent_id: String, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Infrastructure error: {0}")]
    InfrastructureError(String),
}

impl DomainError {
    pub fn invalid_input(entity: &'static str, id: impl Into<String>, reason: impl Into<String>) -> Self {
        DomainError::InvalidInput {
            entity,
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Errors the next cycle is expected to clear on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::TransientStore(_) | DomainError::CycleFailed { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;
pub type ApplicationResult<T> = Result<T, ApplicationError>;
