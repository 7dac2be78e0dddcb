use super::aggregate::{AgentKind, AgentStatus};
use crate::common::DomainEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    Registered {
        agent_id: String,
        kind: AgentKind,
        cycle_interval_seconds: u64,
        timestamp: DateTime<Utc>,
    },
    Started {
        agent_id: String,
        timestamp: DateTime<Utc>,
    },
    CycleStarted {
        agent_id: String,
        timestamp: DateTime<Utc>,
    },
    CycleCompleted {
        agent_id: String,
        summary: String,
        timestamp: DateTime<Utc>,
    },
    CycleFailed {
        agent_id: String,
        error: String,
        retryable: bool,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        agent_id: String,
        from: AgentStatus,
        to: AgentStatus,
        timestamp: DateTime<Utc>,
    },
    Restarted {
        agent_id: String,
        reason: String,
        automatic: bool,
        timestamp: DateTime<Utc>,
    },
    Stopped {
        agent_id: String,
        timestamp: DateTime<Utc>,
    },
    MarkedOffline {
        agent_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl AgentEvent {
    /// Per-tick bookkeeping stays local; everything else goes to the notifier.
    pub fn is_broadcast(&self) -> bool {
        !matches!(self, AgentEvent::CycleStarted { .. })
    }
}

impl DomainEvent for AgentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AgentEvent::Registered { .. } => "AgentRegistered",
            AgentEvent::Started { .. } => "AgentStarted",
            AgentEvent::CycleStarted { .. } => "AgentCycleStarted",
            AgentEvent::CycleCompleted { .. } => "AgentCycleCompleted",
            AgentEvent::CycleFailed { .. } => "AgentCycleFailed",
            AgentEvent::StatusChanged { .. } => "AgentStatusChanged",
            AgentEvent::Restarted { .. } => "AgentRestarted",
            AgentEvent::Stopped { .. } => "AgentStopped",
            AgentEvent::MarkedOffline { .. } => "AgentMarkedOffline",
        }
    }

    fn aggregate_id(&self) -> &str {
        match self {
            AgentEvent::Registered { agent_id, .. }
            | AgentEvent::Started { agent_id, .. }
            | AgentEvent::CycleStarted { agent_id, .. }
            | AgentEvent::CycleCompleted { agent_id, .. }
            | AgentEvent::CycleFailed { agent_id, .. }
            | AgentEvent::StatusChanged { agent_id, .. }
            | AgentEvent::Restarted { agent_id, .. }
            | AgentEvent::Stopped { agent_id, .. }
            | AgentEvent::MarkedOffline { agent_id, .. } => agent_id,
        }
    }

    fn event_version(&self) -> u64 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AgentEvent::Registered { timestamp, .. }
            | AgentEvent::Started { timestamp, .. }
            | AgentEvent::CycleStarted { timestamp, .. }
            | AgentEvent::CycleCompleted { timestamp, .. }
            | AgentEvent::CycleFailed { timestamp, .. }
            | AgentEvent::StatusChanged { timestamp, .. }
            | AgentEvent::Restarted { timestamp, .. }
            | AgentEvent::Stopped { timestamp, .. }
            | AgentEvent::MarkedOffline { timestamp, .. } => *timestamp,
        }
    }
}
