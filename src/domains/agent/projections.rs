use super::aggregate::{AgentKind, AgentRecord, AgentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the status endpoint shows for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatusReport {
    pub agent_id: String,
    pub kind: AgentKind,
    pub status: AgentStatus,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub consecutive_failures: u32,
    pub restart_attempts: u32,
    pub requires_intervention: bool,
    pub last_error: Option<String>,
}

impl From<&AgentRecord> for AgentStatusReport {
    fn from(record: &AgentRecord) -> Self {
        Self {
            agent_id: record.id.clone(),
            kind: record.kind,
            status: record.status,
            last_heartbeat: record.last_heartbeat,
            tasks_completed: record.tasks_completed,
            tasks_failed: record.tasks_failed,
            consecutive_failures: record.consecutive_failures,
            restart_attempts: record.restart_attempts,
            requires_intervention: record.requires_intervention,
            last_error: record.last_error.clone(),
        }
    }
}

/// Fleet-wide rollup of agent reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetOverview {
    pub total_agents: usize,
    pub by_status: BTreeMap<AgentStatus, usize>,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub needs_attention: Vec<String>,
}

impl FleetOverview {
    pub fn from_reports(reports: &[AgentStatusReport]) -> Self {
        let mut overview = Self {
            total_agents: reports.len(),
            ..Self::default()
        };
        for report in reports {
            *overview.by_status.entry(report.status).or_insert(0) += 1;
            overview.tasks_completed += report.tasks_completed;
            overview.tasks_failed += report.tasks_failed;
            if report.requires_intervention {
                overview.needs_attention.push(report.agent_id.clone());
            }
        }
        overview
    }

    pub fn count(&self, status: AgentStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}
