use super::events::AgentEvent;
use crate::common::{AggregateRoot, DomainError, DomainResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Dispatch,
    Route,
    Restock,
    Pricing,
    Forecasting,
    Universal,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Dispatch => "dispatch",
            AgentKind::Route => "route",
            AgentKind::Restock => "restock",
            AgentKind::Pricing => "pricing",
            AgentKind::Forecasting => "forecasting",
            AgentKind::Universal => "universal",
        }
    }

    pub fn plans_dispatch(&self) -> bool {
        matches!(self, AgentKind::Dispatch | AgentKind::Universal)
    }

    pub fn plans_routes(&self) -> bool {
        matches!(self, AgentKind::Dispatch | AgentKind::Route | AgentKind::Universal)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dispatch" => Ok(AgentKind::Dispatch),
            "route" | "routing" => Ok(AgentKind::Route),
            "restock" => Ok(AgentKind::Restock),
            "pricing" => Ok(AgentKind::Pricing),
            "forecasting" | "forecast" => Ok(AgentKind::Forecasting),
            "universal" => Ok(AgentKind::Universal),
            other => Err(DomainError::InvalidCommand {
                reason: format!("Unknown agent kind '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    Idle,
    Active,
    Busy,
    Error,
    Offline,
}

/// Supervisor-owned record of one logical agent. Every mutation goes
/// through an `AgentEvent` so the history can be broadcast and replayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub kind: AgentKind,
    pub status: AgentStatus,
    pub cycle_interval_seconds: u64,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    /// Restarts since the last successful cycle.
    pub restart_attempts: u32,
    /// Set when auto-restart gave up; cleared by a manual restart.
    pub requires_intervention: bool,
    pub last_error: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub version: u64,
    #[serde(skip)]
    uncommitted_events: Vec<AgentEvent>,
}

impl AgentRecord {
    pub fn new(id: String, kind: AgentKind, cycle_interval_seconds: u64, now: DateTime<Utc>) -> Self {
        let mut record = Self::blank(id.clone(), now);
        let event = AgentEvent::Registered {
            agent_id: id,
            kind,
            cycle_interval_seconds,
            timestamp: now,
        };
        // Registered always applies cleanly to a blank record
        let _ = record.raise(event);
        record
    }

    /// Empty shell used as the starting point for replay.
    pub fn blank(id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            kind: AgentKind::Universal,
            status: AgentStatus::Idle,
            cycle_interval_seconds: 0,
            last_heartbeat: None,
            consecutive_failures: 0,
            tasks_completed: 0,
            tasks_failed: 0,
            restart_attempts: 0,
            requires_intervention: false,
            last_error: None,
            registered_at: now,
            version: 0,
            uncommitted_events: Vec::new(),
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.requires_intervention {
            return Err(DomainError::InvalidCommand {
                reason: format!("Agent {} is offline pending manual restart", self.id),
            });
        }
        self.raise(AgentEvent::Started {
            agent_id: self.id.clone(),
            timestamp: now,
        })
    }

    pub fn begin_cycle(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == AgentStatus::Busy {
            return Err(DomainError::InvalidCommand {
                reason: format!("Agent {} already has a cycle in flight", self.id),
            });
        }
        self.raise(AgentEvent::CycleStarted {
            agent_id: self.id.clone(),
            timestamp: now,
        })
    }

    pub fn complete_cycle(&mut self, summary: String, now: DateTime<Utc>) -> DomainResult<()> {
        self.raise(AgentEvent::CycleCompleted {
            agent_id: self.id.clone(),
            summary,
            timestamp: now,
        })
    }

    pub fn fail_cycle(&mut self, error: &DomainError, now: DateTime<Utc>) -> DomainResult<()> {
        self.raise(AgentEvent::CycleFailed {
            agent_id: self.id.clone(),
            error: error.to_string(),
            retryable: error.is_retryable(),
            timestamp: now,
        })
    }

    /// Error → Active once the failure backoff has elapsed.
    pub fn resume(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != AgentStatus::Error {
            return Ok(());
        }
        self.raise(AgentEvent::StatusChanged {
            agent_id: self.id.clone(),
            from: self.status,
            to: AgentStatus::Active,
            timestamp: now,
        })
    }

    /// Put the status back after a manual cycle on an agent with no scheduler.
    pub fn return_to(&mut self, status: AgentStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == status {
            return Ok(());
        }
        self.raise(AgentEvent::StatusChanged {
            agent_id: self.id.clone(),
            from: self.status,
            to: status,
            timestamp: now,
        })
    }

    pub fn record_restart(&mut self, reason: &str, automatic: bool, now: DateTime<Utc>) -> DomainResult<()> {
        self.raise(AgentEvent::Restarted {
            agent_id: self.id.clone(),
            reason: reason.to_string(),
            automatic,
            timestamp: now,
        })
    }

    pub fn stop(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == AgentStatus::Offline {
            return Ok(());
        }
        self.raise(AgentEvent::Stopped {
            agent_id: self.id.clone(),
            timestamp: now,
        })
    }

    pub fn mark_offline(&mut self, reason: &str, now: DateTime<Utc>) -> DomainResult<()> {
        self.raise(AgentEvent::MarkedOffline {
            agent_id: self.id.clone(),
            reason: reason.to_string(),
            timestamp: now,
        })
    }

    pub fn heartbeat_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_heartbeat.map(|hb| now - hb)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, AgentStatus::Active | AgentStatus::Busy | AgentStatus::Error)
    }
}

impl AggregateRoot for AgentRecord {
    type Event = AgentEvent;

    fn aggregate_id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) -> DomainResult<()> {
        match event {
            AgentEvent::Registered {
                agent_id,
                kind,
                cycle_interval_seconds,
                timestamp,
            } => {
                self.id = agent_id.clone();
                self.kind = *kind;
                self.cycle_interval_seconds = *cycle_interval_seconds;
                self.status = AgentStatus::Idle;
                self.registered_at = *timestamp;
            }
            AgentEvent::Started { timestamp, .. } => {
                self.status = AgentStatus::Active;
                self.last_heartbeat = Some(*timestamp);
            }
            AgentEvent::CycleStarted { timestamp, .. } => {
                self.status = AgentStatus::Busy;
                self.last_heartbeat = Some(*timestamp);
            }
            AgentEvent::CycleCompleted { .. } => {
                self.status = AgentStatus::Active;
                self.tasks_completed += 1;
                self.consecutive_failures = 0;
                self.restart_attempts = 0;
                self.last_error = None;
            }
            AgentEvent::CycleFailed { error, .. } => {
                self.status = AgentStatus::Error;
                self.tasks_failed += 1;
                self.consecutive_failures += 1;
                self.last_error = Some(error.clone());
            }
            AgentEvent::StatusChanged { to, .. } => {
                self.status = *to;
            }
            AgentEvent::Restarted { automatic, .. } => {
                self.consecutive_failures = 0;
                if *automatic {
                    self.restart_attempts += 1;
                } else {
                    self.restart_attempts = 0;
                    self.requires_intervention = false;
                }
            }
            AgentEvent::Stopped { .. } => {
                self.status = AgentStatus::Offline;
            }
            AgentEvent::MarkedOffline { reason, .. } => {
                self.status = AgentStatus::Offline;
                self.requires_intervention = true;
                self.last_error = Some(reason.clone());
            }
        }
        self.version += 1;
        Ok(())
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn mark_events_as_committed(&mut self) {
        self.uncommitted_events.clear();
    }

    fn add_event(&mut self, event: Self::Event) {
        self.uncommitted_events.push(event);
    }
}
