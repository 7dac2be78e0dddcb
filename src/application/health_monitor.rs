use crate::common::{Clock, DomainError, DomainResult};
use crate::domains::agent::{AgentStatus, AgentStatusReport};
use crate::domains::logger::DynLogger;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What the monitor needs from whoever owns the agents.
#[async_trait]
pub trait AgentControl: Send + Sync {
    async fn agent_reports(&self) -> Vec<AgentStatusReport>;
    async fn restart_agent(&self, agent_id: &str, reason: &str) -> DomainResult<()>;
    async fn take_offline(&self, agent_id: &str, reason: &str) -> DomainResult<()>;
}

#[derive(Debug, Clone)]
pub struct HealthPolicy {
    pub check_interval: Duration,
    pub heartbeat_timeout: ChronoDuration,
    /// Restart once consecutive failures go above this.
    pub max_consecutive_failures: u32,
    /// Unhealthy agents with this many unanswered restarts go offline.
    pub max_restart_attempts: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            heartbeat_timeout: ChronoDuration::seconds(300),
            max_consecutive_failures: 5,
            max_restart_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum HealthVerdict {
    Healthy,
    /// Not running under supervision (idle, stopped or given up on).
    Unsupervised,
    StaleHeartbeat { age_secs: i64 },
    Stuck { consecutive_failures: u32 },
}

impl HealthVerdict {
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthVerdict::StaleHeartbeat { .. } | HealthVerdict::Stuck { .. })
    }

    fn describe(&self) -> String {
        match self {
            HealthVerdict::Healthy => "healthy".to_string(),
            HealthVerdict::Unsupervised => "unsupervised".to_string(),
            HealthVerdict::StaleHeartbeat { age_secs } => format!("no heartbeat for {}s", age_secs),
            HealthVerdict::Stuck { consecutive_failures } => {
                format!("{} consecutive failed cycles", consecutive_failures)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum HealthAction {
    None,
    Restarted,
    TakenOffline,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub agent_id: String,
    pub verdict: HealthVerdict,
    pub action: HealthAction,
}

pub struct HealthMonitor {
    control: Arc<dyn AgentControl>,
    clock: Arc<dyn Clock>,
    logger: DynLogger,
    policy: HealthPolicy,
}

impl HealthMonitor {
    pub fn new(control: Arc<dyn AgentControl>, clock: Arc<dyn Clock>, logger: DynLogger, policy: HealthPolicy) -> Self {
        Self {
            control,
            clock,
            logger,
            policy,
        }
    }

    pub fn assess(&self, report: &AgentStatusReport, now: DateTime<Utc>) -> HealthVerdict {
        if matches!(report.status, AgentStatus::Idle | AgentStatus::Offline) {
            return HealthVerdict::Unsupervised;
        }
        if let Some(heartbeat) = report.last_heartbeat {
            let age = now - heartbeat;
            if age > self.policy.heartbeat_timeout {
                return HealthVerdict::StaleHeartbeat {
                    age_secs: age.num_seconds(),
                };
            }
        }
        if report.consecutive_failures > self.policy.max_consecutive_failures {
            return HealthVerdict::Stuck {
                consecutive_failures: report.consecutive_failures,
            };
        }
        HealthVerdict::Healthy
    }

    /// One pass over all agents.
    pub async fn check_once(&self) -> Vec<HealthCheckResult> {
        let now = self.clock.now();
        let reports = self.control.agent_reports().await;
        let mut results = Vec::with_capacity(reports.len());

        for report in reports {
            let verdict = self.assess(&report, now);
            let action = if verdict.is_unhealthy() {
                self.recover(&report, &verdict).await
            } else {
                HealthAction::None
            };
            results.push(HealthCheckResult {
                agent_id: report.agent_id,
                verdict,
                action,
            });
        }
        results
    }

    async fn recover(&self, report: &AgentStatusReport, verdict: &HealthVerdict) -> HealthAction {
        let reason = verdict.describe();
        if report.restart_attempts >= self.policy.max_restart_attempts {
            let reason = format!(
                "{} after {} restart attempts; manual restart required",
                reason, report.restart_attempts
            );
            self.logger
                .error(&format!("Agent {} taken offline: {}", report.agent_id, reason));
            return match self.control.take_offline(&report.agent_id, &reason).await {
                Ok(()) => HealthAction::TakenOffline,
                Err(e) => HealthAction::Failed(e.to_string()),
            };
        }

        let failure = DomainError::HealthCheckFailure {
            agent_id: report.agent_id.clone(),
            reason: reason.clone(),
        };
        self.logger.warn(&format!("{}; restarting", failure));
        match self.control.restart_agent(&report.agent_id, &reason).await {
            Ok(()) => HealthAction::Restarted,
            Err(e) => {
                self.logger
                    .error(&format!("Restart of {} failed: {}", report.agent_id, e));
                HealthAction::Failed(e.to_string())
            }
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        self.logger.info(&format!(
            "Health monitor checking every {}s",
            self.policy.check_interval.as_secs()
        ));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.clock.sleep(self.policy.check_interval) => {}
            }
            let results = self.check_once().await;
            let acted = results.iter().filter(|r| r.action != HealthAction::None).count();
            if acted > 0 {
                self.logger
                    .info(&format!("Health check acted on {} of {} agents", acted, results.len()));
            }
        }
        self.logger.info("Health monitor stopped");
    }
}
