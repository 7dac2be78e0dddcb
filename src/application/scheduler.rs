use super::behaviors::{AgentBehavior, CycleContext, CycleReport};
use crate::common::{AggregateRoot, DomainError, DomainResult};
use crate::domains::agent::{AgentEvent, AgentRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything the supervisor keeps per registered agent.
pub struct AgentSlot {
    pub record: Mutex<AgentRecord>,
    pub behavior: Arc<AgentBehavior>,
    /// Held for the duration of every cycle, scheduled or manual.
    pub cycle_lock: Mutex<()>,
    /// Handle of the scheduler task currently driving this agent.
    pub task: Mutex<Option<RunningTask>>,
}

impl AgentSlot {
    pub fn new(record: AgentRecord, behavior: AgentBehavior) -> Self {
        Self {
            record: Mutex::new(record),
            behavior: Arc::new(behavior),
            cycle_lock: Mutex::new(()),
            task: Mutex::new(None),
        }
    }
}

pub struct RunningTask {
    pub cancel: CancellationToken,
    pub handle: JoinHandle<()>,
}

impl RunningTask {
    /// Cancel, give the task `grace` to notice, then abort. Returns once the
    /// task has finished either way.
    pub async fn terminate(mut self, grace: Duration) -> bool {
        self.cancel.cancel();
        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(_) => true,
            Err(_) => {
                self.handle.abort();
                let _ = self.handle.await;
                false
            }
        }
    }
}

struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub cycle_interval: Duration,
    pub failure_backoff: Duration,
}

/// Drives one agent: IDLE → ACTIVE → (BUSY → ACTIVE | ERROR → ACTIVE)* → OFFLINE.
/// A failing cycle never ends the loop; only cancellation does.
pub struct CycleScheduler {
    slot: Arc<AgentSlot>,
    ctx: CycleContext,
    config: SchedulerConfig,
    cancel: CancellationToken,
}

impl CycleScheduler {
    pub fn new(slot: Arc<AgentSlot>, ctx: CycleContext, config: SchedulerConfig, cancel: CancellationToken) -> Self {
        Self {
            slot,
            ctx,
            config,
            cancel,
        }
    }

    pub fn spawn(self) -> RunningTask {
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(self.run());
        RunningTask { cancel, handle }
    }

    pub async fn run(self) {
        let started = update_record(&self.slot, &self.ctx, |r, now| r.start(now)).await;
        if let Err(e) = started {
            self.ctx.logger.error(&format!("Not starting: {}", e));
            return;
        }
        self.ctx.logger.info(&format!(
            "Scheduler running every {}s",
            self.config.cycle_interval.as_secs()
        ));

        while !self.cancel.is_cancelled() {
            let outcome = execute_cycle(&self.slot, &self.ctx).await;
            let pause = match &outcome {
                Ok(_) => self.config.cycle_interval,
                Err(_) => self.config.failure_backoff,
            };

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.ctx.clock.sleep(pause) => {}
            }

            if outcome.is_err() {
                let _ = update_record(&self.slot, &self.ctx, |r, now| r.resume(now)).await;
            }
        }

        let _ = update_record(&self.slot, &self.ctx, |r, now| r.stop(now)).await;
        self.ctx.logger.info("Scheduler stopped");
    }
}

/// One cycle under the agent's cycle lock: heartbeat, run the behavior,
/// book the outcome. Errors and panics in the body become a failed cycle.
pub async fn execute_cycle(slot: &Arc<AgentSlot>, ctx: &CycleContext) -> DomainResult<CycleReport> {
    let _cycle = slot.cycle_lock.lock().await;
    update_record(slot, ctx, |r, now| r.begin_cycle(now)).await?;

    let behavior = slot.behavior.clone();
    let body_ctx = ctx.clone();
    let mut body = AbortOnDrop(tokio::spawn(async move { behavior.run_cycle(&body_ctx).await }));
    let result = match (&mut body.0).await {
        Ok(result) => result,
        Err(join_error) => Err(DomainError::CycleFailed {
            agent_id: ctx.agent_id.clone(),
            reason: if join_error.is_panic() {
                "cycle body panicked".to_string()
            } else {
                "cycle body was cancelled".to_string()
            },
        }),
    };

    match result {
        Ok(report) => {
            let summary = report.summary();
            ctx.logger.info(&format!("Cycle completed: {}", summary));
            update_record(slot, ctx, |r, now| r.complete_cycle(summary, now)).await?;
            Ok(report)
        }
        Err(e) => {
            let kind = if e.is_retryable() { "transient" } else { "non-retryable" };
            ctx.logger.error(&format!("Cycle failed ({}): {}", kind, e));
            update_record(slot, ctx, |r, now| r.fail_cycle(&e, now)).await?;
            Err(match e {
                DomainError::CycleFailed { .. } => e,
                other => DomainError::CycleFailed {
                    agent_id: ctx.agent_id.clone(),
                    reason: other.to_string(),
                },
            })
        }
    }
}

/// Apply a command to the agent record and broadcast the events it raised.
pub async fn update_record<F>(slot: &AgentSlot, ctx: &CycleContext, command: F) -> DomainResult<()>
where
    F: FnOnce(&mut AgentRecord, chrono::DateTime<chrono::Utc>) -> DomainResult<()>,
{
    let events = {
        let mut record = slot.record.lock().await;
        command(&mut record, ctx.clock.now())?;
        record.take_uncommitted_events()
    };
    publish_agent_events(ctx, &events);
    Ok(())
}

pub fn publish_agent_events(ctx: &CycleContext, events: &[AgentEvent]) {
    for event in events.iter().filter(|e| e.is_broadcast()) {
        ctx.publish(event, "Agent");
    }
}
