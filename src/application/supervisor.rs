use super::actions::{ActionOutcome, AgentAction};
use super::behaviors::{AgentBehavior, BehaviorSettings, CycleContext};
use super::health_monitor::{AgentControl, HealthMonitor, HealthPolicy};
use super::publisher::{EventPublisher, DEFAULT_QUEUE_CAPACITY};
use super::scheduler::{execute_cycle, update_record, AgentSlot, CycleScheduler, RunningTask, SchedulerConfig};
use crate::common::{Clock, DomainError, DomainResult};
use crate::domains::agent::{AgentKind, AgentRecord, AgentStatusReport, FleetOverview};
use crate::domains::dispatch::{Notifier, Store};
use crate::domains::logger::{DynLogger, ScopedLogger};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Registration parameters for one agent.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub id: Option<String>,
    pub cycle_interval_secs: u64,
}

impl Default for AgentSpec {
    fn default() -> Self {
        Self {
            id: None,
            cycle_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub health: HealthPolicy,
    pub failure_backoff: Duration,
    pub shutdown_grace: Duration,
    /// Envelopes buffered for the notifier before new ones are dropped.
    pub notify_queue_capacity: usize,
    pub behavior: BehaviorSettings,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            health: HealthPolicy::default(),
            failure_backoff: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(10),
            notify_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            behavior: BehaviorSettings::default(),
        }
    }
}

/// Owns every agent, its scheduler task and the health monitor. Build one
/// per process, inside a Tokio runtime, and share it behind an `Arc`.
pub struct Supervisor {
    agents: RwLock<BTreeMap<String, Arc<AgentSlot>>>,
    monitor: Mutex<Option<RunningTask>>,
    running: AtomicBool,
    store: Arc<dyn Store>,
    events: EventPublisher,
    clock: Arc<dyn Clock>,
    logger: DynLogger,
    settings: SupervisorSettings,
}

impl Supervisor {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        logger: DynLogger,
        settings: SupervisorSettings,
    ) -> Self {
        let events = EventPublisher::spawn(
            notifier,
            settings.notify_queue_capacity,
            ScopedLogger::wrap(logger.clone(), "notifier"),
        );
        Self {
            agents: RwLock::new(BTreeMap::new()),
            monitor: Mutex::new(None),
            running: AtomicBool::new(false),
            store,
            events,
            clock,
            logger,
            settings,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn register(&self, kind: AgentKind, spec: AgentSpec) -> DomainResult<String> {
        if spec.cycle_interval_secs == 0 {
            return Err(DomainError::InvalidCommand {
                reason: "cycle interval must be at least one second".to_string(),
            });
        }
        let id = spec
            .id
            .unwrap_or_else(|| format!("{}-{}", kind, &Uuid::new_v4().simple().to_string()[..8]));

        let slot = {
            let mut agents = self.agents.write().await;
            if agents.contains_key(&id) {
                return Err(DomainError::InvalidCommand {
                    reason: format!("Agent {} is already registered", id),
                });
            }
            let record = AgentRecord::new(id.clone(), kind, spec.cycle_interval_secs, self.clock.now());
            let slot = Arc::new(AgentSlot::new(
                record,
                AgentBehavior::for_kind(kind, &self.settings.behavior),
            ));
            agents.insert(id.clone(), slot.clone());
            slot
        };

        let ctx = self.context(&id);
        let events = {
            use crate::common::AggregateRoot;
            slot.record.lock().await.take_uncommitted_events()
        };
        super::scheduler::publish_agent_events(&ctx, &events);
        self.logger
            .info(&format!("Registered {} agent {} ({}s cycle)", kind, id, spec.cycle_interval_secs));

        // start() may already have picked this slot up; it spawns under the
        // same lock and stop() takes it before cancelling.
        let mut task = slot.task.lock().await;
        if self.is_running() && task.is_none() {
            *task = Some(self.spawn_scheduler(&id, slot.clone()).await);
        }
        Ok(id)
    }

    /// Spawn a scheduler for every agent that is not already running, plus
    /// the health monitor.
    pub async fn start(self: &Arc<Self>) -> DomainResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        for (id, slot) in self.slots().await {
            if slot.record.lock().await.requires_intervention {
                self.logger
                    .warn(&format!("Agent {} needs a manual restart; not starting it", id));
                continue;
            }
            let mut task = slot.task.lock().await;
            if task.is_none() {
                *task = Some(self.spawn_scheduler(&id, slot.clone()).await);
            }
        }

        let cancel = CancellationToken::new();
        let monitor = HealthMonitor::new(
            self.clone() as Arc<dyn AgentControl>,
            self.clock.clone(),
            ScopedLogger::wrap(self.logger.clone(), "health"),
            self.settings.health.clone(),
        );
        let handle = tokio::spawn(monitor.run(cancel.clone()));
        *self.monitor.lock().await = Some(RunningTask { cancel, handle });

        self.logger.info("Supervisor started");
        Ok(())
    }

    /// Cancel the monitor and every scheduler and wait for them to finish.
    pub async fn stop(&self) -> DomainResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let grace = self.settings.shutdown_grace;

        if let Some(monitor) = self.monitor.lock().await.take() {
            monitor.terminate(grace).await;
        }
        for (id, slot) in self.slots().await {
            let finished = slot.task.lock().await.take();
            if let Some(task) = finished {
                if !task.terminate(grace).await {
                    self.logger
                        .warn(&format!("Agent {} did not stop within {:?}; aborted", id, grace));
                }
            }
            let ctx = self.context(&id);
            update_record(&slot, &ctx, |r, now| r.stop(now)).await?;
        }

        self.logger.info("Supervisor stopped");
        Ok(())
    }

    /// Manual restart: clears any "needs intervention" flag.
    pub async fn restart(&self, agent_id: &str) -> DomainResult<()> {
        self.restart_with(agent_id, "manual restart", false).await
    }

    async fn restart_with(&self, agent_id: &str, reason: &str, automatic: bool) -> DomainResult<()> {
        let slot = self.slot(agent_id).await?;
        let ctx = self.context(agent_id);

        // Holding the task lock across terminate + spawn keeps it to one
        // scheduler per agent even when restarts race.
        let mut task = slot.task.lock().await;
        if let Some(old) = task.take() {
            if !old.terminate(self.settings.shutdown_grace).await {
                self.logger
                    .warn(&format!("Agent {} ignored cancellation; aborted", agent_id));
            }
        }

        update_record(&slot, &ctx, |r, now| r.record_restart(reason, automatic, now)).await?;
        self.logger.info(&format!("Agent {} restarted: {}", agent_id, reason));

        if self.is_running() {
            *task = Some(self.spawn_scheduler(agent_id, slot.clone()).await);
        }
        Ok(())
    }

    async fn mark_offline(&self, agent_id: &str, reason: &str) -> DomainResult<()> {
        let slot = self.slot(agent_id).await?;
        let ctx = self.context(agent_id);

        let mut task = slot.task.lock().await;
        if let Some(old) = task.take() {
            old.terminate(self.settings.shutdown_grace).await;
        }
        update_record(&slot, &ctx, |r, now| r.mark_offline(reason, now)).await
    }

    pub async fn status(&self, agent_id: &str) -> DomainResult<AgentStatusReport> {
        let slot = self.slot(agent_id).await?;
        let record = slot.record.lock().await;
        Ok(AgentStatusReport::from(&*record))
    }

    pub async fn statuses(&self) -> Vec<AgentStatusReport> {
        let mut reports = Vec::new();
        for (_, slot) in self.slots().await {
            let record = slot.record.lock().await;
            reports.push(AgentStatusReport::from(&*record));
        }
        reports
    }

    pub async fn overview(&self) -> FleetOverview {
        FleetOverview::from_reports(&self.statuses().await)
    }

    /// Run a one-off request against an agent outside its normal schedule.
    pub async fn trigger_action(&self, agent_id: &str, action: AgentAction) -> DomainResult<ActionOutcome> {
        let slot = self.slot(agent_id).await?;
        let ctx = self.context(agent_id);
        let kind = slot.behavior.kind();
        let unsupported = || DomainError::InvalidCommand {
            reason: format!("{} agent {} cannot handle {}", kind, agent_id, action.name()),
        };

        match &action {
            AgentAction::RunCycle => {
                let prior = {
                    let record = slot.record.lock().await;
                    if record.requires_intervention {
                        return Err(DomainError::InvalidCommand {
                            reason: format!("Agent {} is offline pending manual restart", agent_id),
                        });
                    }
                    record.status
                };
                let has_scheduler = slot.task.lock().await.is_some();
                let outcome = execute_cycle(&slot, &ctx).await;
                if !has_scheduler {
                    update_record(&slot, &ctx, |r, now| r.return_to(prior, now)).await?;
                }
                Ok(ActionOutcome::CycleRan { report: outcome? })
            }
            AgentAction::PreviewDispatch(params) => {
                let dispatcher = slot.behavior.dispatcher().ok_or_else(unsupported)?;
                let plan = dispatcher.preview(&params.orders, &params.vehicles, &ctx)?;
                Ok(ActionOutcome::Plan { plan })
            }
            AgentAction::BuildRoute(params) => {
                let builder = slot.behavior.router().ok_or_else(unsupported)?;
                let defaults = &self.settings.behavior;
                let route = builder.build_route_with_factors(
                    &params.vehicle,
                    &params.deliveries,
                    params.traffic_factor.unwrap_or(defaults.traffic_factor),
                    params.weather_factor.unwrap_or(defaults.weather_factor),
                )?;
                Ok(ActionOutcome::Route { route })
            }
        }
    }

    async fn spawn_scheduler(&self, agent_id: &str, slot: Arc<AgentSlot>) -> RunningTask {
        let interval = slot.record.lock().await.cycle_interval_seconds;
        let config = SchedulerConfig {
            cycle_interval: Duration::from_secs(interval),
            failure_backoff: self.settings.failure_backoff,
        };
        CycleScheduler::new(slot, self.context(agent_id), config, CancellationToken::new()).spawn()
    }

    fn context(&self, agent_id: &str) -> CycleContext {
        CycleContext {
            agent_id: agent_id.to_string(),
            store: self.store.clone(),
            events: self.events.clone(),
            clock: self.clock.clone(),
            logger: ScopedLogger::wrap(self.logger.clone(), agent_id),
        }
    }

    async fn slot(&self, agent_id: &str) -> DomainResult<Arc<AgentSlot>> {
        self.agents
            .read()
            .await
            .get(agent_id)
            .cloned()
            .ok_or_else(|| DomainError::AgentNotFound {
                id: agent_id.to_string(),
            })
    }

    async fn slots(&self) -> Vec<(String, Arc<AgentSlot>)> {
        self.agents
            .read()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect()
    }
}

#[async_trait]
impl AgentControl for Supervisor {
    async fn agent_reports(&self) -> Vec<AgentStatusReport> {
        self.statuses().await
    }

    async fn restart_agent(&self, agent_id: &str, reason: &str) -> DomainResult<()> {
        self.restart_with(agent_id, reason, true).await
    }

    async fn take_offline(&self, agent_id: &str, reason: &str) -> DomainResult<()> {
        self.mark_offline(agent_id, reason).await
    }
}
