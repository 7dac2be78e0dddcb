use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use fleet_agents::adapters::outbound::{init_noop_logger, NoopNotifier};
use fleet_agents::application::{
    execute_cycle, AgentBehavior, AgentSlot, BehaviorSettings, CycleContext, CycleScheduler, EventPublisher,
    SchedulerConfig,
};
use fleet_agents::common::{Clock, DomainError, DomainResult, ManualClock};
use fleet_agents::domains::agent::{AgentKind, AgentRecord, AgentStatus};
use fleet_agents::domains::dispatch::{Assignment, Order, Route, Store, Vehicle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fails the first `failures` reads, then reports an empty world.
struct FlakyStore {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyStore {
    fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn get_pending_orders(&self) -> DomainResult<Vec<Order>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(DomainError::TransientStore("connection reset".into()));
        }
        Ok(Vec::new())
    }

    async fn get_available_vehicles(&self) -> DomainResult<Vec<Vehicle>> {
        Ok(Vec::new())
    }

    async fn persist_assignment(&self, _assignment: &Assignment) -> DomainResult<()> {
        Ok(())
    }

    async fn persist_route(&self, _route: &Route) -> DomainResult<()> {
        Ok(())
    }

    async fn apply_vehicle_load_delta(&self, _vehicle_id: &str, _delta_kg: f64) -> DomainResult<()> {
        Ok(())
    }
}

struct PanickingStore;

#[async_trait]
impl Store for PanickingStore {
    async fn get_pending_orders(&self) -> DomainResult<Vec<Order>> {
        panic!("driver bug");
    }

    async fn get_available_vehicles(&self) -> DomainResult<Vec<Vehicle>> {
        Ok(Vec::new())
    }

    async fn persist_assignment(&self, _assignment: &Assignment) -> DomainResult<()> {
        Ok(())
    }

    async fn persist_route(&self, _route: &Route) -> DomainResult<()> {
        Ok(())
    }

    async fn apply_vehicle_load_delta(&self, _vehicle_id: &str, _delta_kg: f64) -> DomainResult<()> {
        Ok(())
    }
}

fn fixture(store: Arc<dyn Store>) -> (Arc<AgentSlot>, CycleContext, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
    let record = AgentRecord::new("dispatch-1".into(), AgentKind::Dispatch, 60, clock.now());
    let slot = Arc::new(AgentSlot::new(
        record,
        AgentBehavior::for_kind(AgentKind::Dispatch, &BehaviorSettings::default()),
    ));
    let ctx = CycleContext {
        agent_id: "dispatch-1".into(),
        store,
        events: EventPublisher::spawn(Arc::new(NoopNotifier), 16, init_noop_logger()),
        clock: clock.clone(),
        logger: init_noop_logger(),
    };
    (slot, ctx, clock)
}

fn config() -> SchedulerConfig {
    SchedulerConfig {
        cycle_interval: Duration::from_secs(60),
        failure_backoff: Duration::from_secs(30),
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_cycle_keeps_loop_running_and_next_cycle_succeeds() {
    let (slot, ctx, _clock) = fixture(Arc::new(FlakyStore::new(1)));
    let task = CycleScheduler::new(slot.clone(), ctx, config(), CancellationToken::new()).spawn();

    // first cycle fails at t=0, retry after the 30s backoff succeeds
    tokio::time::sleep(Duration::from_secs(45)).await;

    {
        let record = slot.record.lock().await;
        assert_eq!(record.tasks_failed, 1);
        assert_eq!(record.tasks_completed, 1);
        assert_eq!(record.consecutive_failures, 0);
        assert_eq!(record.status, AgentStatus::Active);
        assert!(record.last_error.is_none());
    }
    assert!(!task.handle.is_finished());

    // and it keeps ticking on the regular interval
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(slot.record.lock().await.tasks_completed, 2);

    assert!(task.terminate(Duration::from_secs(5)).await);
    assert_eq!(slot.record.lock().await.status, AgentStatus::Offline);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_follows_the_clock() {
    let (slot, ctx, _clock) = fixture(Arc::new(FlakyStore::new(0)));
    let task = CycleScheduler::new(slot.clone(), ctx, config(), CancellationToken::new()).spawn();

    tokio::time::sleep(Duration::from_secs(1)).await;
    let first = slot.record.lock().await.last_heartbeat;

    tokio::time::sleep(Duration::from_secs(60)).await;
    let second = slot.record.lock().await.last_heartbeat;

    assert_eq!(second.zip(first).map(|(b, a)| (b - a).num_seconds()), Some(60));
    task.terminate(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_panicking_cycle_body_becomes_failed_cycle() {
    let (slot, ctx, _clock) = fixture(Arc::new(PanickingStore));

    let err = execute_cycle(&slot, &ctx).await.unwrap_err();
    assert!(matches!(err, DomainError::CycleFailed { .. }));

    let record = slot.record.lock().await;
    assert_eq!(record.tasks_failed, 1);
    assert_eq!(record.status, AgentStatus::Error);
    assert!(record.last_error.as_deref().unwrap_or("").contains("panicked"));
}

#[tokio::test]
async fn test_transient_failure_is_recorded_as_cycle_failure() {
    let (slot, ctx, _clock) = fixture(Arc::new(FlakyStore::new(1)));

    let err = execute_cycle(&slot, &ctx).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(execute_cycle(&slot, &ctx).await.is_ok());

    let record = slot.record.lock().await;
    assert_eq!((record.tasks_failed, record.tasks_completed), (1, 1));
}
