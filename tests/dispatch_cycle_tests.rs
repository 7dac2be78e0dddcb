use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use fleet_agents::adapters::outbound::InMemoryStore;
use fleet_agents::application::{
    execute_cycle, AgentBehavior, AgentSlot, BehaviorSettings, CycleContext, EventPublisher,
};
use fleet_agents::common::{Clock, DomainError, DomainResult, EventEnvelope, ManualClock};
use fleet_agents::domains::agent::{AgentKind, AgentRecord, AgentStatus};
use fleet_agents::domains::dispatch::{Assignment, Location, Notifier, Order, Route, Store, Vehicle};
use fleet_agents::domains::logger::DomainLogger;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn order(id: &str, weight: f64, priority: u8) -> Order {
    Order {
        id: id.to_string(),
        weight_kg: weight,
        priority,
        pickup_location: Some(Location::new(52.52, 13.40)),
        delivery_location: Some(Location::new(52.53, 13.42)),
        requested_delivery_time: None,
    }
}

fn vehicle(id: &str, capacity: f64) -> Vehicle {
    Vehicle {
        id: id.to_string(),
        capacity_kg: capacity,
        current_load_kg: 0.0,
        location: Some(Location::new(52.51, 13.39)),
        avg_speed_kmh: 30.0,
        total_deliveries: 0,
    }
}

/// In-memory store whose first `fail_loads` load updates and first
/// `fail_assignments` assignment writes are rejected. It keeps the default
/// `commit_assignment`, so the two writes go through separately.
struct FaultyWrites {
    inner: InMemoryStore,
    fail_loads: usize,
    fail_assignments: usize,
    load_calls: AtomicUsize,
    assignment_calls: AtomicUsize,
}

impl FaultyWrites {
    fn new(fail_loads: usize, fail_assignments: usize) -> Self {
        Self {
            inner: InMemoryStore::new(),
            fail_loads,
            fail_assignments,
            load_calls: AtomicUsize::new(0),
            assignment_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Store for FaultyWrites {
    async fn get_pending_orders(&self) -> DomainResult<Vec<Order>> {
        self.inner.get_pending_orders().await
    }

    async fn get_available_vehicles(&self) -> DomainResult<Vec<Vehicle>> {
        self.inner.get_available_vehicles().await
    }

    async fn persist_assignment(&self, assignment: &Assignment) -> DomainResult<()> {
        if self.assignment_calls.fetch_add(1, Ordering::SeqCst) < self.fail_assignments {
            return Err(DomainError::TransientStore("deadlock detected".into()));
        }
        self.inner.persist_assignment(assignment).await
    }

    async fn persist_route(&self, route: &Route) -> DomainResult<()> {
        self.inner.persist_route(route).await
    }

    async fn apply_vehicle_load_delta(&self, vehicle_id: &str, delta_kg: f64) -> DomainResult<()> {
        if self.load_calls.fetch_add(1, Ordering::SeqCst) < self.fail_loads {
            return Err(DomainError::TransientStore("connection reset".into()));
        }
        self.inner.apply_vehicle_load_delta(vehicle_id, delta_kg).await
    }
}

struct RejectingNotifier {
    attempts: AtomicUsize,
}

#[async_trait]
impl Notifier for RejectingNotifier {
    async fn publish(&self, _event: EventEnvelope) -> Result<(), String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err("broker unreachable".to_string())
    }
}

/// Waits five seconds per event and then fails, like a producer timing out.
struct StalledNotifier;

#[async_trait]
impl Notifier for StalledNotifier {
    async fn publish(&self, _event: EventEnvelope) -> Result<(), String> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err("message timed out".to_string())
    }
}

#[derive(Default)]
struct Warnings(Mutex<Vec<String>>);

impl Warnings {
    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl DomainLogger for Warnings {
    fn info(&self, _msg: &str) {}
    fn warn(&self, msg: &str) {
        self.0.lock().unwrap().push(msg.to_string());
    }
    fn error(&self, _msg: &str) {}
}

fn fixture(
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    logger: Arc<Warnings>,
) -> (Arc<AgentSlot>, CycleContext) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()));
    let record = AgentRecord::new("dispatch-1".into(), AgentKind::Dispatch, 60, clock.now());
    let slot = Arc::new(AgentSlot::new(
        record,
        AgentBehavior::for_kind(AgentKind::Dispatch, &BehaviorSettings::default()),
    ));
    let ctx = CycleContext {
        agent_id: "dispatch-1".into(),
        store,
        events: EventPublisher::spawn(notifier, 64, logger.clone()),
        clock,
        logger,
    };
    (slot, ctx)
}

#[tokio::test]
async fn test_failed_load_update_leaves_order_pending_and_vehicle_within_capacity() {
    let store = Arc::new(FaultyWrites::new(1, 0));
    store.inner.add_order(order("o-1", 8.0, 1)).await;
    store.inner.add_vehicle(vehicle("v-1", 10.0)).await;
    let (slot, ctx) = fixture(store.clone(), Arc::new(StalledNotifier), Arc::new(Warnings::default()));

    assert!(execute_cycle(&slot, &ctx).await.is_err());
    assert!(store.inner.assignments().await.is_empty());
    assert_eq!(store.inner.vehicle("v-1").await.unwrap().current_load_kg, 0.0);

    store.inner.add_order(order("o-2", 8.0, 2)).await;
    let report = execute_cycle(&slot, &ctx).await.unwrap();
    assert_eq!(report.produced, 1);

    let assignments = store.inner.assignments().await;
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].order_id, "o-1");

    let v1 = store.inner.vehicle("v-1").await.unwrap();
    assert_eq!(v1.current_load_kg, 8.0);
    assert!(v1.current_load_kg <= v1.capacity_kg);
    assert_eq!(store.inner.get_pending_orders().await.unwrap()[0].id, "o-2");
}

#[tokio::test]
async fn test_failed_assignment_write_rolls_back_vehicle_load() {
    let store = Arc::new(FaultyWrites::new(0, 1));
    store.inner.add_order(order("o-1", 6.0, 1)).await;
    store.inner.add_vehicle(vehicle("v-1", 10.0)).await;
    let (slot, ctx) = fixture(store.clone(), Arc::new(StalledNotifier), Arc::new(Warnings::default()));

    let err = execute_cycle(&slot, &ctx).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(store.inner.vehicle("v-1").await.unwrap().current_load_kg, 0.0);

    execute_cycle(&slot, &ctx).await.unwrap();
    assert_eq!(store.inner.vehicle("v-1").await.unwrap().current_load_kg, 6.0);
    assert_eq!(store.inner.assignments().await.len(), 1);
}

#[tokio::test]
async fn test_malformed_rows_are_skipped_and_valid_ones_assigned() {
    let store = Arc::new(InMemoryStore::new());
    store.add_order(order("o-good", 4.0, 2)).await;
    store.add_order(order("o-priority", 4.0, 9)).await;
    let mut no_pickup = order("o-nowhere", 4.0, 1);
    no_pickup.pickup_location = None;
    store.add_order(no_pickup).await;
    store.add_vehicle(vehicle("v-1", 10.0)).await;
    let mut lost = vehicle("v-lost", 50.0);
    lost.location = None;
    store.add_vehicle(lost).await;

    let logs = Arc::new(Warnings::default());
    let notifier = Arc::new(RejectingNotifier {
        attempts: AtomicUsize::new(0),
    });
    let (slot, ctx) = fixture(store.clone(), notifier, logs.clone());

    let report = execute_cycle(&slot, &ctx).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.produced, 1);
    assert_eq!(report.skipped, 3);

    let assignments = store.assignments().await;
    assert_eq!(assignments.len(), 1);
    assert_eq!((assignments[0].order_id.as_str(), assignments[0].vehicle_id.as_str()), ("o-good", "v-1"));

    let record = slot.record.lock().await;
    assert_eq!((record.tasks_completed, record.tasks_failed), (1, 0));
    assert_eq!(record.status, AgentStatus::Active);
    drop(record);

    let skipped = logs.lines().iter().filter(|l| l.starts_with("Skipping input")).count();
    assert_eq!(skipped, 3);
}

#[tokio::test]
async fn test_notifier_errors_are_logged_not_raised() {
    let store = Arc::new(InMemoryStore::new());
    store.add_order(order("o-1", 2.0, 1)).await;
    store.add_vehicle(vehicle("v-1", 10.0)).await;

    let logs = Arc::new(Warnings::default());
    let notifier = Arc::new(RejectingNotifier {
        attempts: AtomicUsize::new(0),
    });
    let (slot, ctx) = fixture(store.clone(), notifier.clone(), logs.clone());

    assert!(execute_cycle(&slot, &ctx).await.is_ok());
    assert_eq!(store.assignments().await.len(), 1);

    // let the drain task catch up
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert!(notifier.attempts.load(Ordering::SeqCst) > 0);
    assert!(logs
        .lines()
        .iter()
        .any(|l| l.starts_with("Dropped AssignmentCreated notification: broker unreachable")));
    assert_eq!(slot.record.lock().await.tasks_failed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_notifier_does_not_hold_up_the_cycle() {
    let store = Arc::new(InMemoryStore::new());
    store.add_order(order("o-1", 2.0, 1)).await;
    store.add_vehicle(vehicle("v-1", 10.0)).await;
    let (slot, ctx) = fixture(store.clone(), Arc::new(StalledNotifier), Arc::new(Warnings::default()));

    let started = tokio::time::Instant::now();
    let report = execute_cycle(&slot, &ctx).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.produced, 1);
    assert_eq!(store.assignments().await.len(), 1);
}
