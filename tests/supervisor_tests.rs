use async_trait::async_trait;
use fleet_agents::adapters::outbound::{init_noop_logger, BroadcastNotifier, InMemoryStore};
use fleet_agents::application::{
    ActionOutcome, AgentAction, AgentControl, AgentSpec, BuildRouteParams, PreviewDispatchParams, Supervisor,
    SupervisorSettings,
};
use fleet_agents::common::{DomainError, DomainResult, EventEnvelope, SystemClock};
use fleet_agents::domains::agent::{AgentKind, AgentStatus};
use fleet_agents::domains::dispatch::{Assignment, Location, Notifier, Order, Route, Store, Vehicle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
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

async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.add_order(order("o-1", 5.0, 1)).await;
    store.add_order(order("o-2", 8.0, 3)).await;
    store.add_vehicle(vehicle("v-1", 10.0)).await;
    store.add_vehicle(vehicle("v-2", 10.0)).await;
    store
}

fn supervisor(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Arc<Supervisor> {
    Arc::new(Supervisor::new(
        store,
        notifier,
        Arc::new(SystemClock),
        init_noop_logger(),
        SupervisorSettings::default(),
    ))
}

fn spec(id: &str) -> AgentSpec {
    AgentSpec {
        id: Some(id.to_string()),
        cycle_interval_secs: 60,
    }
}

#[tokio::test(start_paused = true)]
async fn test_started_dispatch_agent_assigns_pending_orders() {
    let store = seeded_store().await;
    let notifier = Arc::new(BroadcastNotifier::new(256));
    let mut events = notifier.subscribe();
    let sup = supervisor(store.clone(), notifier);

    sup.register(AgentKind::Dispatch, spec("dispatch-1")).await.unwrap();
    sup.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let status = sup.status("dispatch-1").await.unwrap();
    assert_eq!(status.status, AgentStatus::Active);
    assert_eq!(status.tasks_completed, 1);
    assert!(status.last_heartbeat.is_some());

    let assignments = store.assignments().await;
    assert_eq!(assignments.len(), 2);
    assert_eq!(assignments[0].order_id, "o-1");
    for v in ["v-1", "v-2"] {
        let v = store.vehicle(v).await.unwrap();
        assert!(v.current_load_kg <= v.capacity_kg);
    }
    assert!(!store.routes().await.is_empty());

    let mut types = Vec::new();
    while let Ok(envelope) = events.try_recv() {
        types.push(envelope.event_type);
    }
    assert_eq!(types.iter().filter(|t| *t == "AssignmentCreated").count(), 2);
    assert!(types.iter().any(|t| t == "AgentCycleCompleted"));

    sup.stop().await.unwrap();
    assert_eq!(sup.status("dispatch-1").await.unwrap().status, AgentStatus::Offline);
}

#[tokio::test]
async fn test_duplicate_and_unknown_agents() {
    let sup = supervisor(seeded_store().await, Arc::new(BroadcastNotifier::new(16)));
    sup.register(AgentKind::Route, spec("route-1")).await.unwrap();

    let err = sup.register(AgentKind::Route, spec("route-1")).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidCommand { .. }));

    let err = sup.status("nobody").await.unwrap_err();
    assert!(matches!(err, DomainError::AgentNotFound { .. }));

    let generated = sup.register(AgentKind::Pricing, AgentSpec::default()).await.unwrap();
    assert!(generated.starts_with("pricing-"));
    assert_eq!(sup.overview().await.total_agents, 2);
}

#[tokio::test]
async fn test_manual_cycle_on_unstarted_agent_returns_to_idle() {
    let store = seeded_store().await;
    let sup = supervisor(store.clone(), Arc::new(BroadcastNotifier::new(16)));
    sup.register(AgentKind::Dispatch, spec("dispatch-1")).await.unwrap();

    let outcome = sup.trigger_action("dispatch-1", AgentAction::RunCycle).await.unwrap();
    match outcome {
        ActionOutcome::CycleRan { report } => assert_eq!(report.processed, 2),
        other => panic!("unexpected outcome {:?}", other),
    }

    let status = sup.status("dispatch-1").await.unwrap();
    assert_eq!(status.status, AgentStatus::Idle);
    assert_eq!(status.tasks_completed, 1);
    assert_eq!(store.assignments().await.len(), 2);
}

#[tokio::test]
async fn test_preview_plans_without_persisting() {
    let store = seeded_store().await;
    let sup = supervisor(store.clone(), Arc::new(BroadcastNotifier::new(16)));
    sup.register(AgentKind::Universal, spec("universal-1")).await.unwrap();
    sup.register(AgentKind::Pricing, spec("pricing-1")).await.unwrap();

    let params = PreviewDispatchParams {
        orders: vec![order("p-1", 4.0, 2), order("p-2", 40.0, 1)],
        vehicles: vec![vehicle("x-1", 10.0)],
    };

    let outcome = sup
        .trigger_action("universal-1", AgentAction::PreviewDispatch(params.clone()))
        .await
        .unwrap();
    match outcome {
        ActionOutcome::Plan { plan } => {
            assert_eq!(plan.unassigned, vec!["p-2".to_string()]);
            assert_eq!(plan.assignments[0].vehicle_id, "x-1");
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(store.assignments().await.is_empty());

    let err = sup
        .trigger_action("pricing-1", AgentAction::PreviewDispatch(params))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidCommand { .. }));
}

#[tokio::test]
async fn test_build_route_action_uses_default_factors() {
    let sup = supervisor(seeded_store().await, Arc::new(BroadcastNotifier::new(16)));
    sup.register(AgentKind::Route, spec("route-1")).await.unwrap();

    let mut start = vehicle("r-1", 10.0);
    start.location = Some(Location::new(0.0, 0.0));
    start.avg_speed_kmh = 60.0;
    let mut delivery = order("d-1", 1.0, 1);
    delivery.pickup_location = Some(Location::new(0.0, 0.0));
    delivery.delivery_location = Some(Location::new(0.0, 1.0));

    let action = AgentAction::BuildRoute(BuildRouteParams {
        vehicle: start,
        deliveries: vec![delivery],
        traffic_factor: None,
        weather_factor: None,
    });
    match sup.trigger_action("route-1", action).await.unwrap() {
        ActionOutcome::Route { route } => {
            assert_eq!(route.waypoints.len(), 3);
            assert_eq!(route.traffic_factor, 1.2);
            assert!((route.estimated_duration_min - route.estimated_distance_km * 1.2).abs() < 1e-9);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_scheduler_and_tracks_attempts() {
    let sup = supervisor(seeded_store().await, Arc::new(BroadcastNotifier::new(64)));
    sup.register(AgentKind::Dispatch, spec("dispatch-1")).await.unwrap();
    sup.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    sup.restart_agent("dispatch-1", "no heartbeat for 400s").await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let status = sup.status("dispatch-1").await.unwrap();
    assert_eq!(status.status, AgentStatus::Active);
    // the replacement ran its first cycle, which clears the restart counter
    assert_eq!(status.tasks_completed, 2);
    assert_eq!(status.restart_attempts, 0);

    sup.restart("dispatch-1").await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(sup.status("dispatch-1").await.unwrap().tasks_completed, 3);

    sup.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_offline_agent_needs_manual_restart() {
    let sup = supervisor(seeded_store().await, Arc::new(BroadcastNotifier::new(64)));
    sup.register(AgentKind::Restock, spec("restock-1")).await.unwrap();
    sup.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    sup.take_offline("restock-1", "3 restarts without recovery").await.unwrap();
    let status = sup.status("restock-1").await.unwrap();
    assert_eq!(status.status, AgentStatus::Offline);
    assert!(status.requires_intervention);
    assert_eq!(sup.overview().await.needs_attention, vec!["restock-1".to_string()]);

    let err = sup.trigger_action("restock-1", AgentAction::RunCycle).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidCommand { .. }));

    sup.restart("restock-1").await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let status = sup.status("restock-1").await.unwrap();
    assert!(!status.requires_intervention);
    assert_eq!(status.status, AgentStatus::Active);

    sup.stop().await.unwrap();
}

/// Takes five seconds to accept each event.
struct SlowNotifier;

#[async_trait]
impl Notifier for SlowNotifier {
    async fn publish(&self, _event: EventEnvelope) -> Result<(), String> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    }
}

/// The first read of pending orders hangs for 30 seconds.
struct SlowFirstRead {
    inner: InMemoryStore,
    reads: AtomicUsize,
}

#[async_trait]
impl Store for SlowFirstRead {
    async fn get_pending_orders(&self) -> DomainResult<Vec<Order>> {
        if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.inner.get_pending_orders().await
    }

    async fn get_available_vehicles(&self) -> DomainResult<Vec<Vehicle>> {
        self.inner.get_available_vehicles().await
    }

    async fn persist_assignment(&self, assignment: &Assignment) -> DomainResult<()> {
        self.inner.persist_assignment(assignment).await
    }

    async fn persist_route(&self, route: &Route) -> DomainResult<()> {
        self.inner.persist_route(route).await
    }

    async fn apply_vehicle_load_delta(&self, vehicle_id: &str, delta_kg: f64) -> DomainResult<()> {
        self.inner.apply_vehicle_load_delta(vehicle_id, delta_kg).await
    }
}

async fn completed(sup: &Supervisor, id: &str) -> u64 {
    sup.status(id).await.unwrap().tasks_completed
}

#[tokio::test(start_paused = true)]
async fn test_register_racing_start_runs_a_single_scheduler() {
    let sup = supervisor(seeded_store().await, Arc::new(SlowNotifier));

    let (registered, started) = tokio::join!(sup.register(AgentKind::Route, spec("r-1")), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        sup.start().await
    });
    registered.unwrap();
    started.unwrap();

    // one cycle at start, then one per 60s interval
    tokio::time::sleep(Duration::from_secs(600)).await;
    let before_stop = completed(&sup, "r-1").await;
    assert!((10..=11).contains(&before_stop), "completed {} cycles", before_stop);

    sup.stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(600)).await;
    let status = sup.status("r-1").await.unwrap();
    assert_eq!(status.status, AgentStatus::Offline);
    assert_eq!(status.tasks_completed, before_stop);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_restarts_and_register_keep_one_scheduler_each() {
    let sup = supervisor(seeded_store().await, Arc::new(SlowNotifier));
    sup.register(AgentKind::Route, spec("r-1")).await.unwrap();
    sup.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let (first, second, registered) = tokio::join!(
        sup.restart("r-1"),
        sup.restart("r-1"),
        sup.register(AgentKind::Route, spec("r-2"))
    );
    first.unwrap();
    second.unwrap();
    registered.unwrap();

    tokio::time::sleep(Duration::from_secs(600)).await;
    let r1 = completed(&sup, "r-1").await;
    let r2 = completed(&sup, "r-2").await;
    assert!(r1 <= 14, "r-1 completed {} cycles", r1);
    assert!((10..=11).contains(&r2), "r-2 completed {} cycles", r2);

    sup.stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(completed(&sup, "r-1").await, r1);
    assert_eq!(completed(&sup, "r-2").await, r2);
}

#[tokio::test(start_paused = true)]
async fn test_restart_waits_for_the_old_scheduler_before_spawning() {
    let store = Arc::new(SlowFirstRead {
        inner: InMemoryStore::new(),
        reads: AtomicUsize::new(0),
    });
    store.inner.add_order(order("o-1", 5.0, 1)).await;
    store.inner.add_vehicle(vehicle("v-1", 10.0)).await;
    let sup = supervisor(store.clone(), Arc::new(BroadcastNotifier::new(16)));
    sup.register(AgentKind::Dispatch, spec("dispatch-1")).await.unwrap();
    sup.start().await.unwrap();

    // the first cycle is stuck in its read
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(sup.status("dispatch-1").await.unwrap().status, AgentStatus::Busy);

    let began = tokio::time::Instant::now();
    sup.restart("dispatch-1").await.unwrap();
    // the stuck cycle ignores cancellation, so restart sits out the grace period
    assert!(began.elapsed() >= SupervisorSettings::default().shutdown_grace);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let status = sup.status("dispatch-1").await.unwrap();
    assert_eq!(status.status, AgentStatus::Active);
    assert_eq!((status.tasks_completed, status.tasks_failed), (1, 0));

    // the aborted read would have finished by now; it must not book a cycle
    tokio::time::sleep(Duration::from_secs(40)).await;
    assert_eq!(completed(&sup, "dispatch-1").await, 1);
    assert_eq!(store.inner.assignments().await.len(), 1);

    sup.stop().await.unwrap();
}
