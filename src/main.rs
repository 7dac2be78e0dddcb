use fleet_agents::adapters::outbound::{init_combined_logger, init_console_logger, BroadcastNotifier, InMemoryStore, PostgresStore};
use fleet_agents::application::{AgentSpec, Supervisor};
use fleet_agents::common::{ApplicationResult, SystemClock};
use fleet_agents::config::StoreBackend;
use fleet_agents::domains::dispatch::{Location, Notifier, Order, Store, Vehicle};
use fleet_agents::domains::logger::DynLogger;
use fleet_agents::Config;
use rand::Rng;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ApplicationResult<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    // A missing file means defaults; a malformed one stops startup.
    let config = Config::load(Some(Path::new(&config_path)))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)))
        .init();

    info!("Starting fleet agents");

    let logger: DynLogger = match &config.logging.file {
        Some(path) => init_combined_logger(path),
        None => init_console_logger(),
    };

    let store: Arc<dyn Store> = match config.store.backend {
        StoreBackend::Memory => {
            let store = InMemoryStore::new();
            seed_demo_data(&store, config.store.seed_orders, config.store.seed_vehicles).await;
            info!(
                "Using in-memory store with {} demo orders and {} vehicles",
                config.store.seed_orders, config.store.seed_vehicles
            );
            Arc::new(store)
        }
        StoreBackend::Postgres => {
            info!("PostgreSQL host: {}", config.postgres.host);
            Arc::new(PostgresStore::new(&config.postgres).await?)
        }
    };

    let notifier = build_notifier(&config);

    let supervisor = Arc::new(Supervisor::new(
        store,
        notifier,
        Arc::new(SystemClock),
        logger,
        config.supervisor_settings(),
    ));

    for agent in config.enabled_agents() {
        let id = supervisor
            .register(
                agent.kind,
                AgentSpec {
                    id: agent.id.clone(),
                    cycle_interval_secs: agent.cycle_interval_secs,
                },
            )
            .await?;
        info!("Registered {} as {}", agent.kind, id);
    }

    supervisor.start().await?;
    info!("Fleet agents started");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down fleet agents");

    supervisor.stop().await?;
    let overview = supervisor.overview().await;
    info!(
        "Final tally: {} cycles completed, {} failed across {} agents",
        overview.tasks_completed, overview.tasks_failed, overview.total_agents
    );

    Ok(())
}

#[cfg(feature = "kafka")]
fn build_notifier(config: &Config) -> Arc<dyn Notifier> {
    if config.kafka.enabled {
        match fleet_agents::adapters::outbound::KafkaNotifier::new(config.kafka.clone()) {
            Ok(notifier) => {
                info!("Kafka brokers: {:?}", config.kafka.brokers);
                return Arc::new(notifier);
            }
            Err(e) => warn!("Kafka unavailable, events stay in-process: {}", e),
        }
    }
    Arc::new(BroadcastNotifier::new(1024))
}

#[cfg(not(feature = "kafka"))]
fn build_notifier(config: &Config) -> Arc<dyn Notifier> {
    if config.kafka.enabled {
        warn!("Kafka requested but this build lacks the `kafka` feature");
    }
    Arc::new(BroadcastNotifier::new(1024))
}

/// Random orders and vehicles scattered around central Berlin.
async fn seed_demo_data(store: &InMemoryStore, orders: usize, vehicles: usize) {
    let mut rng = rand::thread_rng();

    for i in 0..vehicles {
        let location = near(&mut rng);
        store
            .add_vehicle(Vehicle {
                id: format!("vehicle-{}", i + 1),
                capacity_kg: rng.gen_range(50.0..200.0),
                current_load_kg: 0.0,
                location: Some(location),
                avg_speed_kmh: rng.gen_range(20.0..45.0),
                total_deliveries: rng.gen_range(0..500),
            })
            .await;
    }

    for i in 0..orders {
        let pickup = near(&mut rng);
        let dropoff = near(&mut rng);
        let due_in = rng.gen_range(30..240);
        store
            .add_order(Order {
                id: format!("order-{}", i + 1),
                weight_kg: rng.gen_range(0.5..40.0),
                priority: rng.gen_range(1..=5),
                pickup_location: Some(pickup),
                delivery_location: Some(dropoff),
                requested_delivery_time: Some(chrono::Utc::now() + chrono::Duration::minutes(due_in)),
            })
            .await;
    }
}

fn near<R: Rng>(rng: &mut R) -> Location {
    Location::new(52.52 + rng.gen_range(-0.05..0.05), 13.405 + rng.gen_range(-0.08..0.08))
}
