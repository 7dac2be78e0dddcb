use crate::common::{DomainError, DomainResult};
use crate::config::PostgresConfig;
use crate::domains::dispatch::{Assignment, Location, Order, Route, Store, Vehicle, VehicleManifest};
use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, Runtime};
use std::collections::BTreeMap;
use tokio_postgres::{NoTls, Row};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS orders (
        id VARCHAR(255) PRIMARY KEY,
        weight_kg DOUBLE PRECISION NOT NULL,
        priority SMALLINT NOT NULL DEFAULT 3,
        pickup_lat DOUBLE PRECISION,
        pickup_lng DOUBLE PRECISION,
        delivery_lat DOUBLE PRECISION,
        delivery_lng DOUBLE PRECISION,
        requested_delivery_time TIMESTAMPTZ,
        status VARCHAR(32) NOT NULL DEFAULT 'pending',
        assigned_vehicle_id VARCHAR(255)
    );

    CREATE TABLE IF NOT EXISTS vehicles (
        id VARCHAR(255) PRIMARY KEY,
        capacity_kg DOUBLE PRECISION NOT NULL,
        current_load_kg DOUBLE PRECISION NOT NULL DEFAULT 0,
        lat DOUBLE PRECISION,
        lng DOUBLE PRECISION,
        avg_speed_kmh DOUBLE PRECISION NOT NULL DEFAULT 30,
        total_deliveries INTEGER NOT NULL DEFAULT 0,
        status VARCHAR(32) NOT NULL DEFAULT 'available'
    );

    CREATE TABLE IF NOT EXISTS dispatch_assignments (
        order_id VARCHAR(255) PRIMARY KEY,
        vehicle_id VARCHAR(255) NOT NULL,
        score DOUBLE PRECISION NOT NULL,
        estimated_pickup_time TIMESTAMPTZ NOT NULL,
        estimated_delivery_time TIMESTAMPTZ NOT NULL,
        reasoning TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE TABLE IF NOT EXISTS planned_routes (
        id BIGSERIAL PRIMARY KEY,
        vehicle_id VARCHAR(255) NOT NULL,
        route JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
    CREATE INDEX IF NOT EXISTS idx_planned_routes_vehicle ON planned_routes(vehicle_id);
"#;

const ORDER_COLUMNS: &str = "id, weight_kg, priority, pickup_lat, pickup_lng, delivery_lat, delivery_lng, requested_delivery_time";

/// Operational store on PostgreSQL. Every driver or pool error surfaces as
/// `DomainError::TransientStore` so the scheduler retries after its backoff.
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    pub async fn new(config: &PostgresConfig) -> DomainResult<Self> {
        let mut pg_config = Config::new();
        pg_config.host = Some(config.host.clone());
        pg_config.port = Some(config.port);
        pg_config.dbname = Some(config.database.clone());
        pg_config.user = Some(config.username.clone());
        pg_config.password = Some(config.password.clone());

        let pool = pg_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DomainError::InfrastructureError(format!("Failed to create PostgreSQL pool: {}", e)))?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn client(&self) -> DomainResult<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| DomainError::TransientStore(format!("Failed to get database connection: {}", e)))
    }

    async fn initialize_schema(&self) -> DomainResult<()> {
        let client = self.client().await?;
        client
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| DomainError::InfrastructureError(format!("Failed to initialize schema: {}", e)))
    }
}

async fn write_assignment(tx: &deadpool_postgres::Transaction<'_>, assignment: &Assignment) -> DomainResult<()> {
    tx.execute(
        "INSERT INTO dispatch_assignments
            (order_id, vehicle_id, score, estimated_pickup_time, estimated_delivery_time, reasoning)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (order_id) DO UPDATE SET
            vehicle_id = EXCLUDED.vehicle_id,
            score = EXCLUDED.score,
            estimated_pickup_time = EXCLUDED.estimated_pickup_time,
            estimated_delivery_time = EXCLUDED.estimated_delivery_time,
            reasoning = EXCLUDED.reasoning",
        &[
            &assignment.order_id,
            &assignment.vehicle_id,
            &assignment.score,
            &assignment.estimated_pickup_time,
            &assignment.estimated_delivery_time,
            &assignment.reasoning,
        ],
    )
    .await
    .map_err(store_err("Failed to insert assignment"))?;

    tx.execute(
        "UPDATE orders SET status = 'assigned', assigned_vehicle_id = $2 WHERE id = $1",
        &[&assignment.order_id, &assignment.vehicle_id],
    )
    .await
    .map_err(store_err("Failed to mark order assigned"))?;
    Ok(())
}

fn store_err(context: &str) -> impl Fn(tokio_postgres::Error) -> DomainError + '_ {
    move |e| DomainError::TransientStore(format!("{}: {}", context, e))
}

fn location(row: &Row, lat: &str, lng: &str) -> Option<Location> {
    match (row.get::<_, Option<f64>>(lat), row.get::<_, Option<f64>>(lng)) {
        (Some(lat), Some(lng)) => Some(Location::new(lat, lng)),
        _ => None,
    }
}

fn order_from_row(row: &Row) -> Order {
    let priority: i16 = row.get("priority");
    Order {
        id: row.get("id"),
        weight_kg: row.get("weight_kg"),
        // Out-of-range values map to 0 and are rejected by validation
        priority: u8::try_from(priority).unwrap_or(0),
        pickup_location: location(row, "pickup_lat", "pickup_lng"),
        delivery_location: location(row, "delivery_lat", "delivery_lng"),
        requested_delivery_time: row.get("requested_delivery_time"),
    }
}

fn vehicle_from_row(row: &Row) -> Vehicle {
    let total: i32 = row.get("total_deliveries");
    Vehicle {
        id: row.get("id"),
        capacity_kg: row.get("capacity_kg"),
        current_load_kg: row.get("current_load_kg"),
        location: location(row, "lat", "lng"),
        avg_speed_kmh: row.get("avg_speed_kmh"),
        total_deliveries: u32::try_from(total).unwrap_or(0),
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_pending_orders(&self) -> DomainResult<Vec<Order>> {
        let client = self.client().await?;
        let rows = client
            .query(
                &format!("SELECT {} FROM orders WHERE status = 'pending' ORDER BY id", ORDER_COLUMNS),
                &[],
            )
            .await
            .map_err(store_err("Failed to load pending orders"))?;
        Ok(rows.iter().map(order_from_row).collect())
    }

    async fn get_available_vehicles(&self) -> DomainResult<Vec<Vehicle>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT id, capacity_kg, current_load_kg, lat, lng, avg_speed_kmh, total_deliveries
                 FROM vehicles
                 WHERE status = 'available' AND current_load_kg < capacity_kg
                 ORDER BY id",
                &[],
            )
            .await
            .map_err(store_err("Failed to load vehicles"))?;
        Ok(rows.iter().map(vehicle_from_row).collect())
    }

    async fn persist_assignment(&self, assignment: &Assignment) -> DomainResult<()> {
        let mut client = self.client().await?;
        let tx = client
            .transaction()
            .await
            .map_err(store_err("Failed to open transaction"))?;
        write_assignment(&tx, assignment).await?;
        tx.commit().await.map_err(store_err("Failed to commit assignment"))
    }

    async fn commit_assignment(&self, assignment: &Assignment, delta_kg: f64) -> DomainResult<()> {
        let mut client = self.client().await?;
        let tx = client
            .transaction()
            .await
            .map_err(store_err("Failed to open transaction"))?;
        write_assignment(&tx, assignment).await?;
        let updated = tx
            .execute(
                "UPDATE vehicles SET current_load_kg = current_load_kg + $2 WHERE id = $1",
                &[&assignment.vehicle_id, &delta_kg],
            )
            .await
            .map_err(store_err("Failed to update vehicle load"))?;
        if updated == 0 {
            return Err(DomainError::TransientStore(format!(
                "vehicle {} not found",
                assignment.vehicle_id
            )));
        }
        tx.commit().await.map_err(store_err("Failed to commit assignment"))
    }

    async fn persist_route(&self, route: &Route) -> DomainResult<()> {
        let client = self.client().await?;
        let body = serde_json::to_value(route)?;
        client
            .execute(
                "INSERT INTO planned_routes (vehicle_id, route) VALUES ($1, $2)",
                &[&route.vehicle_id, &body],
            )
            .await
            .map_err(store_err("Failed to insert route"))?;
        Ok(())
    }

    async fn apply_vehicle_load_delta(&self, vehicle_id: &str, delta_kg: f64) -> DomainResult<()> {
        let client = self.client().await?;
        let updated = client
            .execute(
                "UPDATE vehicles SET current_load_kg = current_load_kg + $2 WHERE id = $1",
                &[&vehicle_id, &delta_kg],
            )
            .await
            .map_err(store_err("Failed to update vehicle load"))?;
        if updated == 0 {
            return Err(DomainError::TransientStore(format!("vehicle {} not found", vehicle_id)));
        }
        Ok(())
    }

    async fn get_vehicle_manifests(&self) -> DomainResult<Vec<VehicleManifest>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT v.id AS vid, v.capacity_kg, v.current_load_kg, v.lat, v.lng, v.avg_speed_kmh,
                        v.total_deliveries,
                        o.id, o.weight_kg, o.priority, o.pickup_lat, o.pickup_lng,
                        o.delivery_lat, o.delivery_lng, o.requested_delivery_time
                 FROM dispatch_assignments a
                 JOIN vehicles v ON v.id = a.vehicle_id
                 JOIN orders o ON o.id = a.order_id
                 WHERE o.status = 'assigned'
                 ORDER BY v.id, a.created_at",
                &[],
            )
            .await
            .map_err(store_err("Failed to load manifests"))?;

        let mut manifests: BTreeMap<String, VehicleManifest> = BTreeMap::new();
        for row in &rows {
            let vehicle_id: String = row.get("vid");
            let manifest = manifests.entry(vehicle_id.clone()).or_insert_with(|| {
                let total: i32 = row.get("total_deliveries");
                VehicleManifest {
                    vehicle: Vehicle {
                        id: vehicle_id,
                        capacity_kg: row.get("capacity_kg"),
                        current_load_kg: row.get("current_load_kg"),
                        location: location(row, "lat", "lng"),
                        avg_speed_kmh: row.get("avg_speed_kmh"),
                        total_deliveries: u32::try_from(total).unwrap_or(0),
                    },
                    deliveries: Vec::new(),
                }
            });
            manifest.deliveries.push(order_from_row(row));
        }
        Ok(manifests.into_values().collect())
    }
}
