use super::types::{Assignment, Order, Route, Vehicle, VehicleManifest};
use crate::common::{DomainError, DomainResult, EventEnvelope};
use crate::domains::operations::{
    DemandForecast, DemandObservation, InventoryLevel, PriceAdjustment, PricingSignal, RestockRequest,
};
use async_trait::async_trait;

/// Port for the operational data store. Reads are per-call snapshots; writes
/// either succeed or fail with `DomainError::TransientStore`.
///
/// The non-dispatch methods default to "nothing to do" so a store that only
/// backs dispatch and routing needs to implement the first five.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_pending_orders(&self) -> DomainResult<Vec<Order>>;
    async fn get_available_vehicles(&self) -> DomainResult<Vec<Vehicle>>;
    async fn persist_assignment(&self, assignment: &Assignment) -> DomainResult<()>;
    async fn persist_route(&self, route: &Route) -> DomainResult<()>;
    async fn apply_vehicle_load_delta(&self, vehicle_id: &str, delta_kg: f64) -> DomainResult<()>;

    /// Record an assignment together with the load it adds to the vehicle.
    /// Either both land or neither does: the load is raised first and
    /// lowered again if the assignment cannot be written. Stores with
    /// transactions should override this with a single transaction.
    async fn commit_assignment(&self, assignment: &Assignment, delta_kg: f64) -> DomainResult<()> {
        self.apply_vehicle_load_delta(&assignment.vehicle_id, delta_kg).await?;
        if let Err(e) = self.persist_assignment(assignment).await {
            if let Err(undo) = self.apply_vehicle_load_delta(&assignment.vehicle_id, -delta_kg).await {
                return Err(DomainError::TransientStore(format!(
                    "{}; load on {} left {} kg too high: {}",
                    e, assignment.vehicle_id, delta_kg, undo
                )));
            }
            return Err(e);
        }
        Ok(())
    }

    async fn get_vehicle_manifests(&self) -> DomainResult<Vec<VehicleManifest>> {
        Ok(Vec::new())
    }

    async fn get_inventory_levels(&self) -> DomainResult<Vec<InventoryLevel>> {
        Ok(Vec::new())
    }

    async fn persist_restock_request(&self, _request: &RestockRequest) -> DomainResult<()> {
        Ok(())
    }

    async fn get_pricing_signals(&self) -> DomainResult<Vec<PricingSignal>> {
        Ok(Vec::new())
    }

    async fn persist_price_adjustment(&self, _adjustment: &PriceAdjustment) -> DomainResult<()> {
        Ok(())
    }

    async fn get_demand_history(&self) -> DomainResult<Vec<DemandObservation>> {
        Ok(Vec::new())
    }

    async fn persist_forecast(&self, _forecast: &DemandForecast) -> DomainResult<()> {
        Ok(())
    }
}

/// Fire-and-forget broadcast of domain events (websocket fan-out, Kafka, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, event: EventEnvelope) -> Result<(), String>;
}
