use crate::common::{DomainError, DomainResult};
use crate::domains::dispatch::{Assignment, Order, Route, Store, Vehicle, VehicleManifest};
use crate::domains::operations::{
    DemandForecast, DemandObservation, InventoryLevel, PriceAdjustment, PricingSignal, RestockRequest,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    orders: BTreeMap<String, Order>,
    vehicles: BTreeMap<String, Vehicle>,
    assignments: Vec<Assignment>,
    /// Latest route per vehicle.
    routes: BTreeMap<String, Route>,
    inventory: Vec<InventoryLevel>,
    restock_requests: Vec<RestockRequest>,
    pricing: Vec<PricingSignal>,
    price_adjustments: Vec<PriceAdjustment>,
    demand: Vec<DemandObservation>,
    forecasts: Vec<DemandForecast>,
}

/// Process-local store used by the demo binary and the tests. An order is
/// pending until an assignment for it is persisted.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_order(&self, order: Order) {
        self.tables.write().await.orders.insert(order.id.clone(), order);
    }

    pub async fn add_vehicle(&self, vehicle: Vehicle) {
        self.tables.write().await.vehicles.insert(vehicle.id.clone(), vehicle);
    }

    pub async fn add_inventory(&self, level: InventoryLevel) {
        self.tables.write().await.inventory.push(level);
    }

    pub async fn add_pricing_signal(&self, signal: PricingSignal) {
        self.tables.write().await.pricing.push(signal);
    }

    pub async fn add_demand(&self, observation: DemandObservation) {
        self.tables.write().await.demand.push(observation);
    }

    pub async fn assignments(&self) -> Vec<Assignment> {
        self.tables.read().await.assignments.clone()
    }

    pub async fn routes(&self) -> Vec<Route> {
        self.tables.read().await.routes.values().cloned().collect()
    }

    pub async fn vehicle(&self, id: &str) -> Option<Vehicle> {
        self.tables.read().await.vehicles.get(id).cloned()
    }

    pub async fn restock_requests(&self) -> Vec<RestockRequest> {
        self.tables.read().await.restock_requests.clone()
    }

    pub async fn price_adjustments(&self) -> Vec<PriceAdjustment> {
        self.tables.read().await.price_adjustments.clone()
    }

    pub async fn forecasts(&self) -> Vec<DemandForecast> {
        self.tables.read().await.forecasts.clone()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_pending_orders(&self) -> DomainResult<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|o| !tables.assignments.iter().any(|a| a.order_id == o.id))
            .cloned()
            .collect())
    }

    async fn get_available_vehicles(&self) -> DomainResult<Vec<Vehicle>> {
        let tables = self.tables.read().await;
        Ok(tables
            .vehicles
            .values()
            .filter(|v| v.available_capacity_kg() > 0.0)
            .cloned()
            .collect())
    }

    async fn persist_assignment(&self, assignment: &Assignment) -> DomainResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.orders.contains_key(&assignment.order_id) {
            return Err(DomainError::TransientStore(format!(
                "order {} vanished before assignment",
                assignment.order_id
            )));
        }
        tables.assignments.push(assignment.clone());
        Ok(())
    }

    async fn persist_route(&self, route: &Route) -> DomainResult<()> {
        self.tables.write().await.routes.insert(route.vehicle_id.clone(), route.clone());
        Ok(())
    }

    async fn apply_vehicle_load_delta(&self, vehicle_id: &str, delta_kg: f64) -> DomainResult<()> {
        let mut tables = self.tables.write().await;
        match tables.vehicles.get_mut(vehicle_id) {
            Some(vehicle) => {
                vehicle.current_load_kg += delta_kg;
                Ok(())
            }
            None => Err(DomainError::TransientStore(format!("vehicle {} not found", vehicle_id))),
        }
    }

    async fn commit_assignment(&self, assignment: &Assignment, delta_kg: f64) -> DomainResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.orders.contains_key(&assignment.order_id) {
            return Err(DomainError::TransientStore(format!(
                "order {} vanished before assignment",
                assignment.order_id
            )));
        }
        match tables.vehicles.get_mut(&assignment.vehicle_id) {
            Some(vehicle) => vehicle.current_load_kg += delta_kg,
            None => {
                return Err(DomainError::TransientStore(format!(
                    "vehicle {} not found",
                    assignment.vehicle_id
                )))
            }
        }
        tables.assignments.push(assignment.clone());
        Ok(())
    }

    async fn get_vehicle_manifests(&self) -> DomainResult<Vec<VehicleManifest>> {
        let tables = self.tables.read().await;
        let mut manifests = Vec::new();
        for vehicle in tables.vehicles.values() {
            let deliveries: Vec<Order> = tables
                .assignments
                .iter()
                .filter(|a| a.vehicle_id == vehicle.id)
                .filter_map(|a| tables.orders.get(&a.order_id).cloned())
                .collect();
            if !deliveries.is_empty() {
                manifests.push(VehicleManifest {
                    vehicle: vehicle.clone(),
                    deliveries,
                });
            }
        }
        Ok(manifests)
    }

    async fn get_inventory_levels(&self) -> DomainResult<Vec<InventoryLevel>> {
        Ok(self.tables.read().await.inventory.clone())
    }

    async fn persist_restock_request(&self, request: &RestockRequest) -> DomainResult<()> {
        self.tables.write().await.restock_requests.push(request.clone());
        Ok(())
    }

    async fn get_pricing_signals(&self) -> DomainResult<Vec<PricingSignal>> {
        Ok(self.tables.read().await.pricing.clone())
    }

    async fn persist_price_adjustment(&self, adjustment: &PriceAdjustment) -> DomainResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(signal) = tables.pricing.iter_mut().find(|s| s.product_id == adjustment.product_id) {
            signal.current_price = adjustment.new_price;
        }
        tables.price_adjustments.push(adjustment.clone());
        Ok(())
    }

    async fn get_demand_history(&self) -> DomainResult<Vec<DemandObservation>> {
        Ok(self.tables.read().await.demand.clone())
    }

    async fn persist_forecast(&self, forecast: &DemandForecast) -> DomainResult<()> {
        self.tables.write().await.forecasts.push(forecast.clone());
        Ok(())
    }
}
