use super::geo::path_length_km;
use super::types::{DispatchPlan, Order, Route, Vehicle};
use crate::common::{DomainError, DomainResult};
use std::collections::HashMap;

pub const DEFAULT_TRAFFIC_FACTOR: f64 = 1.2;
pub const DEFAULT_WEATHER_FACTOR: f64 = 1.0;

/// Lays out a vehicle's deliveries as start → (pickup, dropoff)* in the
/// order they were assigned. Stops are not reordered.
#[derive(Debug, Clone)]
pub struct RouteBuilder {
    traffic_factor: f64,
    weather_factor: f64,
}

impl Default for RouteBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TRAFFIC_FACTOR, DEFAULT_WEATHER_FACTOR)
    }
}

impl RouteBuilder {
    pub fn new(traffic_factor: f64, weather_factor: f64) -> Self {
        Self {
            traffic_factor,
            weather_factor,
        }
    }

    pub fn build_route(&self, vehicle: &Vehicle, deliveries: &[Order]) -> DomainResult<Route> {
        self.build_route_with_factors(vehicle, deliveries, self.traffic_factor, self.weather_factor)
    }

    pub fn build_route_with_factors(
        &self,
        vehicle: &Vehicle,
        deliveries: &[Order],
        traffic_factor: f64,
        weather_factor: f64,
    ) -> DomainResult<Route> {
        let start = vehicle
            .position()
            .ok_or_else(|| DomainError::invalid_input("vehicle", &vehicle.id, "missing or invalid location"))?;

        let mut waypoints = Vec::with_capacity(1 + 2 * deliveries.len());
        waypoints.push(start);
        for order in deliveries {
            let pickup = order
                .pickup()
                .ok_or_else(|| DomainError::invalid_input("order", &order.id, "missing or invalid pickup location"))?;
            let dropoff = order
                .dropoff()
                .ok_or_else(|| DomainError::invalid_input("order", &order.id, "missing or invalid delivery location"))?;
            waypoints.push(pickup);
            waypoints.push(dropoff);
        }

        let distance_km = path_length_km(&waypoints);
        let duration_min = if distance_km > 0.0 {
            if vehicle.avg_speed_kmh <= 0.0 || !vehicle.avg_speed_kmh.is_finite() {
                return Err(DomainError::invalid_input("vehicle", &vehicle.id, "average speed must be positive"));
            }
            (distance_km / vehicle.avg_speed_kmh) * 60.0 * traffic_factor * weather_factor
        } else {
            0.0
        };
        // a route that goes nowhere has nothing to compare on
        let score = if distance_km > 0.0 && traffic_factor > 0.0 {
            1.0 / (distance_km * traffic_factor)
        } else {
            0.0
        };

        Ok(Route {
            vehicle_id: vehicle.id.clone(),
            waypoints,
            estimated_distance_km: distance_km,
            estimated_duration_min: duration_min,
            optimization_score: score,
            traffic_factor,
            weather_factor,
        })
    }

    /// One route per vehicle that received work in `plan`, deliveries kept
    /// in the order the plan produced them.
    pub fn build_routes_for_plan(
        &self,
        plan: &DispatchPlan,
        orders: &[Order],
        vehicles: &[Vehicle],
    ) -> Vec<DomainResult<Route>> {
        let orders_by_id: HashMap<&str, &Order> = orders.iter().map(|o| (o.id.as_str(), o)).collect();

        let mut per_vehicle: Vec<(&str, Vec<Order>)> = Vec::new();
        for assignment in &plan.assignments {
            let order = match orders_by_id.get(assignment.order_id.as_str()) {
                Some(o) => (*o).clone(),
                None => continue,
            };
            match per_vehicle.iter_mut().find(|(id, _)| *id == assignment.vehicle_id) {
                Some((_, list)) => list.push(order),
                None => per_vehicle.push((assignment.vehicle_id.as_str(), vec![order])),
            }
        }

        per_vehicle
            .into_iter()
            .filter_map(|(vehicle_id, deliveries)| {
                vehicles
                    .iter()
                    .find(|v| v.id == vehicle_id)
                    .map(|vehicle| self.build_route(vehicle, &deliveries))
            })
            .collect()
    }
}
