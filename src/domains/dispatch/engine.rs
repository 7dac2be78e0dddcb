use super::geo::haversine_km;
use super::types::{Assignment, DispatchPlan, Location, Order, Vehicle};
use crate::common::{DomainError, DomainResult};
use chrono::{DateTime, Duration, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Scoring weights and fixed ETA offsets for greedy dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    pub distance_weight: f64,
    pub capacity_weight: f64,
    pub priority_weight: f64,
    pub pickup_lead_minutes: i64,
    pub delivery_window_minutes: i64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            distance_weight: 0.4,
            capacity_weight: 0.3,
            priority_weight: 0.3,
            pickup_lead_minutes: 10,
            delivery_window_minutes: 35,
        }
    }
}

/// Greedy single-pass matcher: orders in priority order, each takes the
/// best-scoring vehicle that still has room. No backtracking.
#[derive(Debug, Clone, Default)]
pub struct DispatchEngine {
    settings: DispatchSettings,
}

struct Candidate<'a> {
    vehicle: &'a Vehicle,
    location: Location,
    remaining_kg: f64,
}

impl DispatchEngine {
    pub fn new(settings: DispatchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn create_plan(
        &self,
        orders: &[Order],
        vehicles: &[Vehicle],
        now: DateTime<Utc>,
    ) -> DomainResult<DispatchPlan> {
        for order in orders {
            validate_order(order)?;
        }
        for vehicle in vehicles {
            validate_vehicle(vehicle)?;
        }

        let mut queue: Vec<&Order> = orders.iter().collect();
        queue.sort_by_key(|o| {
            (
                o.priority,
                o.requested_delivery_time.is_none(),
                o.requested_delivery_time,
            )
        });

        let mut fleet: Vec<Candidate<'_>> = vehicles
            .iter()
            .filter_map(|v| {
                v.position().map(|location| Candidate {
                    vehicle: v,
                    location,
                    remaining_kg: v.available_capacity_kg(),
                })
            })
            .collect();
        fleet.sort_by_key(|c| {
            Reverse((OrderedFloat(c.remaining_kg), c.vehicle.total_deliveries))
        });

        let mut plan = DispatchPlan::default();
        for order in queue {
            let pickup = match order.pickup() {
                Some(p) => p,
                None => continue,
            };

            let mut best: Option<(usize, f64, f64)> = None;
            for (idx, candidate) in fleet.iter().enumerate() {
                if candidate.remaining_kg < order.weight_kg {
                    continue;
                }
                let distance = haversine_km(&candidate.location, &pickup);
                let score = self.score(order, candidate, distance);
                if best.map_or(true, |(_, top, _)| score > top) {
                    best = Some((idx, score, distance));
                }
            }

            match best {
                Some((idx, score, distance)) => {
                    let candidate = &mut fleet[idx];
                    let capacity_ratio = capacity_ratio(candidate.remaining_kg, candidate.vehicle.capacity_kg);
                    candidate.remaining_kg -= order.weight_kg;

                    let pickup_at = now + Duration::minutes(self.settings.pickup_lead_minutes);
                    let deliver_at = pickup_at + Duration::minutes(self.settings.delivery_window_minutes);
                    plan.assignments.push(Assignment {
                        order_id: order.id.clone(),
                        vehicle_id: candidate.vehicle.id.clone(),
                        score,
                        estimated_pickup_time: pickup_at,
                        estimated_delivery_time: deliver_at,
                        reasoning: format!(
                            "priority {} order, {:.1} km to pickup, {:.0}% capacity free before load",
                            order.priority,
                            distance,
                            capacity_ratio * 100.0
                        ),
                    });
                }
                None => plan.unassigned.push(order.id.clone()),
            }
        }

        Ok(plan)
    }

    fn score(&self, order: &Order, candidate: &Candidate<'_>, distance_km: f64) -> f64 {
        let s = &self.settings;
        s.distance_weight * (1.0 / distance_km.max(1.0))
            + s.capacity_weight * capacity_ratio(candidate.remaining_kg, candidate.vehicle.capacity_kg)
            + s.priority_weight * (f64::from(order.priority) / 5.0)
    }
}

fn capacity_ratio(remaining_kg: f64, capacity_kg: f64) -> f64 {
    if capacity_kg > 0.0 {
        remaining_kg / capacity_kg
    } else {
        0.0
    }
}

pub fn validate_order(order: &Order) -> DomainResult<()> {
    if order.pickup().is_none() {
        return Err(DomainError::invalid_input("order", &order.id, "missing or invalid pickup location"));
    }
    if order.dropoff().is_none() {
        return Err(DomainError::invalid_input("order", &order.id, "missing or invalid delivery location"));
    }
    if !order.weight_kg.is_finite() || order.weight_kg < 0.0 {
        return Err(DomainError::invalid_input("order", &order.id, "weight must be a non-negative number"));
    }
    if !(1..=5).contains(&order.priority) {
        return Err(DomainError::invalid_input("order", &order.id, "priority must be between 1 and 5"));
    }
    Ok(())
}

pub fn validate_vehicle(vehicle: &Vehicle) -> DomainResult<()> {
    if vehicle.position().is_none() {
        return Err(DomainError::invalid_input("vehicle", &vehicle.id, "missing or invalid location"));
    }
    if !vehicle.capacity_kg.is_finite() || vehicle.capacity_kg < 0.0 {
        return Err(DomainError::invalid_input("vehicle", &vehicle.id, "capacity must be a non-negative number"));
    }
    Ok(())
}

/// Split a snapshot into items the engine accepts and the validation errors
/// for the rest, so one bad row does not sink the whole cycle.
pub fn partition_valid<T: Clone>(
    items: &[T],
    validate: impl Fn(&T) -> DomainResult<()>,
) -> (Vec<T>, Vec<DomainError>) {
    let mut valid = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();
    for item in items {
        match validate(item) {
            Ok(()) => valid.push(item.clone()),
            Err(e) => rejected.push(e),
        }
    }
    (valid, rejected)
}
