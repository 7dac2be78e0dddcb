use super::{BehaviorSettings, CycleContext, CycleReport};
use crate::common::DomainResult;
use crate::domains::dispatch::{
    partition_valid, validate_order, validate_vehicle, DispatchEngine, DispatchEvent, DispatchPlan,
    Order, RouteBuilder, Vehicle,
};
use std::collections::HashMap;

const AGGREGATE_TYPE: &str = "Dispatch";

/// fetch → plan → persist → route → publish.
pub struct DispatchCycle {
    engine: DispatchEngine,
    routes: RouteBuilder,
}

impl DispatchCycle {
    pub fn new(settings: &BehaviorSettings) -> Self {
        Self {
            engine: DispatchEngine::new(settings.dispatch.clone()),
            routes: RouteBuilder::new(settings.traffic_factor, settings.weather_factor),
        }
    }

    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }

    pub fn route_builder(&self) -> &RouteBuilder {
        &self.routes
    }

    /// Plan without persisting anything; invalid rows are dropped, not fatal.
    pub fn preview(&self, orders: &[Order], vehicles: &[Vehicle], ctx: &CycleContext) -> DomainResult<DispatchPlan> {
        let (orders, _) = partition_valid(orders, validate_order);
        let (vehicles, _) = partition_valid(vehicles, validate_vehicle);
        self.engine.create_plan(&orders, &vehicles, ctx.clock.now())
    }

    pub async fn run(&self, ctx: &CycleContext) -> DomainResult<CycleReport> {
        let pending = ctx.store.get_pending_orders().await?;
        let fleet = ctx.store.get_available_vehicles().await?;

        let (orders, bad_orders) = partition_valid(&pending, validate_order);
        let (vehicles, bad_vehicles) = partition_valid(&fleet, validate_vehicle);
        for rejected in bad_orders.iter().chain(bad_vehicles.iter()) {
            ctx.logger.warn(&format!("Skipping input: {}", rejected));
        }

        let mut report = CycleReport {
            processed: orders.len(),
            skipped: bad_orders.len() + bad_vehicles.len(),
            ..CycleReport::default()
        };
        if orders.is_empty() || vehicles.is_empty() {
            report.notes.push(format!(
                "{} orders, {} vehicles available; nothing to plan",
                orders.len(),
                vehicles.len()
            ));
            return Ok(report);
        }

        let plan = self.engine.create_plan(&orders, &vehicles, ctx.clock.now())?;
        let weights: HashMap<&str, f64> = orders.iter().map(|o| (o.id.as_str(), o.weight_kg)).collect();

        for assignment in &plan.assignments {
            let delta = weights.get(assignment.order_id.as_str()).copied().unwrap_or(0.0);
            ctx.store.commit_assignment(assignment, delta).await?;
            ctx.publish(
                &DispatchEvent::AssignmentCreated {
                    agent_id: ctx.agent_id.clone(),
                    assignment: assignment.clone(),
                    timestamp: ctx.clock.now(),
                },
                AGGREGATE_TYPE,
            );
        }
        report.produced += plan.assignments.len();

        for order_id in &plan.unassigned {
            ctx.logger
                .info(&format!("Order {} left pending: no vehicle with enough capacity", order_id));
            ctx.publish(
                &DispatchEvent::OrderLeftPending {
                    agent_id: ctx.agent_id.clone(),
                    order_id: order_id.clone(),
                    timestamp: ctx.clock.now(),
                },
                AGGREGATE_TYPE,
            );
        }
        if !plan.unassigned.is_empty() {
            report.notes.push(format!("{} orders left pending", plan.unassigned.len()));
        }

        for built in self.routes.build_routes_for_plan(&plan, &orders, &vehicles) {
            match built {
                Ok(route) => {
                    ctx.store.persist_route(&route).await?;
                    ctx.publish(
                        &DispatchEvent::RoutePlanned {
                            agent_id: ctx.agent_id.clone(),
                            route,
                            timestamp: ctx.clock.now(),
                        },
                        AGGREGATE_TYPE,
                    );
                }
                Err(e) => {
                    report.skipped += 1;
                    ctx.logger.warn(&format!("Route not built: {}", e));
                }
            }
        }

        Ok(report)
    }
}
