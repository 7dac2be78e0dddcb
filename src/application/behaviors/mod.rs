pub mod dispatch;
pub mod operations;
pub mod route;

pub use dispatch::*;
pub use operations::*;
pub use route::*;

use super::publisher::EventPublisher;
use crate::common::{Clock, DomainEvent, DomainResult, EventEnvelope, EventMetadata};
use crate::domains::agent::AgentKind;
use crate::domains::dispatch::{DispatchSettings, Store};
use crate::domains::logger::DynLogger;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Collaborators a cycle body may touch. Cheap to clone.
#[derive(Clone)]
pub struct CycleContext {
    pub agent_id: String,
    pub store: Arc<dyn Store>,
    pub events: EventPublisher,
    pub clock: Arc<dyn Clock>,
    pub logger: DynLogger,
}

impl CycleContext {
    /// Queue an event for the notifier. Never waits on the notifier.
    pub fn publish<E: DomainEvent + Serialize>(&self, event: &E, aggregate_type: &str) {
        let metadata = EventMetadata::from_source(format!("agent:{}", self.agent_id));
        match EventEnvelope::new(event, aggregate_type, metadata) {
            Ok(envelope) => self.events.publish(envelope),
            Err(e) => self
                .logger
                .warn(&format!("Could not encode {} event: {}", event.event_type(), e)),
        }
    }
}

/// Tallies for one cycle, folded into the agent's completion event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub processed: usize,
    pub produced: usize,
    pub skipped: usize,
    pub notes: Vec<String>,
}

impl CycleReport {
    pub fn merge(mut self, other: CycleReport) -> Self {
        self.processed += other.processed;
        self.produced += other.produced;
        self.skipped += other.skipped;
        self.notes.extend(other.notes);
        self
    }

    pub fn summary(&self) -> String {
        let mut line = format!(
            "processed {}, produced {}, skipped {}",
            self.processed, self.produced, self.skipped
        );
        if !self.notes.is_empty() {
            line.push_str(" (");
            line.push_str(&self.notes.join("; "));
            line.push(')');
        }
        line
    }
}

#[derive(Debug, Clone)]
pub struct BehaviorSettings {
    pub dispatch: DispatchSettings,
    pub traffic_factor: f64,
    pub weather_factor: f64,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            dispatch: DispatchSettings::default(),
            traffic_factor: crate::domains::dispatch::DEFAULT_TRAFFIC_FACTOR,
            weather_factor: crate::domains::dispatch::DEFAULT_WEATHER_FACTOR,
            cache_capacity: 256,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

/// The closed set of things an agent can do in one cycle.
pub enum AgentBehavior {
    Dispatch(DispatchCycle),
    Route(RouteCycle),
    Restock(RestockCycle),
    Pricing(PricingCycle),
    Forecasting(ForecastCycle),
    Universal { dispatch: DispatchCycle, route: RouteCycle },
}

impl AgentBehavior {
    pub fn for_kind(kind: AgentKind, settings: &BehaviorSettings) -> Self {
        match kind {
            AgentKind::Dispatch => AgentBehavior::Dispatch(DispatchCycle::new(settings)),
            AgentKind::Route => AgentBehavior::Route(RouteCycle::new(settings)),
            AgentKind::Restock => AgentBehavior::Restock(RestockCycle),
            AgentKind::Pricing => AgentBehavior::Pricing(PricingCycle),
            AgentKind::Forecasting => AgentBehavior::Forecasting(ForecastCycle),
            AgentKind::Universal => AgentBehavior::Universal {
                dispatch: DispatchCycle::new(settings),
                route: RouteCycle::new(settings),
            },
        }
    }

    pub fn kind(&self) -> AgentKind {
        match self {
            AgentBehavior::Dispatch(_) => AgentKind::Dispatch,
            AgentBehavior::Route(_) => AgentKind::Route,
            AgentBehavior::Restock(_) => AgentKind::Restock,
            AgentBehavior::Pricing(_) => AgentKind::Pricing,
            AgentBehavior::Forecasting(_) => AgentKind::Forecasting,
            AgentBehavior::Universal { .. } => AgentKind::Universal,
        }
    }

    pub fn dispatcher(&self) -> Option<&DispatchCycle> {
        match self {
            AgentBehavior::Dispatch(d) | AgentBehavior::Universal { dispatch: d, .. } => Some(d),
            _ => None,
        }
    }

    pub fn router(&self) -> Option<&crate::domains::dispatch::RouteBuilder> {
        match self {
            AgentBehavior::Dispatch(d) => Some(d.route_builder()),
            AgentBehavior::Route(r) | AgentBehavior::Universal { route: r, .. } => Some(r.route_builder()),
            _ => None,
        }
    }

    pub async fn run_cycle(&self, ctx: &CycleContext) -> DomainResult<CycleReport> {
        match self {
            AgentBehavior::Dispatch(cycle) => cycle.run(ctx).await,
            AgentBehavior::Route(cycle) => cycle.run(ctx).await,
            AgentBehavior::Restock(cycle) => cycle.run(ctx).await,
            AgentBehavior::Pricing(cycle) => cycle.run(ctx).await,
            AgentBehavior::Forecasting(cycle) => cycle.run(ctx).await,
            AgentBehavior::Universal { dispatch, route } => {
                let planned = dispatch.run(ctx).await?;
                let routed = route.run(ctx).await?;
                Ok(planned.merge(routed))
            }
        }
    }
}
