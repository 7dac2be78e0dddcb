use super::types::{Assignment, Route};
use crate::common::DomainEvent;
use crate::domains::operations::{DemandForecast, PriceAdjustment, RestockRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcomes of agent cycles that are broadcast to downstream listeners.
/// The aggregate id is the agent that produced the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DispatchEvent {
    AssignmentCreated {
        agent_id: String,
        assignment: Assignment,
        timestamp: DateTime<Utc>,
    },
    OrderLeftPending {
        agent_id: String,
        order_id: String,
        timestamp: DateTime<Utc>,
    },
    RoutePlanned {
        agent_id: String,
        route: Route,
        timestamp: DateTime<Utc>,
    },
    RestockRequested {
        agent_id: String,
        request: RestockRequest,
        timestamp: DateTime<Utc>,
    },
    PriceAdjusted {
        agent_id: String,
        adjustment: PriceAdjustment,
        timestamp: DateTime<Utc>,
    },
    DemandForecasted {
        agent_id: String,
        forecast: DemandForecast,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent for DispatchEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DispatchEvent::AssignmentCreated { .. } => "AssignmentCreated",
            DispatchEvent::OrderLeftPending { .. } => "OrderLeftPending",
            DispatchEvent::RoutePlanned { .. } => "RoutePlanned",
            DispatchEvent::RestockRequested { .. } => "RestockRequested",
            DispatchEvent::PriceAdjusted { .. } => "PriceAdjusted",
            DispatchEvent::DemandForecasted { .. } => "DemandForecasted",
        }
    }

    fn aggregate_id(&self) -> &str {
        match self {
            DispatchEvent::AssignmentCreated { agent_id, .. }
            | DispatchEvent::OrderLeftPending { agent_id, .. }
            | DispatchEvent::RoutePlanned { agent_id, .. }
            | DispatchEvent::RestockRequested { agent_id, .. }
            | DispatchEvent::PriceAdjusted { agent_id, .. }
            | DispatchEvent::DemandForecasted { agent_id, .. } => agent_id,
        }
    }

    fn event_version(&self) -> u64 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DispatchEvent::AssignmentCreated { timestamp, .. }
            | DispatchEvent::OrderLeftPending { timestamp, .. }
            | DispatchEvent::RoutePlanned { timestamp, .. }
            | DispatchEvent::RestockRequested { timestamp, .. }
            | DispatchEvent::PriceAdjusted { timestamp, .. }
            | DispatchEvent::DemandForecasted { timestamp, .. } => *timestamp,
        }
    }
}
