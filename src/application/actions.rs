use super::behaviors::CycleReport;
use crate::common::{DomainError, DomainResult};
use crate::domains::dispatch::{DispatchPlan, Order, Route, Vehicle};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewDispatchParams {
    pub orders: Vec<Order>,
    pub vehicles: Vec<Vehicle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRouteParams {
    pub vehicle: Vehicle,
    #[serde(default)]
    pub deliveries: Vec<Order>,
    pub traffic_factor: Option<f64>,
    pub weather_factor: Option<f64>,
}

/// One-off requests an operator can send to an agent outside its schedule.
#[derive(Debug, Clone)]
pub enum AgentAction {
    /// Run the agent's regular cycle now.
    RunCycle,
    /// Plan the given snapshot without persisting anything.
    PreviewDispatch(PreviewDispatchParams),
    BuildRoute(BuildRouteParams),
}

impl AgentAction {
    /// Parse the `(action, params)` pair an HTTP or CLI layer receives.
    pub fn parse(action: &str, params: serde_json::Value) -> DomainResult<Self> {
        match action {
            "run_cycle" | "run" => Ok(AgentAction::RunCycle),
            "preview_dispatch" | "dispatch" => Ok(AgentAction::PreviewDispatch(serde_json::from_value(params)?)),
            "build_route" | "route" => Ok(AgentAction::BuildRoute(serde_json::from_value(params)?)),
            other => Err(DomainError::InvalidCommand {
                reason: format!("Unknown action '{}'", other),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AgentAction::RunCycle => "run_cycle",
            AgentAction::PreviewDispatch(_) => "preview_dispatch",
            AgentAction::BuildRoute(_) => "build_route",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    CycleRan { report: CycleReport },
    Plan { plan: DispatchPlan },
    Route { route: Route },
}
