pub mod agent;
pub mod dispatch;
pub mod logger;
pub mod operations;

pub use agent::{AgentEvent, AgentKind, AgentRecord, AgentStatus, AgentStatusReport, FleetOverview};
pub use dispatch::{
    Assignment, DispatchEngine, DispatchEvent, DispatchPlan, Location, Notifier, Order, Route, RouteBuilder, Store,
    Vehicle,
};
pub use logger::{DomainLogger, DynLogger, ScopedLogger};
pub use operations::{DemandForecast, InventoryLevel, PriceAdjustment, PricingSignal, RestockRequest};
