use super::{CycleContext, CycleReport};
use crate::common::DomainResult;
use crate::domains::dispatch::DispatchEvent;
use crate::domains::operations::{forecast_next_day, plan_price_adjustments, plan_restock};

pub struct RestockCycle;

impl RestockCycle {
    pub async fn run(&self, ctx: &CycleContext) -> DomainResult<CycleReport> {
        let levels = ctx.store.get_inventory_levels().await?;
        let requests = plan_restock(&levels);

        for request in &requests {
            ctx.store.persist_restock_request(request).await?;
            ctx.publish(
                &DispatchEvent::RestockRequested {
                    agent_id: ctx.agent_id.clone(),
                    request: request.clone(),
                    timestamp: ctx.clock.now(),
                },
                "Restock",
            );
        }

        Ok(CycleReport {
            processed: levels.len(),
            produced: requests.len(),
            ..CycleReport::default()
        })
    }
}

pub struct PricingCycle;

impl PricingCycle {
    pub async fn run(&self, ctx: &CycleContext) -> DomainResult<CycleReport> {
        let signals = ctx.store.get_pricing_signals().await?;
        let adjustments = plan_price_adjustments(&signals);

        for adjustment in &adjustments {
            ctx.store.persist_price_adjustment(adjustment).await?;
            ctx.publish(
                &DispatchEvent::PriceAdjusted {
                    agent_id: ctx.agent_id.clone(),
                    adjustment: adjustment.clone(),
                    timestamp: ctx.clock.now(),
                },
                "Pricing",
            );
        }

        Ok(CycleReport {
            processed: signals.len(),
            produced: adjustments.len(),
            skipped: signals.len() - adjustments.len(),
            ..CycleReport::default()
        })
    }
}

pub struct ForecastCycle;

impl ForecastCycle {
    pub async fn run(&self, ctx: &CycleContext) -> DomainResult<CycleReport> {
        let history = ctx.store.get_demand_history().await?;
        let forecasts = forecast_next_day(&history);

        for forecast in &forecasts {
            ctx.store.persist_forecast(forecast).await?;
            ctx.publish(
                &DispatchEvent::DemandForecasted {
                    agent_id: ctx.agent_id.clone(),
                    forecast: forecast.clone(),
                    timestamp: ctx.clock.now(),
                },
                "Forecasting",
            );
        }

        Ok(CycleReport {
            processed: history.len(),
            produced: forecasts.len(),
            ..CycleReport::default()
        })
    }
}
