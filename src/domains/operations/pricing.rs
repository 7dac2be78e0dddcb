use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSignal {
    pub product_id: String,
    pub base_price: f64,
    pub current_price: f64,
    pub demand_units: f64,
    pub supply_units: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAdjustment {
    pub product_id: String,
    pub old_price: f64,
    pub new_price: f64,
    pub reasoning: String,
}

const ELASTICITY: f64 = 0.25;
const MIN_MULTIPLIER: f64 = 0.8;
const MAX_MULTIPLIER: f64 = 1.5;
const MIN_RELATIVE_CHANGE: f64 = 0.01;

pub fn target_price(signal: &PricingSignal) -> f64 {
    let ratio = if signal.supply_units > 0.0 {
        signal.demand_units / signal.supply_units
    } else {
        MAX_MULTIPLIER
    };
    let multiplier = (1.0 + ELASTICITY * (ratio - 1.0)).clamp(MIN_MULTIPLIER, MAX_MULTIPLIER);
    (signal.base_price * multiplier * 100.0).round() / 100.0
}

/// Adjustments for products whose target moved more than 1% off the current price.
pub fn plan_price_adjustments(signals: &[PricingSignal]) -> Vec<PriceAdjustment> {
    signals
        .iter()
        .filter(|s| s.base_price > 0.0 && s.current_price > 0.0)
        .filter_map(|signal| {
            let new_price = target_price(signal);
            let change = (new_price - signal.current_price).abs() / signal.current_price;
            (change > MIN_RELATIVE_CHANGE).then(|| PriceAdjustment {
                product_id: signal.product_id.clone(),
                old_price: signal.current_price,
                new_price,
                reasoning: format!(
                    "demand {:.0} vs supply {:.0} units",
                    signal.demand_units, signal.supply_units
                ),
            })
        })
        .collect()
}
