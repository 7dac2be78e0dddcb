use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub product_id: String,
    pub warehouse_id: String,
    pub quantity: u32,
    pub reorder_point: u32,
    pub reorder_quantity: u32,
    /// Average units shipped per day; zero when unknown.
    pub daily_demand: f64,
}

impl InventoryLevel {
    pub fn days_of_cover(&self) -> Option<f64> {
        (self.daily_demand > 0.0).then(|| f64::from(self.quantity) / self.daily_demand)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RestockUrgency {
    Critical,
    High,
    Normal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestockRequest {
    pub product_id: String,
    pub warehouse_id: String,
    pub quantity: u32,
    pub urgency: RestockUrgency,
    pub reasoning: String,
}

const HIGH_URGENCY_DAYS: f64 = 2.0;

/// Reorder every stock line at or below its reorder point, most urgent first.
pub fn plan_restock(levels: &[InventoryLevel]) -> Vec<RestockRequest> {
    let mut requests: Vec<RestockRequest> = levels
        .iter()
        .filter(|l| l.quantity <= l.reorder_point)
        .map(|level| {
            let urgency = if level.quantity == 0 {
                RestockUrgency::Critical
            } else if level.days_of_cover().is_some_and(|d| d < HIGH_URGENCY_DAYS) {
                RestockUrgency::High
            } else {
                RestockUrgency::Normal
            };
            // top up to at least twice the reorder point
            let shortfall = (level.reorder_point * 2).saturating_sub(level.quantity);
            let quantity = level.reorder_quantity.max(shortfall);

            RestockRequest {
                product_id: level.product_id.clone(),
                warehouse_id: level.warehouse_id.clone(),
                quantity,
                urgency,
                reasoning: format!(
                    "{} units on hand against reorder point {}",
                    level.quantity, level.reorder_point
                ),
            }
        })
        .collect();

    requests.sort_by_key(|r| r.urgency);
    requests
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(product: &str, quantity: u32, reorder_point: u32, daily: f64) -> InventoryLevel {
        InventoryLevel {
            product_id: product.into(),
            warehouse_id: "wh-1".into(),
            quantity,
            reorder_point,
            reorder_quantity: 10,
            daily_demand: daily,
        }
    }

    #[test]
    fn only_lines_at_or_below_reorder_point_are_requested() {
        let requests = plan_restock(&[level("a", 50, 20, 5.0), level("b", 20, 20, 1.0)]);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].product_id, "b");
        assert_eq!(requests[0].urgency, RestockUrgency::Normal);
        assert_eq!(requests[0].quantity, 20);
    }

    #[test]
    fn empty_shelves_come_first() {
        let requests = plan_restock(&[level("low", 3, 10, 4.0), level("out", 0, 10, 4.0)]);
        assert_eq!(requests[0].product_id, "out");
        assert_eq!(requests[0].urgency, RestockUrgency::Critical);
        assert_eq!(requests[1].urgency, RestockUrgency::High);
    }
}
