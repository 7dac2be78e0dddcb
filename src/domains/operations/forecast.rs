use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandObservation {
    pub zone: String,
    pub date: NaiveDate,
    pub orders: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandForecast {
    pub zone: String,
    pub forecast_date: NaiveDate,
    pub expected_orders: f64,
    pub sample_days: usize,
}

pub const SMOOTHING_ALPHA: f64 = 0.3;

/// Next-day forecast per zone by simple exponential smoothing over the
/// observed daily counts. Zones come back in name order.
pub fn forecast_next_day(history: &[DemandObservation]) -> Vec<DemandForecast> {
    let mut by_zone: BTreeMap<&str, Vec<&DemandObservation>> = BTreeMap::new();
    for obs in history {
        by_zone.entry(obs.zone.as_str()).or_default().push(obs);
    }

    by_zone
        .into_iter()
        .filter_map(|(zone, mut series)| {
            series.sort_by_key(|o| o.date);
            let first = series.first()?;
            let last_date = series.last()?.date;

            let level = series
                .iter()
                .skip(1)
                .fold(f64::from(first.orders), |level, obs| {
                    SMOOTHING_ALPHA * f64::from(obs.orders) + (1.0 - SMOOTHING_ALPHA) * level
                });

            Some(DemandForecast {
                zone: zone.to_string(),
                forecast_date: last_date + Duration::days(1),
                expected_orders: level,
                sample_days: series.len(),
            })
        })
        .collect()
}
