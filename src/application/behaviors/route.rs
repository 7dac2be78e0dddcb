use super::{BehaviorSettings, CycleContext, CycleReport};
use crate::common::{BoundedCache, DomainResult};
use crate::domains::dispatch::{DispatchEvent, Route, RouteBuilder, VehicleManifest};
use tokio::sync::Mutex;

/// Rebuilds each vehicle's route from its committed deliveries. A route is
/// only persisted again when its inputs changed or its cache entry expired.
pub struct RouteCycle {
    routes: RouteBuilder,
    cache: Mutex<BoundedCache<String, Route>>,
}

impl RouteCycle {
    pub fn new(settings: &BehaviorSettings) -> Self {
        Self {
            routes: RouteBuilder::new(settings.traffic_factor, settings.weather_factor),
            cache: Mutex::new(BoundedCache::new(settings.cache_capacity, settings.cache_ttl)),
        }
    }

    pub fn route_builder(&self) -> &RouteBuilder {
        &self.routes
    }

    pub async fn run(&self, ctx: &CycleContext) -> DomainResult<CycleReport> {
        let manifests = ctx.store.get_vehicle_manifests().await?;
        let mut report = CycleReport {
            processed: manifests.len(),
            ..CycleReport::default()
        };

        for manifest in &manifests {
            let key = manifest_key(manifest);
            if self.cache.lock().await.get(&key).is_some() {
                report.skipped += 1;
                continue;
            }

            let route = match self.routes.build_route(&manifest.vehicle, &manifest.deliveries) {
                Ok(route) => route,
                Err(e) => {
                    report.skipped += 1;
                    ctx.logger.warn(&format!("Route not built: {}", e));
                    continue;
                }
            };

            ctx.store.persist_route(&route).await?;
            self.cache.lock().await.insert(key, route.clone());
            report.produced += 1;
            ctx.publish(
                &DispatchEvent::RoutePlanned {
                    agent_id: ctx.agent_id.clone(),
                    route,
                    timestamp: ctx.clock.now(),
                },
                "Route",
            );
        }

        Ok(report)
    }
}

fn manifest_key(manifest: &VehicleManifest) -> String {
    let at = manifest
        .vehicle
        .location
        .map(|l| format!("{:.5},{:.5}", l.latitude, l.longitude))
        .unwrap_or_default();
    let stops: Vec<&str> = manifest.deliveries.iter().map(|o| o.id.as_str()).collect();
    format!("{}@{}|{}", manifest.vehicle.id, at, stops.join(","))
}
