use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Pending delivery request as read from the store. Priority 1 is the most urgent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub weight_kg: f64,
    pub priority: u8,
    pub pickup_location: Option<Location>,
    pub delivery_location: Option<Location>,
    pub requested_delivery_time: Option<DateTime<Utc>>,
}

impl Order {
    pub fn pickup(&self) -> Option<Location> {
        self.pickup_location.filter(Location::is_valid)
    }

    pub fn dropoff(&self) -> Option<Location> {
        self.delivery_location.filter(Location::is_valid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub capacity_kg: f64,
    pub current_load_kg: f64,
    pub location: Option<Location>,
    pub avg_speed_kmh: f64,
    pub total_deliveries: u32,
}

impl Vehicle {
    pub fn available_capacity_kg(&self) -> f64 {
        (self.capacity_kg - self.current_load_kg).max(0.0)
    }

    pub fn position(&self) -> Option<Location> {
        self.location.filter(Location::is_valid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub order_id: String,
    pub vehicle_id: String,
    pub score: f64,
    pub estimated_pickup_time: DateTime<Utc>,
    pub estimated_delivery_time: DateTime<Utc>,
    pub reasoning: String,
}

/// Result of one planning call. Orders no vehicle could take stay pending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchPlan {
    pub assignments: Vec<Assignment>,
    pub unassigned: Vec<String>,
}

impl DispatchPlan {
    pub fn assignment_for(&self, order_id: &str) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.order_id == order_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub vehicle_id: String,
    pub waypoints: Vec<Location>,
    pub estimated_distance_km: f64,
    pub estimated_duration_min: f64,
    pub optimization_score: f64,
    pub traffic_factor: f64,
    pub weather_factor: f64,
}

impl Route {
    /// Waypoints as a GeoJSON `LineString` feature (lng/lat order).
    pub fn to_geojson(&self) -> geojson::Feature {
        let line: Vec<Vec<f64>> = self
            .waypoints
            .iter()
            .map(|p| vec![p.longitude, p.latitude])
            .collect();

        let mut properties = geojson::JsonObject::new();
        properties.insert("vehicle_id".to_string(), self.vehicle_id.clone().into());
        properties.insert("distance_km".to_string(), self.estimated_distance_km.into());
        properties.insert("duration_min".to_string(), self.estimated_duration_min.into());
        properties.insert("score".to_string(), self.optimization_score.into());

        geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::LineString(line))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Deliveries already committed to a vehicle, in assignment order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleManifest {
    pub vehicle: Vehicle,
    pub deliveries: Vec<Order>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_capacity_never_negative() {
        let v = Vehicle {
            id: "v-1".into(),
            capacity_kg: 10.0,
            current_load_kg: 12.5,
            location: None,
            avg_speed_kmh: 40.0,
            total_deliveries: 0,
        };
        assert_eq!(v.available_capacity_kg(), 0.0);
    }

    #[test]
    fn out_of_range_locations_are_invalid() {
        assert!(Location::new(52.5, 13.4).is_valid());
        assert!(!Location::new(91.0, 0.0).is_valid());
        assert!(!Location::new(0.0, f64::NAN).is_valid());
    }

    #[test]
    fn geojson_uses_lng_lat_order() {
        let route = Route {
            vehicle_id: "v-1".into(),
            waypoints: vec![Location::new(1.0, 2.0), Location::new(3.0, 4.0)],
            estimated_distance_km: 0.0,
            estimated_duration_min: 0.0,
            optimization_score: 0.0,
            traffic_factor: 1.2,
            weather_factor: 1.0,
        };
        let feature = route.to_geojson();
        match feature.geometry.map(|g| g.value) {
            Some(geojson::Value::LineString(points)) => {
                assert_eq!(points[0], vec![2.0, 1.0]);
                assert_eq!(points[1], vec![4.0, 3.0]);
            }
            other => panic!("expected LineString, got {:?}", other),
        }
    }
}
