use super::types::Location;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres. Degenerate input (non-finite or
/// out-of-range coordinates) yields `0.0` rather than an error.
pub fn haversine_km(a: &Location, b: &Location) -> f64 {
    if !a.is_valid() || !b.is_valid() {
        return 0.0;
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

/// Summed leg distances along an ordered path.
pub fn path_length_km(points: &[Location]) -> f64 {
    points.windows(2).map(|leg| haversine_km(&leg[0], &leg[1])).sum()
}
