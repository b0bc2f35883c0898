use geo::HaversineDistance;

use crate::model::GeoPoint;

const METERS_PER_MILE: f64 = 1_609.344;

pub fn distance_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    a.to_point().haversine_distance(&b.to_point()) / METERS_PER_MILE
}

pub fn matches(reference: GeoPoint, candidate: GeoPoint, radius_miles: f64) -> bool {
    distance_miles(reference, candidate) <= radius_miles
}
