use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    #[schema(example = -6.533322)]
    pub latitude: f64,
    #[schema(example = 108.455498)]
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Great-circle distance in meters (haversine over a spherical earth).
pub fn haversine_distance(a: Coordinates, b: Coordinates) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Rounds a distance to one decimal, the precision records are stored with.
pub fn round_distance(meters: f64) -> f64 {
    (meters * 10.0).round() / 10.0
}

/// The reference point of the premises and the radius a check-in must fall in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geofence {
    pub reference: Coordinates,
    pub max_distance_meters: f64,
}

impl Geofence {
    pub fn new(reference: Coordinates, max_distance_meters: f64) -> Self {
        Self {
            reference,
            max_distance_meters,
        }
    }

    pub fn distance_from_reference(&self, position: Coordinates) -> f64 {
        haversine_distance(position, self.reference)
    }

    /// Inclusive: a distance equal to the radius is still valid.
    pub fn admits(&self, distance_meters: f64) -> bool {
        distance_meters <= self.max_distance_meters
    }
}
