pub mod distance;
pub mod locator;

pub use distance::{Coordinates, Geofence, haversine_distance, round_distance};
pub use locator::{LocationError, LocationReport, PendingFix, PositionOptions};
