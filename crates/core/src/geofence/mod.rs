//! Spatial matching of a coordinate against the circles of a story.

mod warmup;

pub use warmup::{Fix, LocationTracker};

use tracing::debug;

use crate::{Circle, Coordinate, Spot, SpotId};

/// Mean radius of the earth in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates, in kilometers.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();
    let sin_lat = (d_lat / 2.0).sin();
    let sin_lng = (d_lng / 2.0).sin();
    let h = sin_lat.powi(2)
        + sin_lng.powi(2) * a.latitude.to_radians().cos() * b.latitude.to_radians().cos();
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Whether `coordinate` lies strictly inside `circle` drawn around `center`.
pub fn contains(center: Coordinate, circle: &Circle, coordinate: Coordinate) -> bool {
    let distance = haversine_km(coordinate, center);
    let radius_km = f64::from(circle.radius()) / 1000.0;
    debug!(
        title = circle.title().unwrap_or_default(),
        radius_km, distance, "distance to circle"
    );
    distance < radius_km
}

/// Picks the single circle triggered at `coordinate`.
///
/// Every spot is scanned, but only up to its first containing circle since
/// circles are sorted by radius. Across spots the smallest radius wins; on a
/// tie the spot that comes first keeps the match.
pub fn find_triggered(spots: &[Spot], coordinate: Coordinate) -> Option<&Circle> {
    let mut best: Option<&Circle> = None;
    for spot in spots {
        let candidate = spot
            .circles()
            .iter()
            .find(|circle| contains(spot.coordinate(), circle, coordinate));

        if let Some(circle) = candidate {
            if best.map_or(true, |current| circle.radius() < current.radius()) {
                best = Some(circle);
            }
        }
    }

    match best {
        Some(circle) => debug!(
            title = circle.title().unwrap_or_default(),
            radius = circle.radius(),
            "picked circle"
        ),
        None => debug!("picked: none"),
    }
    best
}

/// Closest spot centre to `coordinate`, skipping spots for which `exclude`
/// returns true.
pub fn nearest_spot<F>(spots: &[Spot], coordinate: Coordinate, exclude: F) -> Option<(SpotId, &Spot)>
where
    F: Fn(SpotId) -> bool,
{
    spots
        .iter()
        .enumerate()
        .map(|(index, spot)| (SpotId(index), spot))
        .filter(|(id, _)| !exclude(*id))
        .map(|(id, spot)| (id, spot, haversine_km(spot.coordinate(), coordinate)))
        .fold(None, |nearest: Option<(SpotId, &Spot, f64)>, (id, spot, distance)| {
            match nearest {
                Some((_, _, best)) if best <= distance => nearest,
                _ => Some((id, spot, distance)),
            }
        })
        .map(|(id, spot, _)| (id, spot))
}
