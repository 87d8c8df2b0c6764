//! Spatial primitives: great-circle distance and H3 cell binning.
//!
//! Distances are haversine, not road-network; pooled legs are straight
//! hops between stops. Binning maps a coordinate to an H3 hexagon at a
//! fixed resolution so that nearby requests land in the same cell.
//! Resolution 7 (~5.16 km² per hexagon) suits an airport catchment.

use h3o::{CellIndex, LatLng, Resolution};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Great-circle distance in kilometers between two points.
///
/// Pure and symmetric; zero only when both points coincide.
pub fn haversine_km(a: Location, b: Location) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlng = (dlng * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlng * sin_dlng;
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Bin a coordinate into its H3 cell at the given resolution.
///
/// Deterministic: the same input always yields the same cell. Requests in
/// different cells are never grouped together.
pub fn cell_for(loc: Location, resolution: Resolution) -> Result<CellIndex> {
    if !loc.is_valid() {
        return Err(Error::InvalidLocation {
            lat: loc.lat,
            lng: loc.lng,
        });
    }
    let latlng = LatLng::new(loc.lat, loc.lng).map_err(|_| Error::InvalidLocation {
        lat: loc.lat,
        lng: loc.lng,
    })?;
    Ok(latlng.to_cell(resolution))
}

/// Parse a numeric H3 resolution from configuration.
pub fn resolution_from_u8(value: u8) -> Result<Resolution> {
    Resolution::try_from(value).map_err(|_| Error::InvalidResolution(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        let p = Location::new(19.0, 72.0);
        assert_eq!(haversine_km(p, p), 0.0);
    }

    #[test]
    fn known_distance() {
        // Mumbai airport -> Andheri, roughly 3.6 km.
        let airport = Location::new(19.0896, 72.8656);
        let andheri = Location::new(19.1176, 72.8490);
        let d = haversine_km(airport, andheri);
        assert!(d > 3.0 && d < 5.0, "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Location::new(19.0, 72.0);
        let b = Location::new(20.0, 73.0);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn nearby_points_share_a_cell() {
        // Two points ~100m apart fall into the same res-7 hexagon.
        let res = resolution_from_u8(7).expect("resolution");
        let c1 = cell_for(Location::new(19.0896, 72.8656), res).expect("cell");
        let c2 = cell_for(Location::new(19.0897, 72.8657), res).expect("cell");
        assert_eq!(c1, c2);
    }

    #[test]
    fn distant_points_differ() {
        let res = resolution_from_u8(7).expect("resolution");
        let mumbai = cell_for(Location::new(19.0896, 72.8656), res).expect("cell");
        let delhi = cell_for(Location::new(28.6139, 77.2090), res).expect("cell");
        assert_ne!(mumbai, delhi);
    }

    #[test]
    fn out_of_range_coordinates_rejected() {
        let res = resolution_from_u8(7).expect("resolution");
        assert!(cell_for(Location::new(91.0, 0.0), res).is_err());
    }
}
