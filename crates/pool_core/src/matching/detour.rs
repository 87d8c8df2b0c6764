//! Per-passenger detour model.
//!
//! The shared route is modeled as all pickups in join order followed by
//! all dropoffs in join order. For passenger `i`, the shared leg is the
//! sum of consecutive-hop distances from their pickup stop to their
//! dropoff stop along that sequence. This is a modeling simplification,
//! not a guarantee of a drivable route.

use crate::spatial::{haversine_km, Location};

/// Direct distances below this are treated as negligible and skipped by
/// the detour check.
pub const MIN_DIRECT_KM: f64 = 0.1;

/// Shared-route distance for passenger `idx` under the sequential stop
/// model. `pickups` and `dropoffs` are parallel, in join order.
pub fn shared_leg_km(pickups: &[Location], dropoffs: &[Location], idx: usize) -> f64 {
    let stops: Vec<Location> = pickups.iter().chain(dropoffs.iter()).copied().collect();
    let start = idx;
    let end = pickups.len() + idx;

    let mut total = 0.0;
    for hop in start..end {
        total += haversine_km(stops[hop], stops[hop + 1]);
    }
    total
}

/// Whether adding the candidate keeps *every* passenger's shared leg
/// within `(1 + tolerance) * direct_distance`, the candidate included.
pub fn detour_ok(
    existing_pickups: &[Location],
    existing_dropoffs: &[Location],
    new_pickup: Location,
    new_dropoff: Location,
    tolerance: f64,
) -> bool {
    let mut pickups = existing_pickups.to_vec();
    let mut dropoffs = existing_dropoffs.to_vec();
    pickups.push(new_pickup);
    dropoffs.push(new_dropoff);

    for i in 0..pickups.len() {
        let direct = haversine_km(pickups[i], dropoffs[i]);
        if direct < MIN_DIRECT_KM {
            continue;
        }
        if shared_leg_km(&pickups, &dropoffs, i) > (1.0 + tolerance) * direct {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::haversine_km;

    #[test]
    fn single_passenger_leg_equals_direct() {
        let pickups = [Location::new(19.09, 72.87)];
        let dropoffs = [Location::new(19.12, 72.85)];
        let leg = shared_leg_km(&pickups, &dropoffs, 0);
        let direct = haversine_km(pickups[0], dropoffs[0]);
        assert!((leg - direct).abs() < 0.01);
    }

    #[test]
    fn empty_group_always_admits() {
        assert!(detour_ok(
            &[],
            &[],
            Location::new(19.09, 72.87),
            Location::new(19.12, 72.85),
            0.4,
        ));
    }

    #[test]
    fn same_direction_accepted() {
        let pickups = [Location::new(19.0896, 72.8656)];
        let dropoffs = [Location::new(19.1176, 72.8490)];
        assert!(detour_ok(
            &pickups,
            &dropoffs,
            Location::new(19.0900, 72.8660),
            Location::new(19.1180, 72.8500),
            0.4,
        ));
    }

    #[test]
    fn opposite_direction_rejected() {
        let pickups = [Location::new(19.0896, 72.8656)];
        let dropoffs = [Location::new(19.2000, 72.9500)];
        assert!(!detour_ok(
            &pickups,
            &dropoffs,
            Location::new(19.0896, 72.8656),
            Location::new(18.9000, 72.7500),
            0.4,
        ));
    }

    #[test]
    fn negligible_direct_distance_is_skipped() {
        // Candidate pickup and dropoff nearly coincide; their own ratio
        // would explode but they must not veto the group.
        let pickups = [Location::new(19.0896, 72.8656)];
        let dropoffs = [Location::new(19.1176, 72.8490)];
        assert!(detour_ok(
            &pickups,
            &dropoffs,
            Location::new(19.1000, 72.8600),
            Location::new(19.1001, 72.8601),
            0.4,
        ));
    }
}
