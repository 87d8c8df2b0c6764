//! Greedy per-cell grouping pass.
//!
//! Rides are processed strictly in arrival order; candidate groups are
//! scanned in creation order. A ride joins the first group that passes
//! the seat, luggage, and detour predicates; otherwise a new group opens
//! with the first available vehicle. Earlier placements are never
//! revisited.
//!
//! Admission is committed per ride: the guarded occupancy increment and
//! the `Pending -> Matched` transition form one unit. If the ride was
//! cancelled between load and commit, the increment is rolled back and
//! the pass moves on.

use h3o::CellIndex;
use tracing::{debug, warn};

use crate::entities::{GroupId, Ride};
use crate::error::{Error, Result};
use crate::pricing::PricingEngine;
use crate::spatial::{haversine_km, Location};
use crate::stores::{GroupStore, RideStore, VehicleDirectory};

use super::detour::detour_ok;

/// Everything one matching cycle needs, captured once at cycle start.
pub struct CycleContext<'a> {
    pub rides: &'a dyn RideStore,
    pub groups: &'a dyn GroupStore,
    pub vehicles: &'a dyn VehicleDirectory,
    pub pricing: &'a PricingEngine,
    /// Surge multiplier for this cycle, fixed across all rides in it.
    pub surge: f64,
    pub tolerance: f64,
}

/// Working copy of one candidate group for the duration of a cell pass.
struct GroupWorking {
    id: GroupId,
    max_seats: u32,
    max_luggage: u32,
    pickups: Vec<Location>,
    dropoffs: Vec<Location>,
}

/// Run the greedy pass for one cell. `pending` must be in arrival order.
/// Returns the number of rides matched.
pub async fn match_cell(
    ctx: &CycleContext<'_>,
    cell: CellIndex,
    pending: &[Ride],
) -> Result<usize> {
    let mut working = load_working_set(ctx, cell).await?;

    let mut matched = 0;
    'rides: for ride in pending {
        let direct_km = haversine_km(ride.pickup, ride.dropoff);

        for group in working.iter_mut() {
            if !detour_ok(
                &group.pickups,
                &group.dropoffs,
                ride.pickup,
                ride.dropoff,
                ctx.tolerance,
            ) {
                continue;
            }
            // Authoritative capacity check: guarded check-and-increment.
            // A false here means the counters moved under us (or the group
            // closed); fall through to the next candidate.
            if !ctx
                .groups
                .try_occupy(
                    group.id,
                    ride.seats,
                    ride.luggage,
                    group.max_seats,
                    group.max_luggage,
                )
                .await?
            {
                continue;
            }

            let join_order = group.pickups.len() + 1;
            if commit(ctx, ride, group.id, join_order, direct_km).await? {
                group.pickups.push(ride.pickup);
                group.dropoffs.push(ride.dropoff);
                matched += 1;
            }
            continue 'rides;
        }

        // No open group admits this ride: open a new one.
        let Some(vehicle) = ctx.vehicles.next_available().await else {
            debug!(ride = %ride.id, "no vehicle available, ride stays pending");
            continue;
        };
        if vehicle.max_seats < ride.seats || vehicle.max_luggage < ride.luggage {
            warn!(
                ride = %ride.id,
                vehicle = %vehicle.id,
                "ride exceeds empty-vehicle capacity, left pending"
            );
            continue;
        }

        ctx.vehicles.mark_unavailable(vehicle.id).await?;
        let group = ctx.groups.create(vehicle.id, cell).await;
        if !ctx
            .groups
            .try_occupy(
                group.id,
                ride.seats,
                ride.luggage,
                vehicle.max_seats,
                vehicle.max_luggage,
            )
            .await?
        {
            // Freshly created group refused the seed ride; undo the claim.
            ctx.groups.close(group.id).await?;
            ctx.vehicles.mark_available(vehicle.id).await?;
            continue;
        }

        if commit(ctx, ride, group.id, 1, direct_km).await? {
            working.push(GroupWorking {
                id: group.id,
                max_seats: vehicle.max_seats,
                max_luggage: vehicle.max_luggage,
                pickups: vec![ride.pickup],
                dropoffs: vec![ride.dropoff],
            });
            matched += 1;
        } else {
            // Seed ride vanished (cancelled); release the empty group.
            if ctx.groups.close_if_empty(group.id).await? {
                ctx.vehicles.mark_available(vehicle.id).await?;
            }
        }
    }

    Ok(matched)
}

/// Snapshot open groups in this cell with their members' stops, in group
/// creation order.
async fn load_working_set(ctx: &CycleContext<'_>, cell: CellIndex) -> Result<Vec<GroupWorking>> {
    let mut working = Vec::new();
    for group in ctx.groups.list_open(cell).await {
        let vehicle = ctx
            .vehicles
            .get(group.vehicle_id)
            .await
            .ok_or(Error::VehicleNotFound(group.vehicle_id))?;
        let members = ctx.rides.rides_in_group(group.id).await;
        let mut pickups = Vec::with_capacity(members.len());
        let mut dropoffs = Vec::with_capacity(members.len());
        for member in members.iter().filter(|m| !m.status.is_terminal()) {
            pickups.push(member.pickup);
            dropoffs.push(member.dropoff);
        }
        working.push(GroupWorking {
            id: group.id,
            max_seats: vehicle.max_seats,
            max_luggage: vehicle.max_luggage,
            pickups,
            dropoffs,
        });
    }
    Ok(working)
}

/// Price the ride and commit the match. Returns `false` (after rolling
/// back the occupancy increment) when the ride left `Pending` since the
/// cycle loaded it.
async fn commit(
    ctx: &CycleContext<'_>,
    ride: &Ride,
    group: GroupId,
    join_order: usize,
    direct_km: f64,
) -> Result<bool> {
    let price = ctx.pricing.quote(direct_km, join_order, ctx.surge);
    match ctx.rides.commit_match(ride.id, group, price).await {
        Ok(_) => {
            debug!(
                ride = %ride.id,
                group = %group,
                join_order,
                price,
                "ride matched"
            );
            Ok(true)
        }
        Err(Error::InvalidTransition { .. }) => {
            ctx.groups
                .release_occupancy(group, ride.seats, ride.luggage)
                .await?;
            debug!(ride = %ride.id, "ride left pending mid-cycle, rolled back");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PricingEngine;
    use crate::spatial::{cell_for, resolution_from_u8, Location};
    use crate::stores::{MemoryGroupStore, MemoryRideStore, MemoryVehicleDirectory, NewRide};

    fn new_ride(pickup: Location, dropoff: Location, seats: u32) -> NewRide {
        NewRide {
            rider_id: 1,
            pickup,
            dropoff,
            seats,
            luggage: 0,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn three_compatible_rides_share_one_group() {
        let rides = MemoryRideStore::new();
        let groups = MemoryGroupStore::new();
        let vehicles = MemoryVehicleDirectory::new();
        vehicles.add(3, 3, Location::new(19.09, 72.86));

        let pickup = Location::new(19.0896, 72.8656);
        let dropoff = Location::new(19.1176, 72.8490);
        let mut pending = Vec::new();
        for i in 0..3 {
            let jitter = i as f64 * 0.0005;
            pending.push(
                rides
                    .create(new_ride(
                        Location::new(pickup.lat + jitter, pickup.lng + jitter),
                        Location::new(dropoff.lat + jitter, dropoff.lng + jitter),
                        1,
                    ))
                    .await,
            );
        }

        let pricing = PricingEngine::new(50.0, 15.0);
        let ctx = CycleContext {
            rides: &rides,
            groups: &groups,
            vehicles: &vehicles,
            pricing: &pricing,
            surge: 1.0,
            tolerance: 0.4,
        };
        let res = resolution_from_u8(7).expect("resolution");
        let cell = cell_for(pickup, res).expect("cell");

        let matched = match_cell(&ctx, cell, &pending).await.expect("cycle");
        assert_eq!(matched, 3);

        let first = rides.get(pending[0].id).await.expect("ride");
        let group_id = first.group_id.expect("grouped");
        for r in &pending {
            assert_eq!(rides.get(r.id).await.expect("ride").group_id, Some(group_id));
        }
        let group = groups.get(group_id).await.expect("group");
        assert_eq!(group.seats_occupied, 3);
    }

    #[tokio::test]
    async fn incompatible_detour_forces_second_group() {
        let rides = MemoryRideStore::new();
        let groups = MemoryGroupStore::new();
        let vehicles = MemoryVehicleDirectory::new();
        vehicles.add(4, 3, Location::new(19.09, 72.86));
        vehicles.add(4, 3, Location::new(19.09, 72.86));

        // Same pickup area, opposite destinations.
        let a = rides
            .create(new_ride(
                Location::new(19.0896, 72.8656),
                Location::new(19.2000, 72.9500),
                1,
            ))
            .await;
        let b = rides
            .create(new_ride(
                Location::new(19.0896, 72.8656),
                Location::new(18.9000, 72.7500),
                1,
            ))
            .await;

        let pricing = PricingEngine::new(50.0, 15.0);
        let ctx = CycleContext {
            rides: &rides,
            groups: &groups,
            vehicles: &vehicles,
            pricing: &pricing,
            surge: 1.0,
            tolerance: 0.4,
        };
        let res = resolution_from_u8(7).expect("resolution");
        let cell = cell_for(Location::new(19.0896, 72.8656), res).expect("cell");

        let matched = match_cell(&ctx, cell, &[a.clone(), b.clone()]).await.expect("cycle");
        assert_eq!(matched, 2);

        let a = rides.get(a.id).await.expect("ride");
        let b = rides.get(b.id).await.expect("ride");
        assert_ne!(a.group_id, b.group_id, "detour-incompatible rides must not pool");
    }

    #[tokio::test]
    async fn no_vehicle_leaves_ride_pending() {
        let rides = MemoryRideStore::new();
        let groups = MemoryGroupStore::new();
        let vehicles = MemoryVehicleDirectory::new();

        let ride = rides
            .create(new_ride(
                Location::new(19.0896, 72.8656),
                Location::new(19.1176, 72.8490),
                1,
            ))
            .await;

        let pricing = PricingEngine::new(50.0, 15.0);
        let ctx = CycleContext {
            rides: &rides,
            groups: &groups,
            vehicles: &vehicles,
            pricing: &pricing,
            surge: 3.0,
            tolerance: 0.4,
        };
        let res = resolution_from_u8(7).expect("resolution");
        let cell = cell_for(ride.pickup, res).expect("cell");

        let matched = match_cell(&ctx, cell, &[ride.clone()]).await.expect("cycle");
        assert_eq!(matched, 0);
        assert_eq!(
            rides.get(ride.id).await.expect("ride").status,
            crate::entities::RideStatus::Pending
        );
    }
}
