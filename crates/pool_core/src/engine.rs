//! The pooling engine: request lifecycle API and the matching cycle.
//!
//! One `PoolEngine` fronts the stores for the ingress layer (submit,
//! cancel, status polling, trip progression) and runs the lock-guarded
//! matching cycle for the coordinator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use h3o::{CellIndex, Resolution};
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::entities::{Ride, RideId, RideStatus};
use crate::error::{Error, Result};
use crate::lock::LockProvider;
use crate::matching::greedy::{match_cell, CycleContext};
use crate::pricing::{compute_surge, PricingEngine};
use crate::spatial::{cell_for, resolution_from_u8};
use crate::stores::{GroupStore, NewRide, RideStore, VehicleDirectory};

/// Lock scope for the matching cycle: one grouping pass system-wide.
/// Could be narrowed to per-cell scopes for parallelism.
pub const MATCHING_LOCK_SCOPE: &str = "matching_engine";

pub struct PoolEngine {
    rides: Arc<dyn RideStore>,
    groups: Arc<dyn GroupStore>,
    vehicles: Arc<dyn VehicleDirectory>,
    lock: Arc<dyn LockProvider>,
    pricing: PricingEngine,
    resolution: Resolution,
    config: PoolConfig,
}

impl PoolEngine {
    pub fn new(
        rides: Arc<dyn RideStore>,
        groups: Arc<dyn GroupStore>,
        vehicles: Arc<dyn VehicleDirectory>,
        lock: Arc<dyn LockProvider>,
        config: PoolConfig,
    ) -> Result<Self> {
        let resolution = resolution_from_u8(config.h3_resolution)?;
        Ok(Self {
            rides,
            groups,
            vehicles,
            lock,
            pricing: PricingEngine::new(config.base_fare, config.rate_per_km),
            resolution,
            config,
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Submit a ride request. Returns the created `Pending` ride, or the
    /// previously created ride when the idempotency key was seen before.
    pub async fn submit(&self, new: NewRide) -> Result<Ride> {
        if !new.pickup.is_valid() {
            return Err(Error::InvalidLocation {
                lat: new.pickup.lat,
                lng: new.pickup.lng,
            });
        }
        if !new.dropoff.is_valid() {
            return Err(Error::InvalidLocation {
                lat: new.dropoff.lat,
                lng: new.dropoff.lng,
            });
        }
        if new.seats == 0 || new.seats > 6 {
            return Err(Error::InvalidRequest(format!(
                "seats must be 1..=6, got {}",
                new.seats
            )));
        }
        if new.luggage > 10 {
            return Err(Error::InvalidRequest(format!(
                "luggage must be 0..=10, got {}",
                new.luggage
            )));
        }
        let ride = self.rides.create(new).await;
        debug!(ride = %ride.id, "ride submitted");
        Ok(ride)
    }

    /// Current snapshot of a ride (status, price, group) for polling.
    pub async fn ride(&self, id: RideId) -> Result<Ride> {
        self.rides.get(id).await.ok_or(Error::RideNotFound(id))
    }

    /// Cancel a ride. Legal from `Pending`, `Matched`, and `OnTrip`;
    /// anything else is a conflict. A grouped ride's seat and luggage
    /// share is released through the capacity guard, and the vehicle is
    /// freed when the group drains empty.
    pub async fn cancel(&self, id: RideId) -> Result<Ride> {
        // The transition commits first: of two racing cancels only one
        // passes, so the occupancy release runs exactly once.
        let cancelled = self
            .rides
            .apply_transition(id, RideStatus::Cancelled)
            .await?;

        if let Some(group_id) = cancelled.group_id {
            let group = self
                .groups
                .release_occupancy(group_id, cancelled.seats, cancelled.luggage)
                .await?;
            self.rides.clear_group(id).await?;
            let closed = if group.seats_occupied == 0 {
                self.groups.close_if_empty(group_id).await?
            } else {
                // Completed members keep their seats counted, so a drained
                // group can still show occupancy. When no active member
                // remains the group is done either way.
                let members = self.rides.rides_in_group(group_id).await;
                if members.iter().all(|m| m.status.is_terminal()) {
                    self.groups.close(group_id).await?;
                    true
                } else {
                    false
                }
            };
            if closed {
                self.vehicles.mark_available(group.vehicle_id).await?;
                debug!(group = %group_id, vehicle = %group.vehicle_id, "group done, vehicle freed");
            }
        }

        info!(ride = %id, "ride cancelled");
        self.rides.get(id).await.ok_or(Error::RideNotFound(id))
    }

    /// Start the trip for a matched ride (`Matched -> OnTrip`).
    pub async fn start_trip(&self, id: RideId) -> Result<Ride> {
        self.rides.apply_transition(id, RideStatus::OnTrip).await
    }

    /// Complete a ride (`OnTrip -> Completed`). When every member of the
    /// ride's group has reached a terminal state, the group closes and
    /// its vehicle becomes available again.
    pub async fn complete_trip(&self, id: RideId) -> Result<Ride> {
        let completed = self
            .rides
            .apply_transition(id, RideStatus::Completed)
            .await?;

        if let Some(group_id) = completed.group_id {
            let members = self.rides.rides_in_group(group_id).await;
            if members.iter().all(|m| m.status.is_terminal()) {
                let group = self
                    .groups
                    .get(group_id)
                    .await
                    .ok_or(Error::GroupNotFound(group_id))?;
                self.groups.close(group_id).await?;
                self.vehicles.mark_available(group.vehicle_id).await?;
                debug!(group = %group_id, "group completed, vehicle freed");
            }
        }

        Ok(completed)
    }

    /// Execute one matching cycle under the distributed lock.
    ///
    /// Lock contention is not an error: the cycle is skipped and retried
    /// on the next timer tick. Returns the number of rides matched.
    pub async fn run_matching_cycle(&self) -> Result<usize> {
        let ttl = Duration::from_secs(self.config.lock_ttl_secs);
        let Some(token) = self.lock.try_acquire(MATCHING_LOCK_SCOPE, ttl).await else {
            debug!("matching lock held by another worker, skipping cycle");
            return Ok(0);
        };

        let outcome = self.matching_pass().await;
        self.lock.release(MATCHING_LOCK_SCOPE, token).await;

        let matched = outcome?;
        if matched > 0 {
            info!(matched, "matching cycle complete");
        }
        Ok(matched)
    }

    /// One grouping pass: load pending rides, fix the surge for the
    /// cycle, bin by cell, run the greedy pass per cell.
    async fn matching_pass(&self) -> Result<usize> {
        let pending = self.rides.list_pending().await;
        if pending.is_empty() {
            return Ok(0);
        }

        let available = self.vehicles.count_available().await;
        let surge = compute_surge(pending.len(), available);

        let mut by_cell: HashMap<CellIndex, Vec<Ride>> = HashMap::new();
        for ride in pending {
            match cell_for(ride.pickup, self.resolution) {
                Ok(cell) => by_cell.entry(cell).or_default().push(ride),
                Err(err) => {
                    // Submission validates coordinates; an unbinnable ride
                    // here is data corruption, not a cycle failure.
                    warn!(ride = %ride.id, %err, "skipping unbinnable ride");
                }
            }
        }

        let ctx = CycleContext {
            rides: self.rides.as_ref(),
            groups: self.groups.as_ref(),
            vehicles: self.vehicles.as_ref(),
            pricing: &self.pricing,
            surge,
            tolerance: self.config.detour_tolerance,
        };

        let mut matched = 0;
        for (cell, rides_in_cell) in &by_cell {
            matched += match_cell(&ctx, *cell, rides_in_cell).await?;
        }
        Ok(matched)
    }
}
