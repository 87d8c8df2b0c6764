//! Storage capability traits.
//!
//! The engine depends on these narrow interfaces, never on a concrete
//! database. [`memory`] provides `DashMap`-backed implementations for
//! embedding and tests; a persistent backend implements the same traits.
//!
//! `GroupStore::try_occupy` / `release_occupancy` are the capacity guard:
//! each is an indivisible read-modify-write of one group's occupancy
//! counters, so concurrent joins (or a join racing a cancellation) can
//! never both pass the admission check and overshoot capacity together.
//! The group is the lock granularity, not the cell or the store.

pub mod memory;

use async_trait::async_trait;
use h3o::CellIndex;

use crate::entities::{Group, GroupId, Ride, RideId, RideStatus, Vehicle, VehicleId};
use crate::error::Result;
use crate::spatial::Location;

pub use memory::{MemoryGroupStore, MemoryRideStore, MemoryVehicleDirectory};

/// Parameters for submitting a new ride.
#[derive(Debug, Clone)]
pub struct NewRide {
    pub rider_id: u64,
    pub pickup: Location,
    pub dropoff: Location,
    pub seats: u32,
    pub luggage: u32,
    pub idempotency_key: Option<String>,
}

#[async_trait]
pub trait RideStore: Send + Sync {
    /// Create a ride in `Pending`. If the idempotency key already exists,
    /// the previously created ride is returned unchanged and no new row
    /// is created (exactly-once submission).
    async fn create(&self, new: NewRide) -> Ride;

    async fn get(&self, id: RideId) -> Option<Ride>;

    async fn find_by_idempotency_key(&self, key: &str) -> Option<Ride>;

    /// Pending rides in arrival (FIFO) order.
    async fn list_pending(&self) -> Vec<Ride>;

    async fn rides_in_group(&self, group: GroupId) -> Vec<Ride>;

    /// Commit a match: group assignment, price, and the
    /// `Pending -> Matched` transition as one atomic unit. Fails with a
    /// conflict if the ride left `Pending` in the meantime.
    async fn commit_match(&self, id: RideId, group: GroupId, price: f64) -> Result<Ride>;

    /// Apply a lifecycle transition, returning the updated ride.
    /// An illegal edge fails with a conflict and mutates nothing.
    async fn apply_transition(&self, id: RideId, next: RideStatus) -> Result<Ride>;

    /// Detach a ride from its group (on cancellation).
    async fn clear_group(&self, id: RideId) -> Result<()>;
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Open a new group for `vehicle` in `cell`, empty.
    async fn create(&self, vehicle: VehicleId, cell: CellIndex) -> Group;

    async fn get(&self, id: GroupId) -> Option<Group>;

    /// Open groups for a cell, in creation order.
    async fn list_open(&self, cell: CellIndex) -> Vec<Group>;

    /// Guarded check-and-increment of the group's occupancy counters.
    /// Returns `false` without mutating when the passenger does not fit
    /// or the group is no longer open.
    async fn try_occupy(
        &self,
        id: GroupId,
        seats: u32,
        luggage: u32,
        max_seats: u32,
        max_luggage: u32,
    ) -> Result<bool>;

    /// Guarded decrement (member cancellation), saturating at zero.
    /// Returns the updated group.
    async fn release_occupancy(&self, id: GroupId, seats: u32, luggage: u32) -> Result<Group>;

    /// Close the group iff its occupancy has drained to zero; returns
    /// whether it closed. Atomic with respect to `try_occupy`.
    async fn close_if_empty(&self, id: GroupId) -> Result<bool>;

    /// Close the group unconditionally (trip completed). Idempotent.
    async fn close(&self, id: GroupId) -> Result<()>;
}

#[async_trait]
pub trait VehicleDirectory: Send + Sync {
    async fn get(&self, id: VehicleId) -> Option<Vehicle>;

    /// First available vehicle, lowest id first. Selection is explicitly
    /// first-available, not nearest-vehicle.
    async fn next_available(&self) -> Option<Vehicle>;

    async fn count_available(&self) -> usize;

    async fn mark_unavailable(&self, id: VehicleId) -> Result<()>;

    async fn mark_available(&self, id: VehicleId) -> Result<()>;
}
